//! # Integration Scenarios
//!
//! End-to-end behaviour of `herald-bus` through its public API only.

pub mod concurrency;
pub mod failures;
pub mod reentrancy;
