//! # Type Registry
//!
//! Maps each event type to its subscribers, kept sorted by
//! (priority descending, short owner type name ascending) after every
//! insertion. Equal keys keep insertion order.
//!
//! The registry is plain data; the facade owns the lock around it. Removal
//! hands the removed records back so the caller can drop them after
//! releasing that lock.

use crate::events::Lineage;
use crate::subscriber::{Origin, OwnerId, SubscriberRecord, SubscriptionId};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Subscribers of one event type, in dispatch order.
struct Slot {
    records: Vec<Arc<SubscriberRecord>>,
}

/// Event type → ordered subscriber records.
#[derive(Default)]
pub struct TypeRegistry {
    slots: HashMap<TypeId, Slot>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to its event type's slot and restore dispatch order.
    pub fn insert(&mut self, record: Arc<SubscriberRecord>) {
        let slot = self.slots.entry(record.event().id()).or_insert_with(|| Slot {
            records: Vec::new(),
        });

        slot.records.push(record);
        // `sort_by` is stable, so ties stay in insertion order.
        slot.records.sort_by(|a, b| a.dispatch_order(b));
    }

    /// Remove every record owned by `owner`, across all event types.
    #[must_use = "dropping the removed records may run subscriber code"]
    pub fn remove_by_owner(&mut self, owner: OwnerId) -> Vec<Arc<SubscriberRecord>> {
        self.extract(|record| record.owner().id() == owner)
    }

    /// Remove the single record with this id, wherever it lives.
    #[must_use = "dropping the removed record may run subscriber code"]
    pub fn remove_by_handle(&mut self, id: SubscriptionId) -> Option<Arc<SubscriberRecord>> {
        self.extract(|record| record.id() == id).pop()
    }

    /// Remove records whose owner has been dropped.
    #[must_use = "dropping the removed records may run subscriber code"]
    pub fn prune_dropped(&mut self) -> Vec<Arc<SubscriberRecord>> {
        self.extract(|record| !record.owner().is_alive())
    }

    fn extract(&mut self, mut remove: impl FnMut(&SubscriberRecord) -> bool) -> Vec<Arc<SubscriberRecord>> {
        let mut removed = Vec::new();
        for slot in self.slots.values_mut() {
            if !slot.records.iter().any(|record| remove(record.as_ref())) {
                continue;
            }
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut slot.records)
                .into_iter()
                .partition(|record| remove(record.as_ref()));
            slot.records = kept;
            removed.extend(gone);
        }
        removed
    }

    /// Current ordered records for an event type; empty if none.
    #[must_use]
    pub fn lookup(&self, event: TypeId) -> &[Arc<SubscriberRecord>] {
        self.slots
            .get(&event)
            .map(|slot| slot.records.as_slice())
            .unwrap_or(&[])
    }

    /// Shallow copy of an event type's records for one dispatch pass.
    #[must_use]
    pub fn snapshot(&self, event: TypeId) -> Vec<Arc<SubscriberRecord>> {
        self.lookup(event).to_vec()
    }

    /// Event types currently held by at least one declarative record.
    pub fn declarative_lineages(&self) -> impl Iterator<Item = &Lineage> {
        self.slots.values().filter_map(|slot| {
            slot.records
                .iter()
                .find(|record| record.origin() == Origin::Declarative)
                .map(|record| record.lineage())
        })
    }

    /// Total records across all event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.values().map(|slot| slot.records.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records for one event type.
    #[must_use]
    pub fn slot_len(&self, event: TypeId) -> usize {
        self.lookup(event).len()
    }

    /// Event types with at least one record.
    #[must_use]
    pub fn event_type_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| !slot.records.is_empty())
            .count()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("event_types", &self.event_type_count())
            .field("records", &self.len())
            .finish()
    }
}
