use hashbrown::HashMap;

use crate::{
    contact::{ContactRecord, ImmutableField},
    types::ContactId,
};

use super::indices::{OrderIndex, OrderKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("contact {id} resent with a different {field}; keeping first-seen value")]
    Conflict { id: ContactId, field: ImmutableField },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Id was unseen; the record was added.
    Inserted,
    /// Id was known; annotations were refined.
    Updated,
    /// Id was known and nothing changed.
    Unchanged,
}

impl UpsertOutcome {
    pub fn is_new(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Canonical contact log for one session.
///
/// Records are keyed by [`ContactId`] and iterated in contact-time order.
/// Nothing is removed except by [`ContactStore::clear`].
#[derive(Debug, Default)]
pub struct ContactStore {
    records: HashMap<ContactId, ContactRecord>,
    order: OrderIndex,
    next_seq: u64,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an unseen id, or merges the mutable annotations of a known one.
    ///
    /// A resend that disagrees on callsign, time, or station is rejected and
    /// the stored record is left untouched.
    pub fn upsert(&mut self, record: ContactRecord) -> Result<UpsertOutcome, StoreError> {
        if let Some(existing) = self.records.get_mut(&record.id) {
            if let Some(field) = existing.immutable_conflict(&record) {
                return Err(StoreError::Conflict {
                    id: record.id,
                    field,
                });
            }
            let changed = existing.annotations.merge_from(&record.annotations);
            return Ok(if changed {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Unchanged
            });
        }

        let key = OrderKey {
            timestamp: record.timestamp,
            seq: self.take_next_seq(),
        };
        self.order.insert(key, record.id.clone());
        self.records.insert(record.id.clone(), record);
        Ok(UpsertOutcome::Inserted)
    }

    /// Time-ordered view of every record. Cheap to clone and restart.
    pub fn all(&self) -> impl Iterator<Item = &ContactRecord> + Clone {
        self.order.values().filter_map(move |id| self.records.get(id))
    }

    pub fn get(&self, id: &ContactId) -> Option<&ContactRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owned, time-ordered copy of the store contents.
    pub fn export(&self) -> Vec<ContactRecord> {
        self.all().cloned().collect()
    }

    /// Drops every record. Administrative reset only.
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
        self.next_seq = 0;
    }

    fn take_next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
