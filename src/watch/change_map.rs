use std::collections::HashMap;

use crate::document::DocumentKey;
use crate::document::DocumentSnapshot;
use crate::proto::Timestamp;
use crate::store::DocumentSet;

/// Accumulated mutation for one key since the last delivered snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Upsert(DocumentSnapshot),
    Delete,
}

/// Pending changes partitioned against the current document set
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub deletes: Vec<DocumentKey>,
    pub adds: Vec<DocumentSnapshot>,
    pub updates: Vec<DocumentSnapshot>,
}

/// Per-cycle record of what the server said changed. Later messages for the
/// same key overwrite earlier ones.
#[derive(Debug, Default)]
pub struct ChangeMap {
    changes: HashMap<DocumentKey, PendingChange>,
}

impl ChangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(
        &mut self,
        document: DocumentSnapshot,
    ) {
        self.changes.insert(document.key().clone(), PendingChange::Upsert(document));
    }

    pub fn delete(
        &mut self,
        key: DocumentKey,
    ) {
        self.changes.insert(key, PendingChange::Delete);
    }

    pub fn get(
        &self,
        key: &DocumentKey,
    ) -> Option<&PendingChange> {
        self.changes.get(key)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Size the document set would have if the pending changes were applied now.
    pub fn projected_size(
        &self,
        current: &DocumentSet,
    ) -> usize {
        let mut adds = 0;
        let mut deletes = 0;
        for (key, change) in &self.changes {
            match (change, current.contains(key)) {
                (PendingChange::Delete, true) => deletes += 1,
                (PendingChange::Upsert(_), false) => adds += 1,
                _ => {}
            }
        }
        current.len() + adds - deletes
    }

    /// Drains the map into deletes of known keys, additions of unknown keys
    /// and updates of known keys. Upserted documents are stamped with
    /// `read_time`; deletes of keys that were never delivered are dropped.
    pub fn partition(
        &mut self,
        current: &DocumentSet,
        read_time: Timestamp,
    ) -> ChangeSet {
        let mut set = ChangeSet::default();
        for (key, change) in self.changes.drain() {
            match change {
                PendingChange::Delete => {
                    if current.contains(&key) {
                        set.deletes.push(key);
                    }
                }
                PendingChange::Upsert(document) => {
                    let document = document.with_read_time(read_time);
                    if current.contains(&key) {
                        set.updates.push(document);
                    } else {
                        set.adds.push(document);
                    }
                }
            }
        }
        set
    }
}
