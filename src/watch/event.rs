use std::sync::Arc;

use crate::document::DocumentSnapshot;
use crate::proto::Timestamp;
use crate::store::Iter;
use crate::store::SortedSet;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
        }
    }
}

/// One entry of a snapshot's change list.
///
/// Indexes are positions in the sorted document list as the changes are
/// applied in order: `old_index` just before this change, `new_index` just
/// after it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeType,
    pub document: DocumentSnapshot,
    /// `None` for additions
    pub old_index: Option<usize>,
    /// `None` for removals
    pub new_index: Option<usize>,
}

impl DocumentChange {
    pub(crate) fn added(
        document: DocumentSnapshot,
        new_index: usize,
    ) -> Self {
        Self {
            kind: ChangeType::Added,
            document,
            old_index: None,
            new_index: Some(new_index),
        }
    }

    pub(crate) fn removed(
        document: DocumentSnapshot,
        old_index: usize,
    ) -> Self {
        Self {
            kind: ChangeType::Removed,
            document,
            old_index: Some(old_index),
            new_index: None,
        }
    }

    pub(crate) fn modified(
        document: DocumentSnapshot,
        old_index: usize,
        new_index: usize,
    ) -> Self {
        Self {
            kind: ChangeType::Modified,
            document,
            old_index: Some(old_index),
            new_index: Some(new_index),
        }
    }
}

/// Consistent view of a watch target at `read_time`.
///
/// Cloning is cheap; the document list shares structure with the engine's
/// live state and never changes after delivery.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    read_time: Timestamp,
    docs: SortedSet<DocumentSnapshot>,
    changes: Arc<Vec<DocumentChange>>,
}

impl QuerySnapshot {
    pub(crate) fn new(
        read_time: Timestamp,
        docs: SortedSet<DocumentSnapshot>,
        changes: Vec<DocumentChange>,
    ) -> Self {
        Self {
            read_time,
            docs,
            changes: Arc::new(changes),
        }
    }

    pub fn read_time(&self) -> Timestamp {
        self.read_time
    }

    pub fn size(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Documents in target order
    pub fn docs(&self) -> Iter<'_, DocumentSnapshot> {
        self.docs.iter()
    }

    /// Changes since the previous snapshot, deletions first, then additions, then modifications
    pub fn doc_changes(&self) -> &[DocumentChange] {
        &self.changes
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<&DocumentSnapshot> {
        self.docs.get(index)
    }

    pub fn to_vec(&self) -> Vec<DocumentSnapshot> {
        self.docs.iter().cloned().collect()
    }
}

/// Session output consumed by the subscription's dispatcher
#[derive(Debug)]
pub(crate) enum WatchEvent {
    Snapshot(QuerySnapshot),
    /// Terminal; nothing follows
    Error(Error),
}
