use std::collections::HashMap;

use super::SortedSet;
use crate::document::DocumentComparator;
use crate::document::DocumentKey;
use crate::document::DocumentSnapshot;
use crate::InvariantError;

/// The current documents of one watch target, indexed by key and kept in
/// comparator order.
///
/// Both views are updated by the same call; there is no way to mutate one
/// without the other.
#[derive(Debug)]
pub struct DocumentSet {
    index: HashMap<DocumentKey, DocumentSnapshot>,
    sorted: SortedSet<DocumentSnapshot>,
    comparator: DocumentComparator,
}

impl DocumentSet {
    pub fn new(comparator: DocumentComparator) -> Self {
        Self {
            index: HashMap::new(),
            sorted: SortedSet::new({
                let comparator = comparator.clone();
                move |a: &DocumentSnapshot, b: &DocumentSnapshot| comparator.compare(a, b)
            }),
            comparator,
        }
    }

    pub fn comparator(&self) -> &DocumentComparator {
        &self.comparator
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(
        &self,
        key: &DocumentKey,
    ) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(
        &self,
        key: &DocumentKey,
    ) -> Option<&DocumentSnapshot> {
        self.index.get(key)
    }

    pub fn index_of(
        &self,
        key: &DocumentKey,
    ) -> Option<usize> {
        self.index.get(key).and_then(|doc| self.sorted.index_of(doc))
    }

    /// Adds a document that is not yet present and returns its position.
    pub fn insert(
        &mut self,
        document: DocumentSnapshot,
    ) -> std::result::Result<usize, InvariantError> {
        if self.index.contains_key(document.key()) {
            return Err(InvariantError::DuplicateDocument(document.key().to_string()));
        }

        self.sorted.insert(document.clone());
        let position = self
            .sorted
            .index_of(&document)
            .ok_or_else(|| InvariantError::MissingDocument(document.key().to_string()))?;
        self.index.insert(document.key().clone(), document);
        Ok(position)
    }

    /// Removes a present document, returning it with the position it held.
    pub fn remove(
        &mut self,
        key: &DocumentKey,
    ) -> std::result::Result<(DocumentSnapshot, usize), InvariantError> {
        let Some(document) = self.index.remove(key) else {
            return Err(InvariantError::MissingDocument(key.to_string()));
        };

        let position = self
            .sorted
            .index_of(&document)
            .ok_or_else(|| InvariantError::MissingDocument(key.to_string()))?;
        self.sorted.remove(&document);
        Ok((document, position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.sorted.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.index.keys()
    }

    /// O(1) ordered view sharing structure with the live set.
    pub fn snapshot(&self) -> SortedSet<DocumentSnapshot> {
        self.sorted.clone()
    }

    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        if self.sorted.len() != self.index.len() {
            return Err(InvariantError::SizeMismatch {
                tree: self.sorted.len(),
                index: self.index.len(),
            });
        }
        Ok(())
    }
}
