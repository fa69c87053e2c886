use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::change_map::ChangeMap;
use super::event::DocumentChange;
use super::event::QuerySnapshot;
use crate::document::DocumentComparator;
use crate::document::DocumentKey;
use crate::document::DocumentSnapshot;
use crate::proto::listen_response::ResponseType;
use crate::proto::ExistenceFilter;
use crate::proto::ListenResponse;
use crate::proto::TargetChange;
use crate::proto::TargetChangeType;
use crate::proto::Timestamp;
use crate::store::DocumentSet;
use crate::InvariantError;
use crate::ProtocolError;
use crate::Result;
use crate::StreamError;

/// What the session must do after a message was applied
#[derive(Debug, Default)]
pub(crate) struct ResponseOutcome {
    /// Snapshot to hand to the subscriber
    pub snapshot: Option<QuerySnapshot>,
    /// The server acknowledged progress with a resume token
    pub reset_backoff: bool,
    /// Local state was discarded; the stream must be replaced
    pub resync: bool,
}

/// Protocol state of one watch target, independent of any stream.
///
/// Applies server messages one at a time. Changes accumulate until the
/// server declares a consistent point, at which the diff against the last
/// delivered state becomes a [`QuerySnapshot`].
#[derive(Debug)]
pub(crate) struct WatchState {
    target_id: i32,
    documents: DocumentSet,
    changes: ChangeMap,
    /// The server has sent everything matching the target as of some read time
    current: bool,
    resume_token: Option<Vec<u8>>,
    has_pushed: bool,
    last_read_time: Option<Timestamp>,
}

impl WatchState {
    pub(crate) fn new(
        target_id: i32,
        comparator: DocumentComparator,
    ) -> Self {
        Self {
            target_id,
            documents: DocumentSet::new(comparator),
            changes: ChangeMap::new(),
            current: false,
            resume_token: None,
            has_pushed: false,
            last_read_time: None,
        }
    }

    pub(crate) fn resume_token(&self) -> Option<&[u8]> {
        self.resume_token.as_deref()
    }

    pub(crate) fn is_current(&self) -> bool {
        self.current
    }

    pub(crate) fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.changes.len()
    }

    /// Document count once pending changes are applied
    pub(crate) fn current_size(&self) -> usize {
        self.changes.projected_size(&self.documents)
    }

    pub(crate) fn handle_response(
        &mut self,
        response: ListenResponse,
    ) -> Result<ResponseOutcome> {
        match response.response_type {
            Some(ResponseType::TargetChange(change)) => self.handle_target_change(change),
            Some(ResponseType::DocumentChange(change)) => {
                let document = change.document.ok_or(ProtocolError::MissingField {
                    message: "DocumentChange",
                    field: "document",
                })?;
                if change.target_ids.contains(&self.target_id) {
                    let document = DocumentSnapshot::from_proto(document)?;
                    trace!(key = %document.key(), "document upserted");
                    self.changes.upsert(document);
                } else if change.removed_target_ids.contains(&self.target_id) {
                    let key = DocumentKey::from_resource_name(&document.name)?;
                    trace!(%key, "document left target");
                    self.changes.delete(key);
                }
                Ok(ResponseOutcome::default())
            }
            Some(ResponseType::DocumentDelete(delete)) => {
                self.changes.delete(DocumentKey::from_resource_name(&delete.document)?);
                Ok(ResponseOutcome::default())
            }
            Some(ResponseType::DocumentRemove(remove)) => {
                self.changes.delete(DocumentKey::from_resource_name(&remove.document)?);
                Ok(ResponseOutcome::default())
            }
            Some(ResponseType::Filter(filter)) => Ok(self.handle_existence_filter(filter)),
            None => Err(ProtocolError::UnknownResponseType.into()),
        }
    }

    fn handle_target_change(
        &mut self,
        change: TargetChange,
    ) -> Result<ResponseOutcome> {
        let mut outcome = ResponseOutcome::default();

        match TargetChangeType::try_from(change.target_change_type) {
            Ok(TargetChangeType::NoChange) => {
                if change.target_ids.is_empty() && self.current {
                    if let Some(read_time) = change.read_time {
                        outcome.snapshot = self.push_snapshot(read_time, change.resume_token.clone())?;
                    }
                }
            }
            Ok(TargetChangeType::Add) => {
                let received = change.target_ids.first().copied();
                if received != Some(self.target_id) {
                    return Err(ProtocolError::UnexpectedTargetId {
                        expected: self.target_id,
                        received,
                    }
                    .into());
                }
            }
            Ok(TargetChangeType::Remove) => {
                let (code, message) = match change.cause {
                    Some(cause) => (tonic::Code::from_i32(cause.code), cause.message),
                    None => (tonic::Code::Internal, "internal error".to_string()),
                };
                return Err(StreamError::TargetRemoved {
                    target_id: self.target_id,
                    code,
                    message,
                }
                .into());
            }
            Ok(TargetChangeType::Reset) => self.reset_documents(),
            Ok(TargetChangeType::Current) => self.current = true,
            Err(_) => return Err(ProtocolError::UnknownTargetChangeType(change.target_change_type).into()),
        }

        if !change.resume_token.is_empty() && change.affects_target(self.target_id) {
            outcome.reset_backoff = true;
        }
        Ok(outcome)
    }

    fn handle_existence_filter(
        &mut self,
        filter: ExistenceFilter,
    ) -> ResponseOutcome {
        if filter.target_id != self.target_id {
            debug!(target_id = filter.target_id, "ignoring existence filter for another target");
            return ResponseOutcome::default();
        }

        let expected = usize::try_from(filter.count).unwrap_or(0);
        let actual = self.current_size();
        if expected == actual {
            return ResponseOutcome::default();
        }

        warn!(
            target_id = filter.target_id,
            expected, actual, "existence filter mismatch, resetting documents"
        );
        self.reset_documents();
        ResponseOutcome {
            resync: true,
            ..Default::default()
        }
    }

    /// Discards every pending change and queues a delete of every delivered
    /// document, so the next consistent point re-delivers the target from
    /// scratch. Also forgets the resume token.
    pub(crate) fn reset_documents(&mut self) {
        debug!(documents = self.documents.len(), "resetting watch documents");
        self.changes.clear();
        self.resume_token = None;
        for key in self.documents.keys() {
            self.changes.delete(key.clone());
        }
        self.current = false;
    }

    /// Drops changes received on a stream that failed before reaching a
    /// consistent point.
    pub(crate) fn clear_pending(&mut self) {
        self.changes.clear();
    }

    /// Applies pending changes at `read_time` and returns the snapshot to
    /// deliver, if any.
    ///
    /// Nothing is delivered when no document changed, except for the very
    /// first consistent point. A read time older than the last accepted one,
    /// delivered or not, is ignored and leaves the pending changes in place.
    pub(crate) fn push_snapshot(
        &mut self,
        read_time: Timestamp,
        next_resume_token: Vec<u8>,
    ) -> Result<Option<QuerySnapshot>> {
        if let Some(last) = self.last_read_time {
            if read_time < last {
                warn!(%read_time, last_read_time = %last, "ignoring snapshot older than last consistent point");
                return Ok(None);
            }
        }

        let changes = self.compute_snapshot(read_time)?;
        self.last_read_time = Some(read_time);
        let snapshot = if !self.has_pushed || !changes.is_empty() {
            self.has_pushed = true;
            Some(QuerySnapshot::new(read_time, self.documents.snapshot(), changes))
        } else {
            None
        };

        self.changes.clear();
        self.resume_token = (!next_resume_token.is_empty()).then_some(next_resume_token);
        Ok(snapshot)
    }

    /// Folds pending changes into the document set and returns them as an
    /// ordered change list: deletions, then additions, then modifications,
    /// each sorted by document order.
    pub(crate) fn compute_snapshot(
        &mut self,
        read_time: Timestamp,
    ) -> Result<Vec<DocumentChange>> {
        let mut set = self.changes.partition(&self.documents, read_time);
        let comparator = self.documents.comparator().clone();

        let mut deleted = Vec::with_capacity(set.deletes.len());
        for key in set.deletes.drain(..) {
            if let Some(document) = self.documents.get(&key) {
                deleted.push(document.clone());
            }
        }
        deleted.sort_by(|a, b| comparator.compare(a, b));
        set.adds.sort_by(|a, b| comparator.compare(a, b));
        set.updates.sort_by(|a, b| comparator.compare(a, b));

        let mut changes = Vec::with_capacity(deleted.len() + set.adds.len() + set.updates.len());
        for document in deleted {
            let (removed, old_index) = self.documents.remove(document.key())?;
            changes.push(DocumentChange::removed(removed, old_index));
        }
        for document in set.adds {
            let new_index = self.documents.insert(document.clone())?;
            changes.push(DocumentChange::added(document, new_index));
        }
        for document in set.updates {
            if let Some(change) = self.modify_document(document)? {
                changes.push(change);
            }
        }

        self.documents.check_invariants()?;
        Ok(changes)
    }

    fn modify_document(
        &mut self,
        document: DocumentSnapshot,
    ) -> Result<Option<DocumentChange>> {
        let Some(existing) = self.documents.get(document.key()) else {
            return Err(InvariantError::MissingDocument(document.key().to_string()).into());
        };
        if existing.update_time() == document.update_time() {
            return Ok(None);
        }

        let (_, old_index) = self.documents.remove(document.key())?;
        let new_index = self.documents.insert(document.clone())?;
        Ok(Some(DocumentChange::modified(document, old_index, new_index)))
    }
}
