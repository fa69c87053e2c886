//! Constructors and ordering for the Listen protocol types.

use std::cmp::Ordering;
use std::fmt;

use super::listen_request;
use super::listen_response::ResponseType;
use super::Document;
use super::DocumentChange;
use super::DocumentDelete;
use super::DocumentRemove;
use super::ExistenceFilter;
use super::ListenRequest;
use super::ListenResponse;
use super::Status;
use super::Target;
use super::TargetChange;
use super::TargetChangeType;
use super::Timestamp;

impl Timestamp {
    pub const fn new(
        seconds: i64,
        nanos: i32,
    ) -> Self {
        Self { seconds, nanos }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
        }
    }
}

impl Ord for Timestamp {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.seconds.cmp(&other.seconds).then(self.nanos.cmp(&other.nanos))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl ListenRequest {
    /// Request registering `target` on a new stream
    pub fn add_target(
        database: impl Into<String>,
        target: Target,
    ) -> Self {
        Self {
            database: database.into(),
            target_change: Some(listen_request::TargetChange::AddTarget(target)),
        }
    }

    pub fn added_target(&self) -> Option<&Target> {
        match &self.target_change {
            Some(listen_request::TargetChange::AddTarget(target)) => Some(target),
            _ => None,
        }
    }
}

impl TargetChange {
    /// A change with no target IDs applies to every target on the stream.
    pub fn affects_target(
        &self,
        target_id: i32,
    ) -> bool {
        self.target_ids.is_empty() || self.target_ids.contains(&target_id)
    }
}

impl ListenResponse {
    pub fn target_change(
        change_type: TargetChangeType,
        target_ids: Vec<i32>,
    ) -> Self {
        Self::from(TargetChange {
            target_change_type: change_type as i32,
            target_ids,
            ..Default::default()
        })
    }

    /// NO_CHANGE carrying a read time and resume token, the server's "consistent up to here" marker
    pub fn global_snapshot(
        read_time: Timestamp,
        resume_token: impl Into<Vec<u8>>,
    ) -> Self {
        Self::from(TargetChange {
            target_change_type: TargetChangeType::NoChange as i32,
            read_time: Some(read_time),
            resume_token: resume_token.into(),
            ..Default::default()
        })
    }

    pub fn target_removed(
        target_id: i32,
        cause: Option<Status>,
    ) -> Self {
        Self::from(TargetChange {
            target_change_type: TargetChangeType::Remove as i32,
            target_ids: vec![target_id],
            cause,
            ..Default::default()
        })
    }

    pub fn document_changed(
        document: Document,
        target_ids: Vec<i32>,
        removed_target_ids: Vec<i32>,
    ) -> Self {
        Self {
            response_type: Some(ResponseType::DocumentChange(DocumentChange {
                document: Some(document),
                target_ids,
                removed_target_ids,
            })),
        }
    }

    pub fn document_deleted(name: impl Into<String>) -> Self {
        Self {
            response_type: Some(ResponseType::DocumentDelete(DocumentDelete {
                document: name.into(),
                ..Default::default()
            })),
        }
    }

    pub fn document_removed(
        name: impl Into<String>,
        removed_target_ids: Vec<i32>,
    ) -> Self {
        Self {
            response_type: Some(ResponseType::DocumentRemove(DocumentRemove {
                document: name.into(),
                removed_target_ids,
                read_time: None,
            })),
        }
    }

    pub fn existence_filter(
        target_id: i32,
        count: i32,
    ) -> Self {
        Self {
            response_type: Some(ResponseType::Filter(ExistenceFilter { target_id, count })),
        }
    }
}

impl From<TargetChange> for ListenResponse {
    fn from(change: TargetChange) -> Self {
        Self {
            response_type: Some(ResponseType::TargetChange(change)),
        }
    }
}

impl From<tonic::Status> for Status {
    fn from(status: tonic::Status) -> Self {
        Self {
            code: status.code() as i32,
            message: status.message().to_string(),
        }
    }
}
