//! Listen protocol messages.
//!
//! Hand-maintained `prost` definitions for the subset of `google.firestore.v1`
//! used by the watch engine. Field tags match the upstream protos, so the
//! messages interoperate with real servers and emulators. Two fields are kept
//! opaque on purpose:
//!
//! - [`QueryTarget::structured_query`] holds a pre-encoded `StructuredQuery`.
//!   A `bytes` field and an embedded message share the same wire encoding.
//! - [`Document::fields`] holds the raw encoded `map<string, Value>` entries,
//!   which are decoded by the caller, never by the engine.

use serde::Deserialize;
use serde::Serialize;

mod ext;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ::prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct Document {
    /// `projects/{project_id}/databases/{database_id}/documents/{document_path}`
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Encoded `map<string, Value>` entries, one per field
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub fields: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(message, optional, tag = "3")]
    pub create_time: ::core::option::Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub update_time: ::core::option::Option<Timestamp>,
}

// -
// Requests

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct ListenRequest {
    #[prost(string, tag = "1")]
    pub database: ::prost::alloc::string::String,
    #[prost(oneof = "listen_request::TargetChange", tags = "2, 3")]
    pub target_change: ::core::option::Option<listen_request::TargetChange>,
}

pub mod listen_request {
    use serde::Deserialize;
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Oneof)]
    pub enum TargetChange {
        #[prost(message, tag = "2")]
        AddTarget(super::Target),
        #[prost(int32, tag = "3")]
        RemoveTarget(i32),
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct Target {
    #[prost(oneof = "target::TargetType", tags = "2, 3")]
    pub target_type: ::core::option::Option<target::TargetType>,
    /// Empty when the stream starts from scratch
    #[prost(bytes = "vec", tag = "4")]
    pub resume_token: ::prost::alloc::vec::Vec<u8>,
    #[prost(int32, tag = "5")]
    pub target_id: i32,
    #[prost(bool, tag = "6")]
    pub once: bool,
}

pub mod target {
    use serde::Deserialize;
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Oneof)]
    pub enum TargetType {
        #[prost(message, tag = "2")]
        Query(super::QueryTarget),
        #[prost(message, tag = "3")]
        Documents(super::DocumentsTarget),
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct DocumentsTarget {
    #[prost(string, repeated, tag = "2")]
    pub documents: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct QueryTarget {
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    /// Pre-encoded `StructuredQuery`
    #[prost(bytes = "vec", tag = "2")]
    pub structured_query: ::prost::alloc::vec::Vec<u8>,
}

// -
// Responses

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct ListenResponse {
    #[prost(oneof = "listen_response::ResponseType", tags = "2, 3, 4, 6, 5")]
    pub response_type: ::core::option::Option<listen_response::ResponseType>,
}

pub mod listen_response {
    use serde::Deserialize;
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Oneof)]
    pub enum ResponseType {
        #[prost(message, tag = "2")]
        TargetChange(super::TargetChange),
        #[prost(message, tag = "3")]
        DocumentChange(super::DocumentChange),
        #[prost(message, tag = "4")]
        DocumentDelete(super::DocumentDelete),
        #[prost(message, tag = "6")]
        DocumentRemove(super::DocumentRemove),
        #[prost(message, tag = "5")]
        Filter(super::ExistenceFilter),
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct TargetChange {
    #[prost(enumeration = "TargetChangeType", tag = "1")]
    pub target_change_type: i32,
    #[prost(int32, repeated, tag = "2")]
    pub target_ids: ::prost::alloc::vec::Vec<i32>,
    #[prost(message, optional, tag = "3")]
    pub cause: ::core::option::Option<Status>,
    #[prost(bytes = "vec", tag = "4")]
    pub resume_token: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "6")]
    pub read_time: ::core::option::Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ::prost::Enumeration)]
#[repr(i32)]
pub enum TargetChangeType {
    NoChange = 0,
    Add = 1,
    Remove = 2,
    Current = 3,
    Reset = 4,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct DocumentChange {
    #[prost(message, optional, tag = "1")]
    pub document: ::core::option::Option<Document>,
    #[prost(int32, repeated, tag = "5")]
    pub target_ids: ::prost::alloc::vec::Vec<i32>,
    #[prost(int32, repeated, tag = "6")]
    pub removed_target_ids: ::prost::alloc::vec::Vec<i32>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct DocumentDelete {
    #[prost(string, tag = "1")]
    pub document: ::prost::alloc::string::String,
    #[prost(int32, repeated, tag = "6")]
    pub removed_target_ids: ::prost::alloc::vec::Vec<i32>,
    #[prost(message, optional, tag = "4")]
    pub read_time: ::core::option::Option<Timestamp>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct DocumentRemove {
    #[prost(string, tag = "1")]
    pub document: ::prost::alloc::string::String,
    #[prost(int32, repeated, tag = "2")]
    pub removed_target_ids: ::prost::alloc::vec::Vec<i32>,
    #[prost(message, optional, tag = "4")]
    pub read_time: ::core::option::Option<Timestamp>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, ::prost::Message)]
pub struct ExistenceFilter {
    #[prost(int32, tag = "1")]
    pub target_id: i32,
    #[prost(int32, tag = "2")]
    pub count: i32,
}
