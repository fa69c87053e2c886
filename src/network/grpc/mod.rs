//! gRPC Listen transport
//!
//! Calls `google.firestore.v1.Firestore/Listen` over a lazily connected
//! tonic channel. Request routing relies on the resource prefix header, so
//! every call carries the database name as metadata.

mod grpc_transport;

pub use grpc_transport::*;
