//! Documents as seen by the watch engine.
//!
//! Field payloads stay encoded; the engine only reads a document's key and
//! its create/update timestamps.

mod comparator;
mod snapshot;

pub use comparator::*;
pub use snapshot::*;
