//! Listen/Watch engine: turns the server's Listen change stream into ordered,
//! consistent [`QuerySnapshot`]s for document and query subscriptions.
//!
//! ```ignore
//! let watch = Watch::connect(Settings::load(None)?)?;
//! let subscription = watch.on_snapshot(
//!     WatchTarget::document(DocumentKey::new("rooms/eros")?),
//!     |snapshot| println!("{} documents", snapshot.size()),
//!     |e| eprintln!("listen failed: {e}"),
//! );
//! ```

mod config;
mod constants;
mod document;
mod errors;
mod metrics;
mod network;
mod store;
mod watch;

pub mod proto;
pub mod utils;

pub use config::*;
pub use constants::WATCH_TARGET_ID;
pub use document::*;
pub use errors::*;
pub use metrics::*;
pub use network::*;
pub use store::*;
pub use utils::backoff::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
