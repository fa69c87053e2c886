//! Ordered document storage.
//!
//! [`SortedSet`] is a persistent left-leaning red-black tree. Clones share
//! structure with the original, so a delivered snapshot keeps a stable view
//! while the live set keeps changing. [`DocumentSet`] pairs the tree with a
//! key index and is the only way the watch engine mutates either.

mod document_set;
mod sorted_set;

pub use document_set::*;
pub use sorted_set::*;
