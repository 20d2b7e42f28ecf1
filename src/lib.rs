//! An in-memory, write-optimized, message-buffered search tree in the
//! Bε-tree family.
//!
//! Writes (`insert`/`update`/`erase`) are journaled as timestamped messages
//! that accumulate at interior nodes and are flushed toward the leaves in
//! large batches; this amortizes point-write cost at the expense of extra
//! work on reads, which must replay buffered messages found on the
//! root-to-leaf path. See each module for the corresponding piece:
//!
//! - [`message`] — the `(key, timestamp)` ordering and the tagged message
//!   variant (`INSERT`/`DELETE`/`UPDATE`).
//! - [`node`] — the per-node pivot table and message buffer, plus message
//!   absorption (`apply`) and point-query replay (`query`).
//! - [`flush`] — recursive downward propagation of buffered messages and
//!   the flush-vs-split decision.
//! - [`split`] — redistributing an over-full node into several siblings.
//! - [`tree`] — the public façade: `insert`/`update`/`erase`/`query`.
//!
//! This core is explicitly single-threaded and in-memory only; a
//! persistent backing store, a cache/swap manager, range iteration,
//! concurrent access and durability are all external collaborators, not
//! part of this crate.

mod combine;
mod error;
mod flush;
mod message;
mod node;
mod params;
mod split;
mod tree;

pub use combine::Combine;
pub use error::{Error, Result};
pub use message::{Message, MessageKey, Timestamp};
pub use node::Node;
pub use params::Params;
pub use tree::Tree;
