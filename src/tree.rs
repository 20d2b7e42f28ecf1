//! The tree façade: owns the root, the timestamp counter and the tuning
//! parameters, and exposes the four public write/read operations. All
//! single-threaded and synchronous — callers needing concurrency must
//! serialize access externally; this in-memory core holds no lock of its
//! own.

use std::collections::BTreeMap;

use crate::combine::Combine;
use crate::error::Result;
use crate::message::{Message, MessageKey, Timestamp};
use crate::node::Node;
use crate::params::Params;

/// A write-optimized, message-buffered search tree.
///
/// `K` is the application key type, `V` the application value type, and
/// `C` supplies the `⊕` combine operation that `update` messages fold onto
/// standing values.
pub struct Tree<K, V, C> {
    root: Node<K, V>,
    params: Params,
    next_timestamp: Timestamp,
    default_value: V,
    combine: C,
}

impl<K: Ord + Clone, V: Clone, C: Combine<V>> Tree<K, V, C> {
    /// A new, empty tree using the recommended default parameters.
    pub fn new(combine: C, default_value: V) -> Self {
        Tree::with_params(combine, default_value, Params::default())
    }

    /// A new, empty tree with explicit tuning parameters.
    pub fn with_params(combine: C, default_value: V, params: Params) -> Self {
        Tree {
            root: Node::empty_leaf(),
            params,
            // Timestamp 0 is reserved as a sentinel; the first real
            // message gets timestamp 1.
            next_timestamp: 1,
            default_value,
            combine,
        }
    }

    fn next_timestamp(&mut self) -> Timestamp {
        let ts = self.next_timestamp;
        self.next_timestamp += 1;
        ts
    }

    fn submit(&mut self, key: K, msg: Message<V>) -> Result<()> {
        let ts = self.next_timestamp();
        let mut batch = BTreeMap::new();
        batch.insert(MessageKey::new(key, ts), msg);

        let replacement = self
            .root
            .flush(batch, &self.params, &self.default_value, &self.combine)?;
        if let Some(new_pivots) = replacement {
            self.root.pivots = new_pivots;
        }
        Ok(())
    }

    /// Submit an `INSERT` message for `key`.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        self.submit(key, Message::Insert(value))
    }

    /// Submit an `UPDATE` message for `key`; `value` is the right-hand
    /// operand of `⊕`.
    pub fn update(&mut self, key: K, value: V) -> Result<()> {
        self.submit(key, Message::Update(value))
    }

    /// Submit a `DELETE` message for `key`.
    pub fn erase(&mut self, key: K) -> Result<()> {
        self.submit(key, Message::Delete)
    }

    /// Return the current value for `key`, or `Error::NotFound`.
    pub fn query(&self, key: &K) -> Result<V> {
        self.root.query(key, &self.default_value, &self.combine)
    }

    /// The tuning parameters this tree was constructed with.
    pub fn params(&self) -> &Params {
        &self.params
    }
}
