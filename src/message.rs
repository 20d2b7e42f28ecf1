//! Keyed, timestamped message records and the ordering they impose.
//!
//! A [`MessageKey`] pairs an application key with a monotonically
//! increasing timestamp; the lexicographic order on that pair — primary by
//! key, secondary by timestamp — is what lets a node's message buffer be a
//! plain ordered map while still recovering, for any single key, the exact
//! sequence in which writes for that key were submitted.

use std::cmp::Ordering;

/// A 64-bit timestamp. `0` is reserved as a sentinel for range-bound
/// construction and is never assigned to a real message.
pub type Timestamp = u64;

/// `(key, timestamp)`, ordered lexicographically by `key` then `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageKey<K> {
    pub key: K,
    pub timestamp: Timestamp,
}

impl<K> MessageKey<K> {
    pub fn new(key: K, timestamp: Timestamp) -> Self {
        MessageKey { key, timestamp }
    }
}

impl<K: Clone> MessageKey<K> {
    /// The smallest possible message key for `key` — brackets the start of
    /// the half-open range that contains every message for `key`.
    pub fn range_start(key: &K) -> Self {
        MessageKey {
            key: key.clone(),
            timestamp: 0,
        }
    }

    /// The largest possible message key for `key` — brackets the end of
    /// the range that contains every message for `key`.
    pub fn range_end(key: &K) -> Self {
        MessageKey {
            key: key.clone(),
            timestamp: Timestamp::MAX,
        }
    }
}

impl<K: Ord> PartialOrd for MessageKey<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for MessageKey<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
    }
}

/// One pending write, tagged by kind.
///
/// Modeled as a proper discriminated union rather than an opcode/value pair
/// so the combine and tombstone semantics are checked by the compiler
/// instead of assumed by convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<V> {
    /// Authoritative value for a key.
    Insert(V),
    /// Tombstone; carries no payload.
    Delete,
    /// Right-hand operand of `⊕` to fold onto the standing value.
    Update(V),
}

impl<V> Message<V> {
    pub fn is_insert(&self) -> bool {
        matches!(self, Message::Insert(_))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Message::Update(_))
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Message::Delete)
    }
}
