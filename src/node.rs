//! Per-node pivot table and message buffer, and the two operations that
//! only need a single node's own state: message absorption (`apply`) and
//! point-query replay (`query`).
//!
//! A node is a leaf iff its pivot table is empty. Non-leaf nodes route a
//! key to the child whose pivot is the greatest pivot ≤ the key; a key
//! strictly below every pivot of a non-leaf is not present.

use std::collections::BTreeMap;

use crate::combine::Combine;
use crate::error::{Error, Result};
use crate::message::{Message, MessageKey};

/// A pivot's routing target: the child subtree plus a cached size hint
/// (pivot count + buffered message count in the child). The hint need not
/// be instantaneously exact but must be refreshed after any mutation of
/// the child along this node's flush path.
#[derive(Debug)]
pub(crate) struct ChildLink<K, V> {
    pub(crate) child: Box<Node<K, V>>,
    pub(crate) child_size: usize,
}

impl<K, V> ChildLink<K, V> {
    pub(crate) fn new(child: Node<K, V>) -> Self {
        let child_size = child.len();
        ChildLink {
            child: Box::new(child),
            child_size,
        }
    }

    /// Recomputes `child_size` from the child's current contents.
    pub(crate) fn refresh_size(&mut self) {
        self.child_size = self.child.len();
    }
}

/// A node's pivot table and message buffer.
///
/// Ordered maps are used for both, matching the lexicographic total
/// order required throughout: `BTreeMap` keeps pivots sorted by key and
/// messages sorted by `(key, timestamp)`.
#[derive(Debug)]
pub struct Node<K, V> {
    pub(crate) pivots: BTreeMap<K, ChildLink<K, V>>,
    pub(crate) buffer: BTreeMap<MessageKey<K>, Message<V>>,
}

impl<K, V> Node<K, V> {
    /// An empty leaf — the shape every newly constructed node starts as.
    pub fn empty_leaf() -> Self {
        Node {
            pivots: BTreeMap::new(),
            buffer: BTreeMap::new(),
        }
    }

    /// A node is a leaf iff its pivot table is empty.
    pub fn is_leaf(&self) -> bool {
        self.pivots.is_empty()
    }

    /// `|P| + |E|` — the quantity the size bound and the flush/split
    /// triggers are stated in terms of.
    pub fn len(&self) -> usize {
        self.pivots.len() + self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Ord + Clone, V> Node<K, V> {
    /// The first (smallest) pivot key, if any.
    pub(crate) fn first_pivot_key(&self) -> Option<&K> {
        self.pivots.keys().next()
    }

    /// Predecessor lookup: the pivot that routes `key`. `None` means `key`
    /// is strictly less than every pivot of this node.
    pub(crate) fn get_pivot(&self, key: &K) -> Option<&ChildLink<K, V>> {
        self.pivots.range(..=key.clone()).next_back().map(|(_, l)| l)
    }

    /// Every buffered message whose key equals `key`, in timestamp order.
    /// Because `MessageKey` orders primarily by key, this is exactly the
    /// half-open bracket `[range_start(key), range_end(key)]`.
    fn messages_for_key(
        &self,
        key: &K,
    ) -> impl DoubleEndedIterator<Item = (&MessageKey<K>, &Message<V>)> {
        self.buffer
            .range(MessageKey::range_start(key)..=MessageKey::range_end(key))
    }

    fn remove_messages_for_key(&mut self, key: &K) {
        let dead: Vec<MessageKey<K>> = self.messages_for_key(key).map(|(mk, _)| mk.clone()).collect();
        for mk in dead {
            self.buffer.remove(&mk);
        }
    }
}

impl<K: Ord + Clone, V: Clone> Node<K, V> {
    /// Absorb one message into this node's buffer.
    pub(crate) fn apply<C: Combine<V>>(
        &mut self,
        mk: MessageKey<K>,
        msg: Message<V>,
        default_value: &V,
        combine: &C,
    ) {
        match msg {
            Message::Insert(v) => {
                self.remove_messages_for_key(&mk.key);
                self.buffer.insert(mk, Message::Insert(v));
            }
            Message::Delete => {
                self.remove_messages_for_key(&mk.key);
                if !self.is_leaf() {
                    self.buffer.insert(mk, Message::Delete);
                }
            }
            Message::Update(operand) => {
                let is_leaf = self.is_leaf();
                let existing = self
                    .messages_for_key(&mk.key)
                    .next_back()
                    .map(|(_, m)| m.clone());
                match existing {
                    None if is_leaf => {
                        let seeded = combine.combine(default_value.clone(), &operand);
                        self.apply(mk, Message::Insert(seeded), default_value, combine);
                    }
                    None => {
                        self.buffer.insert(mk, Message::Update(operand));
                    }
                    Some(Message::Insert(v)) => {
                        let folded = combine.combine(v, &operand);
                        self.apply(mk, Message::Insert(folded), default_value, combine);
                    }
                    Some(Message::Update(_)) | Some(Message::Delete) => {
                        self.buffer.insert(mk, Message::Update(operand));
                    }
                }
            }
        }
    }

    /// Point lookup: replay buffered messages for `key` against the
    /// leaf-resident base value.
    pub fn query<C: Combine<V>>(&self, key: &K, default_value: &V, combine: &C) -> Result<V> {
        if self.is_leaf() {
            return match self.messages_for_key(key).next() {
                Some((_, Message::Insert(v))) => Ok(v.clone()),
                Some(_) => Err(Error::Precondition(
                    "leaf buffer holds a non-insert message".into(),
                )),
                None => Err(Error::NotFound),
            };
        }

        let msgs: Vec<(&MessageKey<K>, &Message<V>)> = self.messages_for_key(key).collect();
        let mut iter = msgs.into_iter().peekable();

        let mut v: V = match iter.peek() {
            None => {
                let link = self.get_pivot(key).ok_or(Error::NotFound)?;
                link.child.query(key, default_value, combine)?
            }
            Some((_, Message::Update(_))) => {
                // Seed from the routed child, but don't advance: stage 2
                // below folds this very update into the seed.
                match self.get_pivot(key) {
                    Some(link) => match link.child.query(key, default_value, combine) {
                        Ok(v) => v,
                        Err(Error::NotFound) => default_value.clone(),
                        Err(e) => return Err(e),
                    },
                    None => default_value.clone(),
                }
            }
            Some((_, Message::Delete)) => {
                // Advance past the tombstone. `apply`'s INSERT rule always
                // clears a key's prior entries before recording itself, so
                // a live entry surviving a tombstone can only be an UPDATE
                // appended by `apply`'s UPDATE-over-DELETE case — never an
                // INSERT. Seed from the default and let stage 2 fold that
                // UPDATE (and any further ones) onto it.
                iter.next();
                if iter.peek().is_none() {
                    return Err(Error::NotFound);
                }
                default_value.clone()
            }
            Some((_, Message::Insert(v))) => {
                let v = v.clone();
                iter.next();
                v
            }
        };

        while let Some((_, msg)) = iter.next() {
            match msg {
                Message::Update(operand) => v = combine.combine(v, operand),
                _ => {
                    return Err(Error::Precondition(
                        "expected only updates while folding a key's message tail".into(),
                    ))
                }
            }
        }

        Ok(v)
    }
}
