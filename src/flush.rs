//! Recursive downward propagation of buffered messages, and the decision
//! between flushing further down and splitting — the heart of the engine.
//!
//! The left-edge adjustment, single-child fast path, heaviest-child
//! selection, and split-on-overflow structure all happen here. Each
//! decision point logs at an appropriate level (`trace!`/`debug!`/`warn!`)
//! so a slow or thrashing flush is diagnosable without a debugger.

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::combine::Combine;
use crate::error::{Error, Result};
use crate::message::{Message, MessageKey};
use crate::node::Node;
use crate::params::Params;

impl<K: Ord + Clone, V: Clone> Node<K, V> {
    /// Absorb `batch` at or below this node. `Ok(None)` means this node
    /// remains viable in place; `Ok(Some(pivots))` means it split and the
    /// caller must install `pivots` in place of its link to this node.
    pub(crate) fn flush<C: Combine<V>>(
        &mut self,
        batch: BTreeMap<MessageKey<K>, Message<V>>,
        params: &Params,
        default_value: &V,
        combine: &C,
    ) -> Result<Option<BTreeMap<K, crate::node::ChildLink<K, V>>>> {
        if batch.is_empty() {
            return Err(Error::Precondition(
                "flush called with an empty batch".into(),
            ));
        }

        if self.is_leaf() {
            return self.flush_leaf(batch, params, default_value, combine);
        }
        self.flush_internal(batch, params, default_value, combine)
    }

    fn flush_leaf<C: Combine<V>>(
        &mut self,
        batch: BTreeMap<MessageKey<K>, Message<V>>,
        params: &Params,
        default_value: &V,
        combine: &C,
    ) -> Result<Option<BTreeMap<K, crate::node::ChildLink<K, V>>>> {
        for (mk, msg) in batch {
            self.apply(mk, msg, default_value, combine);
        }
        if self.len() >= params.max_node_size {
            trace!("leaf over max_node_size ({}), splitting", self.len());
            return Ok(Some(self.split(params)?));
        }
        Ok(None)
    }

    fn flush_internal<C: Combine<V>>(
        &mut self,
        batch: BTreeMap<MessageKey<K>, Message<V>>,
        params: &Params,
        default_value: &V,
        combine: &C,
    ) -> Result<Option<BTreeMap<K, crate::node::ChildLink<K, V>>>> {
        // Step 1: left-edge adjustment. A batch may carry keys below this
        // node's current routing range; widen the first pivot to cover it.
        let batch_min_key = batch
            .keys()
            .next()
            .expect("batch checked non-empty above")
            .key
            .clone();
        if let Some(old_min) = self.first_pivot_key().cloned() {
            if batch_min_key < old_min {
                if let Some(link) = self.pivots.remove(&old_min) {
                    self.pivots.insert(batch_min_key.clone(), link);
                }
            }
        }

        let batch_max_key = batch
            .keys()
            .next_back()
            .expect("batch checked non-empty above")
            .key
            .clone();

        let first_routed = self.get_pivot_key(&batch_min_key);
        let last_routed = self.get_pivot_key(&batch_max_key);

        match (first_routed, last_routed) {
            (Some(p1), Some(p2)) if p1 == p2 => {
                // Step 2: single-child fast path — the whole batch is
                // destined for one child.
                self.flush_into_single_child(p1, batch, params, default_value, combine)
            }
            (Some(_), Some(_)) => {
                // Step 3: multi-child path. Each message goes through
                // `apply` so it collapses against whatever this node
                // already buffers for its key, rather than being merged
                // in raw and left to coexist with a stale entry.
                for (mk, msg) in batch {
                    self.apply(mk, msg, default_value, combine);
                }
                self.flush_multi_child(params, default_value, combine)
            }
            _ => Err(Error::Precondition(
                "flush batch routes below every pivot of a non-leaf node".into(),
            )),
        }
    }

    fn flush_into_single_child<C: Combine<V>>(
        &mut self,
        pivot_key: K,
        batch: BTreeMap<MessageKey<K>, Message<V>>,
        params: &Params,
        default_value: &V,
        combine: &C,
    ) -> Result<Option<BTreeMap<K, crate::node::ChildLink<K, V>>>> {
        let link = self
            .pivots
            .get_mut(&pivot_key)
            .expect("pivot_key came from get_pivot_key on this node");
        let replacement = link.child.flush(batch, params, default_value, combine)?;
        match replacement {
            Some(new_pivots) => {
                debug!("child of pivot split, adopting replacements");
                self.pivots.remove(&pivot_key);
                self.pivots.extend(new_pivots);
            }
            None => {
                let link = self.pivots.get_mut(&pivot_key).unwrap();
                link.refresh_size();
            }
        }
        Ok(None)
    }

    fn flush_multi_child<C: Combine<V>>(
        &mut self,
        params: &Params,
        default_value: &V,
        combine: &C,
    ) -> Result<Option<BTreeMap<K, crate::node::ChildLink<K, V>>>> {
        while self.len() >= params.max_node_size {
            let heaviest = self.heaviest_pivot();
            let (pivot_key, count) = match heaviest {
                Some(h) => h,
                None => break,
            };
            if count <= params.min_flush_size {
                trace!(
                    "heaviest child buffers {count} messages, at or below min_flush_size \
                     ({}); no productive flush possible",
                    params.min_flush_size
                );
                break;
            }

            let sub_batch = self.take_messages_for_pivot(&pivot_key);
            let link = self
                .pivots
                .get_mut(&pivot_key)
                .expect("pivot_key came from heaviest_pivot on this node");
            let replacement = link.child.flush(sub_batch, params, default_value, combine)?;
            match replacement {
                Some(new_pivots) => {
                    debug!("heaviest child split while flushing, adopting replacements");
                    self.pivots.remove(&pivot_key);
                    self.pivots.extend(new_pivots);
                }
                None => {
                    let link = self.pivots.get_mut(&pivot_key).unwrap();
                    link.refresh_size();
                }
            }
        }

        if self.len() > params.max_node_size {
            warn!(
                "node still over max_node_size ({}) after flushing to children, splitting",
                self.len()
            );
            return Ok(Some(self.split(params)?));
        }
        Ok(None)
    }

    /// The pivot key that routes `key`, or `None` if `key` is strictly
    /// below every pivot of this (non-leaf) node.
    fn get_pivot_key(&self, key: &K) -> Option<K> {
        self.pivots.range(..=key.clone()).next_back().map(|(k, _)| k.clone())
    }

    /// Scan all pivots and find the one with the most buffered messages
    /// routed to it. Ties favor the smaller (earlier) pivot key, which
    /// falls out naturally from scanning in ascending key order and only
    /// replacing the incumbent on a strict improvement.
    pub(crate) fn heaviest_pivot(&self) -> Option<(K, usize)> {
        let pivot_keys: Vec<K> = self.pivots.keys().cloned().collect();
        let mut best: Option<(K, usize)> = None;
        for (i, key) in pivot_keys.iter().enumerate() {
            let count = self.messages_routed_to(key, pivot_keys.get(i + 1));
            let improves = match &best {
                Some((_, best_count)) => count > *best_count,
                None => true,
            };
            if improves {
                best = Some((key.clone(), count));
            }
        }
        best
    }

    fn messages_routed_to(&self, pivot_key: &K, next_pivot_key: Option<&K>) -> usize {
        let start = MessageKey::range_start(pivot_key);
        match next_pivot_key {
            Some(next) => self.buffer.range(start..MessageKey::range_start(next)).count(),
            None => self.buffer.range(start..).count(),
        }
    }

    /// Remove and return every buffered message routed to `pivot_key`,
    /// preserving their relative `MessageKey` order.
    fn take_messages_for_pivot(&mut self, pivot_key: &K) -> BTreeMap<MessageKey<K>, Message<V>> {
        let next_key = self
            .pivots
            .range((
                std::ops::Bound::Excluded(pivot_key.clone()),
                std::ops::Bound::Unbounded,
            ))
            .next()
            .map(|(k, _)| k.clone());
        let start = MessageKey::range_start(pivot_key);
        let keys: Vec<MessageKey<K>> = match &next_key {
            Some(next) => self
                .buffer
                .range(start..MessageKey::range_start(next))
                .map(|(mk, _)| mk.clone())
                .collect(),
            None => self.buffer.range(start..).map(|(mk, _)| mk.clone()).collect(),
        };
        let mut out = BTreeMap::new();
        for mk in keys {
            if let Some(msg) = self.buffer.remove(&mk) {
                out.insert(mk, msg);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ChildLink;

    struct Concat;
    impl Combine<String> for Concat {
        fn combine(&self, mut base: String, operand: &String) -> String {
            base.push_str(operand);
            base
        }
    }

    fn singleton(key: u64, ts: u64, msg: Message<String>) -> BTreeMap<MessageKey<u64>, Message<String>> {
        let mut m = BTreeMap::new();
        m.insert(MessageKey::new(key, ts), msg);
        m
    }

    #[test]
    fn leaf_flush_applies_and_stays_under_bound() {
        let params = Params::with_max_node_size(8);
        let mut leaf: Node<u64, String> = Node::empty_leaf();
        let out = leaf
            .flush(singleton(1, 1, Message::Insert("a".into())), &params, &String::new(), &Concat)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(leaf.query(&1, &String::new(), &Concat).unwrap(), "a");
    }

    #[test]
    fn leaf_flush_splits_once_over_bound() {
        let params = Params::with_max_node_size(4);
        let mut leaf: Node<u64, String> = Node::empty_leaf();
        for i in 0..4u64 {
            let out = leaf
                .flush(singleton(i, i + 1, Message::Insert(i.to_string())), &params, &String::new(), &Concat)
                .unwrap();
            if i < 3 {
                assert!(out.is_none(), "should not split before reaching the bound");
            } else {
                assert!(out.is_some(), "should split once len() reaches max_node_size");
            }
        }
    }

    #[test]
    fn flush_into_single_child_routes_without_touching_buffer() {
        let params = Params::with_max_node_size(1000);
        let mut root: Node<u64, String> = Node::empty_leaf();
        root.pivots.insert(0, ChildLink::new(Node::empty_leaf()));
        root.pivots.insert(100, ChildLink::new(Node::empty_leaf()));

        root.flush(singleton(5, 1, Message::Insert("x".into())), &params, &String::new(), &Concat)
            .unwrap();
        assert!(root.buffer.is_empty());
        assert_eq!(
            root.pivots.get(&0).unwrap().child.query(&5, &String::new(), &Concat).unwrap(),
            "x"
        );
    }

    #[test]
    fn multi_child_path_collapses_a_repeated_insert_instead_of_duplicating_it() {
        let params = Params::with_max_node_size(1000);
        let mut root: Node<u64, String> = Node::empty_leaf();
        root.pivots.insert(0, ChildLink::new(Node::empty_leaf()));
        root.pivots.insert(100, ChildLink::new(Node::empty_leaf()));

        let mut first = BTreeMap::new();
        first.insert(MessageKey::new(5u64, 1), Message::Insert("a".into()));
        first.insert(MessageKey::new(105u64, 2), Message::Insert("b".into()));
        root.flush(first, &params, &String::new(), &Concat).unwrap();
        assert_eq!(root.buffer.len(), 2);

        let mut second = BTreeMap::new();
        second.insert(MessageKey::new(5u64, 3), Message::Insert("c".into()));
        second.insert(MessageKey::new(105u64, 4), Message::Insert("d".into()));
        root.flush(second, &params, &String::new(), &Concat).unwrap();

        // A repeated INSERT for key 5 must replace, not coexist with, the
        // earlier buffered message for that key.
        assert_eq!(root.buffer.len(), 2);
        assert_eq!(
            root.buffer
                .values()
                .filter(|m| matches!(m, Message::Insert(v) if v == "c"))
                .count(),
            1
        );
    }

    #[test]
    fn empty_batch_is_a_precondition_error() {
        let params = Params::with_max_node_size(8);
        let mut leaf: Node<u64, String> = Node::empty_leaf();
        let err = leaf
            .flush(BTreeMap::new(), &params, &String::new(), &Concat)
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }
}
