//! Redistributing an over-full node into several siblings.
//!
//! Each new sibling targets roughly `10/24` of `max_node_size`, leaving a
//! safety margin below the bound it will next be measured against. A
//! pivot and every message it owns migrate to the same sibling together,
//! so routing stays consistent after the split.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::message::{Message, MessageKey};
use crate::node::{ChildLink, Node};
use crate::params::Params;

impl<K: Ord + Clone, V> Node<K, V> {
    /// Called when `|P| + |E| >= max_node_size`. Clears this node and
    /// returns a non-empty pivot map for the caller to install in its
    /// place.
    pub(crate) fn split(&mut self, params: &Params) -> Result<BTreeMap<K, ChildLink<K, V>>> {
        let total = self.len();
        debug_assert!(total >= params.max_node_size);

        // Each new node targets roughly 10/24 of max_node_size, leaving a
        // safety margin below the bound it will next be measured against.
        let denom = ((10 * params.max_node_size) / 24).max(1);
        let num_new = (total / denom).max(1);
        let per_new = (total + num_new - 1) / num_new;

        let mut pivots = std::mem::take(&mut self.pivots).into_iter().peekable();
        let mut elements = std::mem::take(&mut self.buffer).into_iter().peekable();

        let mut result: BTreeMap<K, ChildLink<K, V>> = BTreeMap::new();

        for _ in 0..num_new {
            if pivots.peek().is_none() && elements.peek().is_none() {
                break;
            }

            let first_key: K = match (pivots.peek(), elements.peek()) {
                (Some((pk, _)), _) => pk.clone(),
                (None, Some((mk, _))) => mk.key.clone(),
                (None, None) => unreachable!("loop guard checked both are non-empty"),
            };

            let mut new_pivots: BTreeMap<K, ChildLink<K, V>> = BTreeMap::new();
            let mut new_buffer: BTreeMap<MessageKey<K>, Message<V>> = BTreeMap::new();
            let mut moved = 0usize;

            while moved < per_new && (pivots.peek().is_some() || elements.peek().is_some()) {
                if pivots.peek().is_some() {
                    let (pivot_key, link) = pivots.next().unwrap();
                    moved += 1;

                    // Pull every message this pivot owns — everything up to
                    // (but not including) the next pivot's key — along with
                    // it, even if that overshoots `per_new`: a pivot and its
                    // messages must never be split across siblings.
                    let next_pivot_key = pivots.peek().map(|(k, _)| k.clone());
                    loop {
                        let belongs = match (&next_pivot_key, elements.peek()) {
                            (_, None) => false,
                            (Some(next), Some((mk, _))) => &mk.key < next,
                            (None, Some(_)) => true,
                        };
                        if !belongs {
                            break;
                        }
                        let (mk, msg) = elements.next().unwrap();
                        new_buffer.insert(mk, msg);
                        moved += 1;
                    }

                    new_pivots.insert(pivot_key, link);
                } else {
                    // Leaf: no pivots at all, messages are assigned purely
                    // by count.
                    let (mk, msg) = elements.next().unwrap();
                    new_buffer.insert(mk, msg);
                    moved += 1;
                }
            }

            let new_node = Node {
                pivots: new_pivots,
                buffer: new_buffer,
            };
            result.insert(first_key, ChildLink::new(new_node));
        }

        if pivots.peek().is_some() || elements.peek().is_some() {
            return Err(Error::Precondition(
                "split failed to partition every pivot and message".into(),
            ));
        }
        if result.is_empty() {
            return Err(Error::Precondition("split produced zero children".into()));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with_n_inserts(n: usize) -> Node<u64, u64> {
        let mut node = Node::empty_leaf();
        for i in 0..n as u64 {
            node.buffer
                .insert(MessageKey::new(i, i + 1), Message::Insert(i));
        }
        node
    }

    #[test]
    fn split_redistributes_every_message() {
        let params = Params::with_max_node_size(8);
        let mut node = leaf_with_n_inserts(9);
        let before: usize = node.len();
        let result = node.split(&params).unwrap();
        assert!(node.is_empty());
        let after: usize = result.values().map(|l| l.child.len()).sum();
        assert_eq!(before, after);
        for link in result.values() {
            assert!(link.child.len() <= before);
        }
    }

    #[test]
    fn split_never_returns_empty_children() {
        let params = Params::with_max_node_size(8);
        let mut node = leaf_with_n_inserts(8);
        let result = node.split(&params).unwrap();
        for link in result.values() {
            assert!(!link.child.is_empty());
        }
    }
}
