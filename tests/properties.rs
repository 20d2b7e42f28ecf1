//! Property tests for the tree's core correctness invariants, run against
//! the public façade with random operation sequences rather than random
//! leaf contents, since this crate's unit of arbitrary-ness is a whole
//! tree, not a single node.

use std::collections::HashMap;

use betree_core::{Combine, Params, Tree};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

struct Sum;

impl Combine<i64> for Sum {
    fn combine(&self, base: i64, operand: &i64) -> i64 {
        base + operand
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, i64),
    Update(u8, i64),
    Erase(u8),
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        let key = u8::arbitrary(g) % 12;
        let value = (i64::arbitrary(g) % 1000) - 500;
        match u8::arbitrary(g) % 3 {
            0 => Op::Insert(key, value),
            1 => Op::Update(key, value),
            _ => Op::Erase(key),
        }
    }
}

/// Oracle equivalence: query results must agree with a reference
/// `HashMap` that applies insert as assignment, erase as removal, and
/// update as `v <- (v or V0) + operand`.
#[quickcheck]
fn oracle_equivalence(ops: Vec<Op>) -> bool {
    let mut tree = Tree::with_params(Sum, 0i64, Params::with_max_node_size(8));
    let mut model: HashMap<u8, i64> = HashMap::new();

    for op in &ops {
        match *op {
            Op::Insert(k, v) => {
                tree.insert(k, v).unwrap();
                model.insert(k, v);
            }
            Op::Update(k, v) => {
                tree.update(k, v).unwrap();
                let seeded = model.get(&k).copied().unwrap_or(0) + v;
                model.insert(k, seeded);
            }
            Op::Erase(k) => {
                tree.erase(k).unwrap();
                model.remove(&k);
            }
        }
    }

    (0u8..12).all(|k| match (tree.query(&k).ok(), model.get(&k).copied()) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    })
}

/// Two erases in a row leave the same query result as one.
#[quickcheck]
fn idempotent_erase(key: u8, seed: i64) -> bool {
    let mut once = Tree::with_params(Sum, 0i64, Params::with_max_node_size(8));
    let mut twice = Tree::with_params(Sum, 0i64, Params::with_max_node_size(8));

    once.insert(key, seed).unwrap();
    twice.insert(key, seed).unwrap();

    once.erase(key).unwrap();
    twice.erase(key).unwrap();
    twice.erase(key).unwrap();

    once.query(&key).ok() == twice.query(&key).ok()
}

/// Update over a fresh key seeds from V0.
#[quickcheck]
fn update_over_absent_key_seeds_from_default(key: u8, operand: i64) -> bool {
    let mut tree = Tree::with_params(Sum, 0i64, Params::with_max_node_size(8));
    tree.update(key, operand).unwrap();
    tree.query(&key).unwrap() == operand
}
