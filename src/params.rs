//! Tuning parameters for the tree.

/// Recommended default `max_node_size` (`2^18`).
pub const DEFAULT_MAX_NODE_SIZE: usize = 1 << 18;

/// Construction parameters controlling when a node flushes or splits.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// Upper bound on `|P| + |E|` that triggers a flush/split decision.
    pub max_node_size: usize,
    /// Advisory lower bound. Not consulted by flush or split in this core;
    /// retained for forward compatibility with a future merge/redistribute
    /// pass.
    pub min_node_size: usize,
    /// Minimum heaviest-child buffered-message count for a flush step at a
    /// multi-child node to proceed; below this, no productive flush can be
    /// made and the node splits instead.
    pub min_flush_size: usize,
}

impl Params {
    /// The recommended defaults, derived from `max_node_size`.
    pub fn with_max_node_size(max_node_size: usize) -> Self {
        Params {
            max_node_size,
            min_node_size: max_node_size / 4,
            min_flush_size: max_node_size / 16,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::with_max_node_size(DEFAULT_MAX_NODE_SIZE)
    }
}
