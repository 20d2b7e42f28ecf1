//! The two error kinds the engine distinguishes: a recoverable
//! absence signal and a fatal assertion-class violation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The queried key has no live message anywhere on its root-to-leaf
    /// path. Also used internally during query replay to signal absence
    /// up the recursion while folding an update onto its seed.
    #[error("key not found")]
    NotFound,

    /// An assertion-class violation: a split produced zero children, a
    /// flush batch was empty at a non-leaf, or a pivot/message ordering
    /// invariant was violated. These indicate bugs in callers of this
    /// crate, not in the data; the engine does not attempt recovery.
    #[error("precondition violated: {0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, Error>;
