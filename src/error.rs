use thiserror::Error;

/// Failures reported by [`BTree`](crate::BTree) operations.
///
/// Overflow and underflow conditions raised while rebalancing are protocol
/// signals between recursion levels, not errors; they are resolved internally
/// and never surface here.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The requested order cannot form a tree; a node needs room for at
    /// least one element and two children.
    #[error("tree order must be at least 2 (got {0})")]
    InvalidOrder(usize),

    /// An equal element is already present; the tree never stores
    /// duplicates and never overwrites.
    #[error("element is already present")]
    Duplicate,

    /// No element compared equal to the given key.
    #[error("element not found")]
    NotFound,
}
