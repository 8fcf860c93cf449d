//! # A B-tree with a runtime-chosen order and a caller-supplied total order
//!
//! `btree-flex` provides [`BTree`], an in-memory balanced multiway search
//! tree storing unique elements. Unlike `std::collections::BTreeSet`, the
//! branching factor (the *order*, K) is picked at construction time and the
//! element order comes from a [`Compare`] implementation rather than being
//! tied to `Ord`, which helps when the same element type needs different
//! orderings in different trees. If natural `Ord` ordering and a fixed fanout
//! are fine for you, the standard library's set is the better choice.
//!
//! The tree rebalances by splitting nodes that overflow on insert and by
//! borrowing from or merging with siblings on delete, so every leaf stays at
//! the same depth and every non-root node keeps at least `(K-1)/2` elements.

mod btree;
mod compare;
mod error;

pub use btree::BTree;
pub use compare::{Compare, Natural, OrderBy};
pub use error::Error;
