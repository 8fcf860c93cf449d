use std::cmp::Ordering;

/// A total order over `T`, supplied when the tree is built.
///
/// The tree consults a single comparator for every placement and lookup, so
/// an implementation must be a strict total order: antisymmetric, transitive,
/// and total. Elements comparing `Equal` are treated as the same element.
pub trait Compare<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders elements by their `Ord` implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Natural;

impl<T: Ord> Compare<T> for Natural {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Adapts a comparison closure into a [`Compare`] implementation.
///
/// # Examples
/// ```
/// use btree_flex::{BTree, OrderBy};
///
/// let mut t = BTree::with_comparator(4, OrderBy(|a: &u32, b: &u32| b.cmp(a))).unwrap();
/// t.insert(1).unwrap();
/// t.insert(5).unwrap();
/// assert_eq!(t.first(), Some(5)); // least under the reversed order
/// ```
#[derive(Clone, Copy, Debug)]
pub struct OrderBy<F>(pub F);

impl<T, F> Compare<T> for OrderBy<F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.0)(a, b)
    }
}
