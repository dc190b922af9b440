//! Ordered sets over [`RbTree`].

use std::fmt;

use crate::{
  error::AllocError,
  pool::Pool,
  tree::{Compare, Identity, Iter, Less, RbTree},
};

/// Ordered set of unique values.
pub struct Set<T, C = Less> {
  tree: RbTree<T, Identity, C>,
}

impl<T: Ord> Set<T> {
  pub fn new() -> Self {
    Self::with_compare(Less)
  }
}

impl<T, C> Set<T, C> {
  pub fn with_compare(compare: C) -> Self {
    Self {
      tree: RbTree::with_compare(compare),
    }
  }

  /// Empty set whose nodes come from `pool`.
  pub fn new_in(
    pool: Pool,
    compare: C,
  ) -> Self {
    Self {
      tree: RbTree::new_in(pool, compare),
    }
  }

  pub fn len(&self) -> usize {
    self.tree.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tree.is_empty()
  }

  pub fn first(&self) -> Option<&T> {
    self.tree.first()
  }

  pub fn last(&self) -> Option<&T> {
    self.tree.last()
  }

  pub fn iter(&self) -> Iter<'_, T, Identity, C> {
    self.tree.iter()
  }

  pub fn clear(&mut self) {
    self.tree.clear();
  }

  pub fn pool(&self) -> &Pool {
    self.tree.pool()
  }

  /// The underlying tree, for position-based traversal.
  pub fn tree(&self) -> &RbTree<T, Identity, C> {
    &self.tree
  }
}

impl<T, C: Compare<T>> Set<T, C> {
  /// Adds `value`; returns `false` and drops it when an equivalent value is
  /// already present.
  pub fn insert(
    &mut self,
    value: T,
  ) -> Result<bool, AllocError> {
    let (_, inserted) = self.tree.insert_unique(value)?;
    Ok(inserted)
  }

  pub fn contains(
    &self,
    value: &T,
  ) -> bool {
    self.tree.contains(value)
  }

  /// The stored value equivalent to `value`.
  pub fn get(
    &self,
    value: &T,
  ) -> Option<&T> {
    self.tree.get(self.tree.find(value))
  }

  pub fn remove(
    &mut self,
    value: &T,
  ) -> Option<T> {
    let pos = self.tree.find(value);
    self.tree.erase(pos)
  }

  /// Smallest element not less than `value`.
  pub fn lower_bound(
    &self,
    value: &T,
  ) -> Option<&T> {
    self.tree.get(self.tree.lower_bound(value))
  }

  /// Smallest element greater than `value`.
  pub fn upper_bound(
    &self,
    value: &T,
  ) -> Option<&T> {
    self.tree.get(self.tree.upper_bound(value))
  }
}

impl<T: Ord> Default for Set<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Clone, C: Clone> Clone for Set<T, C> {
  fn clone(&self) -> Self {
    Self {
      tree: self.tree.clone(),
    }
  }
}

impl<T: fmt::Debug, C> fmt::Debug for Set<T, C> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_set().entries(self.iter()).finish()
  }
}

impl<'a, T, C> IntoIterator for &'a Set<T, C> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T, Identity, C>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// Ordered collection that keeps equivalent values side by side, in insertion
/// order.
pub struct MultiSet<T, C = Less> {
  tree: RbTree<T, Identity, C>,
}

impl<T: Ord> MultiSet<T> {
  pub fn new() -> Self {
    Self::with_compare(Less)
  }
}

impl<T, C> MultiSet<T, C> {
  pub fn with_compare(compare: C) -> Self {
    Self {
      tree: RbTree::with_compare(compare),
    }
  }

  pub fn new_in(
    pool: Pool,
    compare: C,
  ) -> Self {
    Self {
      tree: RbTree::new_in(pool, compare),
    }
  }

  pub fn len(&self) -> usize {
    self.tree.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tree.is_empty()
  }

  pub fn iter(&self) -> Iter<'_, T, Identity, C> {
    self.tree.iter()
  }

  pub fn clear(&mut self) {
    self.tree.clear();
  }
}

impl<T, C: Compare<T>> MultiSet<T, C> {
  pub fn insert(
    &mut self,
    value: T,
  ) -> Result<(), AllocError> {
    self.tree.insert_equal(value)?;
    Ok(())
  }

  pub fn contains(
    &self,
    value: &T,
  ) -> bool {
    self.tree.contains(value)
  }

  pub fn count(
    &self,
    value: &T,
  ) -> usize {
    self.tree.count(value)
  }

  /// Every element equivalent to `value`, in insertion order.
  pub fn equal_range(
    &self,
    value: &T,
  ) -> Iter<'_, T, Identity, C> {
    let (first, last) = self.tree.equal_range(value);
    self.tree.range(first, last)
  }

  /// Removes one equivalent element, the earliest inserted.
  pub fn remove_one(
    &mut self,
    value: &T,
  ) -> Option<T> {
    let pos = self.tree.find(value);
    self.tree.erase(pos)
  }

  /// Removes every equivalent element; returns how many.
  pub fn remove_all(
    &mut self,
    value: &T,
  ) -> usize {
    self.tree.erase_key(value)
  }
}

impl<T: Ord> Default for MultiSet<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Clone, C: Clone> Clone for MultiSet<T, C> {
  fn clone(&self) -> Self {
    Self {
      tree: self.tree.clone(),
    }
  }
}

impl<T: fmt::Debug, C> fmt::Debug for MultiSet<T, C> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

impl<'a, T, C> IntoIterator for &'a MultiSet<T, C> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T, Identity, C>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}
