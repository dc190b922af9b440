//! Ordered map over [`RbTree`], storing `(key, value)` pairs keyed by the
//! first half.

use std::fmt;

use crate::{
  error::AllocError,
  pool::Pool,
  tree::{Compare, First, Iter, Less, RbTree},
};

pub struct Map<K, V, C = Less> {
  tree: RbTree<(K, V), First, C>,
}

impl<K: Ord, V> Map<K, V> {
  pub fn new() -> Self {
    Self::with_compare(Less)
  }
}

impl<K, V, C> Map<K, V, C> {
  pub fn with_compare(compare: C) -> Self {
    Self {
      tree: RbTree::with_compare(compare),
    }
  }

  /// Empty map whose nodes come from `pool`.
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

  pub fn clear(&mut self) {
    self.tree.clear();
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> + ExactSizeIterator {
    self.tree.iter().map(|(key, value)| (key, value))
  }

  pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator {
    self.tree.iter().map(|(key, _)| key)
  }

  pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator {
    self.tree.iter().map(|(_, value)| value)
  }

  pub fn first(&self) -> Option<(&K, &V)> {
    self.tree.first().map(|(key, value)| (key, value))
  }

  pub fn last(&self) -> Option<(&K, &V)> {
    self.tree.last().map(|(key, value)| (key, value))
  }

  pub fn pool(&self) -> &Pool {
    self.tree.pool()
  }

  pub fn tree(&self) -> &RbTree<(K, V), First, C> {
    &self.tree
  }
}

impl<K, V, C: Compare<K>> Map<K, V, C> {
  /// Adds `key -> value` unless `key` is already mapped. An existing entry is
  /// left as it is and `value` is dropped.
  pub fn insert(
    &mut self,
    key: K,
    value: V,
  ) -> Result<bool, AllocError> {
    let (_, inserted) = self.tree.insert_unique((key, value))?;
    Ok(inserted)
  }

  pub fn get(
    &self,
    key: &K,
  ) -> Option<&V> {
    self.tree.get(self.tree.find(key)).map(|(_, value)| value)
  }

  pub fn get_mut(
    &mut self,
    key: &K,
  ) -> Option<&mut V> {
    let pos = self.tree.find(key);
    self.tree.get_mut(pos).map(|(_, value)| value)
  }

  pub fn contains_key(
    &self,
    key: &K,
  ) -> bool {
    self.tree.contains(key)
  }

  pub fn remove(
    &mut self,
    key: &K,
  ) -> Option<V> {
    let pos = self.tree.find(key);
    self.tree.erase(pos).map(|(_, value)| value)
  }

  /// Entries with keys in `low..high` under the map's order.
  pub fn range(
    &self,
    low: &K,
    high: &K,
  ) -> Iter<'_, (K, V), First, C> {
    let first = self.tree.lower_bound(low);
    let last = self.tree.lower_bound(high);
    if self.tree.key_comp().less(high, low) {
      return self.tree.range(last, last);
    }
    self.tree.range(first, last)
  }
}

impl<K: Ord, V> Default for Map<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: Clone, V: Clone, C: Clone> Clone for Map<K, V, C> {
  fn clone(&self) -> Self {
    Self {
      tree: self.tree.clone(),
    }
  }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for Map<K, V, C> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_map().entries(self.iter()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_insert_does_not_overwrite() {
    let mut map = Map::new();

    assert!(map.insert("b", 2).unwrap());
    assert!(map.insert("a", 1).unwrap());
    assert!(!map.insert("a", 100).unwrap());

    assert_eq!(map.get(&"a"), Some(&1));
    assert_eq!(map.len(), 2);
    assert_eq!(format!("{map:?}"), r#"{"a": 1, "b": 2}"#);
  }

  #[test]
  fn test_get_mut_and_remove() {
    let mut map = Map::new();
    for key in 0..8u8 {
      map.insert(key, u32::from(key) * 10).unwrap();
    }

    if let Some(value) = map.get_mut(&3) {
      *value += 1;
    }
    assert_eq!(map.get(&3), Some(&31));
    assert!(map.get_mut(&42).is_none());

    assert_eq!(map.remove(&3), Some(31));
    assert_eq!(map.remove(&3), None);
    assert!(!map.contains_key(&3));
    assert_eq!(map.len(), 7);
  }

  #[test]
  fn test_keys_values_and_iter_are_ordered() {
    let mut map = Map::new();
    for (key, value) in [(3, 'c'), (1, 'a'), (2, 'b')] {
      map.insert(key, value).unwrap();
    }

    assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(map.values().copied().collect::<Vec<_>>(), vec!['a', 'b', 'c']);
    assert_eq!(map.iter().next_back(), Some((&3, &'c')));
    assert_eq!(map.first(), Some((&1, &'a')));
    assert_eq!(map.last(), Some((&3, &'c')));
  }

  #[test]
  fn test_range() {
    let mut map = Map::new();
    for key in 0..10 {
      map.insert(key, key * key).unwrap();
    }

    let squares: Vec<_> = map.range(&3, &6).map(|(_, square)| *square).collect();
    assert_eq!(squares, vec![9, 16, 25]);
    assert_eq!(map.range(&6, &3).count(), 0);
    assert_eq!(map.range(&8, &100).count(), 2);
  }

  #[test]
  fn test_clone_is_independent() {
    let mut map = Map::new();
    map.insert(1, String::from("one")).unwrap();

    let mut copy = map.clone();
    copy.get_mut(&1).unwrap().push('!');
    copy.insert(2, String::from("two")).unwrap();

    assert_eq!(map.get(&1).map(String::as_str), Some("one"));
    assert_eq!(copy.get(&1).map(String::as_str), Some("one!"));
    assert_eq!(map.len(), 1);
  }
}
