use std::{fmt, iter::FusedIterator, ptr};

use super::{node::NodeId, rbtree::RbTree};

/// A location in a tree: a node, or one past the last node.
///
/// Positions are plain values and do not borrow the tree. A position stays
/// valid across insertions and across erasure of other nodes. Once its own
/// node is erased (or the tree cleared) it goes stale: lookups return `None`,
/// erase removes nothing, stepping panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Position {
  At(NodeId),
  End,
}

impl Position {
  pub fn node(self) -> Option<NodeId> {
    match self {
      Position::At(id) => Some(id),
      Position::End => None,
    }
  }

  pub fn is_end(self) -> bool {
    self == Position::End
  }
}

impl From<Option<NodeId>> for Position {
  fn from(node: Option<NodeId>) -> Self {
    node.map_or(Position::End, Position::At)
  }
}

impl<V, KoV, C> RbTree<V, KoV, C> {
  /// In-order successor. `End` stays at `End`.
  ///
  /// Walks parent links only: down to the leftmost node of the right subtree,
  /// or up until the climb arrives from a left child.
  pub fn next(
    &self,
    pos: Position,
  ) -> Position {
    let Position::At(mut node) = pos else {
      return Position::End;
    };

    if let Some(right) = self.nodes[node].right {
      return Position::At(self.min_of(right));
    }

    loop {
      match self.nodes[node].parent {
        Some(parent) if self.nodes[parent].right == Some(node) => node = parent,
        parent => return parent.into(),
      }
    }
  }

  /// In-order predecessor. `End` steps back to the maximum; stepping back
  /// from the minimum yields `End`.
  pub fn prev(
    &self,
    pos: Position,
  ) -> Position {
    let mut node = match pos {
      Position::At(node) => node,
      Position::End => return self.header.rightmost.into(),
    };

    if let Some(left) = self.nodes[node].left {
      return Position::At(self.max_of(left));
    }

    loop {
      match self.nodes[node].parent {
        Some(parent) if self.nodes[parent].left == Some(node) => node = parent,
        parent => return parent.into(),
      }
    }
  }

  pub fn cursor(
    &self,
    pos: Position,
  ) -> Cursor<'_, V, KoV, C> {
    Cursor { tree: self, pos }
  }

  pub fn iter(&self) -> Iter<'_, V, KoV, C> {
    Iter {
      tree: self,
      front: self.begin(),
      back: Position::End,
      remaining: self.len(),
    }
  }

  /// Iterates the half-open range `first..last`.
  ///
  /// `last` must be reachable from `first` by stepping forward.
  pub fn range(
    &self,
    first: Position,
    last: Position,
  ) -> Iter<'_, V, KoV, C> {
    let mut remaining = 0;
    let mut pos = first;

    while pos != last && !pos.is_end() {
      remaining += 1;
      pos = self.next(pos);
    }

    Iter {
      tree: self,
      front: first,
      back: last,
      remaining,
    }
  }

  pub(super) fn min_of(
    &self,
    mut node: NodeId,
  ) -> NodeId {
    while let Some(left) = self.nodes[node].left {
      node = left;
    }
    node
  }

  pub(super) fn max_of(
    &self,
    mut node: NodeId,
  ) -> NodeId {
    while let Some(right) = self.nodes[node].right {
      node = right;
    }
    node
  }
}

/// A position bound to a tree borrow: dereference, step, compare.
pub struct Cursor<'a, V, KoV, C> {
  tree: &'a RbTree<V, KoV, C>,
  pos: Position,
}

impl<'a, V, KoV, C> Cursor<'a, V, KoV, C> {
  pub fn position(&self) -> Position {
    self.pos
  }

  pub fn is_end(&self) -> bool {
    self.pos.is_end()
  }

  /// The value under the cursor, `None` at the end.
  pub fn get(&self) -> Option<&'a V> {
    self.tree.get(self.pos)
  }

  pub fn move_next(&mut self) {
    self.pos = self.tree.next(self.pos);
  }

  pub fn move_prev(&mut self) {
    self.pos = self.tree.prev(self.pos);
  }
}

impl<V, KoV, C> Clone for Cursor<'_, V, KoV, C> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<V, KoV, C> Copy for Cursor<'_, V, KoV, C> {}

impl<V, KoV, C> PartialEq for Cursor<'_, V, KoV, C> {
  fn eq(
    &self,
    other: &Self,
  ) -> bool {
    ptr::eq(self.tree, other.tree) && self.pos == other.pos
  }
}

impl<V, KoV, C> Eq for Cursor<'_, V, KoV, C> {}

impl<V: fmt::Debug, KoV, C> fmt::Debug for Cursor<'_, V, KoV, C> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Cursor")
      .field("pos", &self.pos)
      .field("value", &self.get())
      .finish()
  }
}

/// In-order iterator over a tree or a range of it.
pub struct Iter<'a, V, KoV, C> {
  tree: &'a RbTree<V, KoV, C>,
  front: Position,
  back: Position,
  remaining: usize,
}

impl<'a, V, KoV, C> Iterator for Iter<'a, V, KoV, C> {
  type Item = &'a V;

  fn next(&mut self) -> Option<&'a V> {
    if self.remaining == 0 {
      return None;
    }

    let tree = self.tree;
    let id = self.front.node()?;

    self.front = tree.next(self.front);
    self.remaining -= 1;

    Some(&tree.nodes[id].value)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<'a, V, KoV, C> DoubleEndedIterator for Iter<'a, V, KoV, C> {
  fn next_back(&mut self) -> Option<&'a V> {
    if self.remaining == 0 {
      return None;
    }

    let tree = self.tree;

    self.back = tree.prev(self.back);
    self.remaining -= 1;

    let id = self.back.node()?;

    Some(&tree.nodes[id].value)
  }
}

impl<V, KoV, C> ExactSizeIterator for Iter<'_, V, KoV, C> {}

impl<V, KoV, C> FusedIterator for Iter<'_, V, KoV, C> {}

impl<V, KoV, C> Clone for Iter<'_, V, KoV, C> {
  fn clone(&self) -> Self {
    Self {
      tree: self.tree,
      front: self.front,
      back: self.back,
      remaining: self.remaining,
    }
  }
}

impl<'a, V, KoV, C> IntoIterator for &'a RbTree<V, KoV, C> {
  type Item = &'a V;
  type IntoIter = Iter<'a, V, KoV, C>;

  fn into_iter(self) -> Iter<'a, V, KoV, C> {
    self.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tree::{Identity, Less};

  type IntTree = RbTree<i32, Identity, Less>;

  fn tree_of(values: &[i32]) -> IntTree {
    let mut tree = IntTree::new();
    for &value in values {
      tree.insert_unique(value).unwrap();
    }
    tree
  }

  #[test]
  fn test_single_element_steps() {
    let tree = tree_of(&[42]);

    let begin = tree.begin();
    assert_eq!(tree.prev(tree.end()), begin);
    assert_eq!(tree.next(begin), tree.end());
    assert_eq!(tree.get(begin), Some(&42));
    assert_eq!(tree.prev(begin), Position::End);
  }

  #[test]
  fn test_empty_tree_begin_is_end() {
    let tree = IntTree::new();

    assert_eq!(tree.begin(), tree.end());
    assert_eq!(tree.prev(tree.end()), Position::End);
    assert_eq!(tree.next(tree.end()), Position::End);
    assert_eq!(tree.iter().next(), None);
  }

  #[test]
  fn test_step_forward_and_back() {
    let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9, 2, 6]);

    let mut forward = Vec::new();
    let mut pos = tree.begin();
    while pos != tree.end() {
      forward.push(*tree.get(pos).unwrap());
      pos = tree.next(pos);
    }
    assert_eq!(forward, (1..=9).collect::<Vec<_>>());

    let mut backward = Vec::new();
    let mut pos = tree.end();
    loop {
      pos = tree.prev(pos);
      match tree.get(pos) {
        Some(value) => backward.push(*value),
        None => break,
      }
    }
    assert_eq!(backward, (1..=9).rev().collect::<Vec<_>>());
  }

  #[test]
  fn test_cursor_moves() {
    let tree = tree_of(&[10, 20, 30]);

    let mut cursor = tree.cursor(tree.find(&20));
    assert_eq!(cursor.get(), Some(&20));

    cursor.move_next();
    assert_eq!(cursor.get(), Some(&30));

    cursor.move_next();
    assert!(cursor.is_end());
    assert_eq!(cursor, tree.cursor(tree.end()));

    cursor.move_prev();
    cursor.move_prev();
    assert_eq!(cursor.get(), Some(&20));
    assert_eq!(cursor.position(), tree.find(&20));
  }

  #[test]
  fn test_iter_both_ends() {
    let tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

    let mut iter = tree.iter();
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.next(), Some(&1));
    assert_eq!(iter.next_back(), Some(&7));
    assert_eq!(iter.len(), 5);

    let middle: Vec<_> = iter.copied().collect();
    assert_eq!(middle, vec![2, 3, 4, 5, 6]);

    let reversed: Vec<_> = tree.iter().rev().copied().collect();
    assert_eq!(reversed, vec![7, 6, 5, 4, 3, 2, 1]);

    let mut meet = tree.iter();
    for _ in 0..7 {
      assert!(meet.next_back().is_some());
    }
    assert_eq!(meet.next(), None);
    assert_eq!(meet.next_back(), None);
  }

  #[test]
  fn test_range_iteration() {
    let tree = tree_of(&[1, 2, 3, 4, 5, 6]);

    let values: Vec<_> = tree.range(tree.lower_bound(&2), tree.lower_bound(&5)).copied().collect();
    assert_eq!(values, vec![2, 3, 4]);

    let tail: Vec<_> = tree.range(tree.find(&5), tree.end()).rev().copied().collect();
    assert_eq!(tail, vec![6, 5]);

    assert_eq!(tree.range(tree.find(&3), tree.find(&3)).count(), 0);
  }

  #[test]
  fn test_into_iterator_for_reference() {
    let tree = tree_of(&[3, 1, 2]);

    let mut total = 0;
    for value in &tree {
      total += value;
    }
    assert_eq!(total, 6);
  }
}
