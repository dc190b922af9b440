use std::{
  alloc::{Layout, handle_alloc_error},
  fmt,
  marker::PhantomData,
};

use super::{
  Compare, KeyOf,
  iter::Position,
  node::{Color, Node, NodeId},
  slab::NodeSlab,
};
use crate::{error::AllocError, pool::Pool};

/// Root and cached extremes. All three are `None` exactly when the tree is
/// empty.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct Header {
  pub root: Option<NodeId>,
  pub leftmost: Option<NodeId>,
  pub rightmost: Option<NodeId>,
}

/// Red-black tree of values `V`, ordered by the key `KoV` extracts under the
/// strict order `C`.
///
/// Node storage comes from a [`Pool`]; a failed allocation leaves the tree
/// untouched.
pub struct RbTree<V, KoV, C> {
  pub(super) nodes: NodeSlab<V>,
  pub(super) header: Header,
  compare: C,
  _key_of: PhantomData<fn() -> KoV>,
}

impl<V, KoV, C> RbTree<V, KoV, C> {
  /// Empty tree on a fresh private pool.
  pub fn new() -> Self
  where
    C: Default,
  {
    Self::new_in(Pool::new(), C::default())
  }

  pub fn with_compare(compare: C) -> Self {
    Self::new_in(Pool::new(), compare)
  }

  /// Empty tree drawing node storage from `pool`.
  pub fn new_in(
    pool: Pool,
    compare: C,
  ) -> Self {
    Self {
      nodes: NodeSlab::new(pool),
      header: Header::default(),
      compare,
      _key_of: PhantomData,
    }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.header.root.is_none()
  }

  /// Upper bound on the number of nodes (node ids are 32 bits).
  pub fn max_size(&self) -> usize {
    u32::MAX as usize
  }

  pub fn key_comp(&self) -> &C {
    &self.compare
  }

  pub fn pool(&self) -> &Pool {
    self.nodes.pool()
  }

  pub fn begin(&self) -> Position {
    self.header.leftmost.into()
  }

  pub fn end(&self) -> Position {
    Position::End
  }

  pub fn get(
    &self,
    pos: Position,
  ) -> Option<&V> {
    let id = pos.node()?;
    self.nodes.get(id).map(|node| &node.value)
  }

  /// Mutable access for adapters that only touch the non-key part.
  pub(crate) fn get_mut(
    &mut self,
    pos: Position,
  ) -> Option<&mut V> {
    let id = pos.node()?;
    self.nodes.get_mut(id).map(|node| &mut node.value)
  }

  pub fn first(&self) -> Option<&V> {
    self.get(self.begin())
  }

  pub fn last(&self) -> Option<&V> {
    self.get(self.prev(self.end()))
  }

  /// Drops every value and returns all node blocks to the pool.
  pub fn clear(&mut self) {
    self.nodes.clear();
    self.header = Header::default();
  }

  /// Removes the node at `pos` and returns its value. `End` (or a stale
  /// position) removes nothing.
  ///
  /// Positions of every other element stay valid: a node with two children
  /// is replaced by relinking its successor, never by moving values.
  pub fn erase(
    &mut self,
    pos: Position,
  ) -> Option<V> {
    let z = pos.node()?;
    self.nodes.get(z)?;

    if self.header.leftmost == Some(z) {
      self.header.leftmost = self.next(pos).node();
    }
    if self.header.rightmost == Some(z) {
      self.header.rightmost = self.prev(pos).node();
    }

    let (child, child_parent, removed_color) = match (self.nodes[z].left, self.nodes[z].right) {
      (Some(left), Some(right)) => {
        let successor = self.min_of(right);
        let removed_color = self.nodes[successor].color;
        let child = self.nodes[successor].right;

        let child_parent = if successor == right {
          Some(successor)
        } else {
          let parent = self.nodes[successor].parent;
          self.transplant(successor, child);
          self.nodes[successor].right = Some(right);
          self.nodes[right].parent = Some(successor);
          parent
        };

        self.transplant(z, Some(successor));
        self.nodes[successor].left = Some(left);
        self.nodes[left].parent = Some(successor);
        self.nodes[successor].color = self.nodes[z].color;

        (child, child_parent, removed_color)
      }
      (left, right) => {
        let child = left.or(right);
        let parent = self.nodes[z].parent;
        let removed_color = self.nodes[z].color;
        self.transplant(z, child);

        (child, parent, removed_color)
      }
    };

    if removed_color == Color::Black {
      self.erase_fixup(child, child_parent);
    }

    self.nodes.remove(z).map(|node| node.value)
  }

  /// Removes `first..last` and returns how many values were dropped.
  pub fn erase_range(
    &mut self,
    first: Position,
    last: Position,
  ) -> usize {
    if first == self.begin() && last.is_end() {
      let count = self.len();
      self.clear();
      return count;
    }

    let mut count = 0;
    let mut pos = first;

    while pos != last && !pos.is_end() {
      let next = self.next(pos);
      self.erase(pos);
      pos = next;
      count += 1;
    }

    count
  }

  fn is_red(
    &self,
    node: Option<NodeId>,
  ) -> bool {
    node.is_some_and(|id| self.nodes[id].is_red())
  }

  /// Points `parent`'s link to `old` (or the root) at `new`.
  fn replace_child(
    &mut self,
    parent: Option<NodeId>,
    old: NodeId,
    new: Option<NodeId>,
  ) {
    match parent {
      None => self.header.root = new,
      Some(parent) if self.nodes[parent].left == Some(old) => self.nodes[parent].left = new,
      Some(parent) => self.nodes[parent].right = new,
    }
  }

  /// Puts the subtree `new` where `old` hangs. `old` keeps its own links.
  fn transplant(
    &mut self,
    old: NodeId,
    new: Option<NodeId>,
  ) {
    let parent = self.nodes[old].parent;
    self.replace_child(parent, old, new);

    if let Some(new) = new {
      self.nodes[new].parent = parent;
    }
  }

  fn rotate_left(
    &mut self,
    x: NodeId,
  ) {
    let Some(y) = self.nodes[x].right else {
      return;
    };

    let inner = self.nodes[y].left;
    self.nodes[x].right = inner;
    if let Some(inner) = inner {
      self.nodes[inner].parent = Some(x);
    }

    let parent = self.nodes[x].parent;
    self.nodes[y].parent = parent;
    self.replace_child(parent, x, Some(y));

    self.nodes[y].left = Some(x);
    self.nodes[x].parent = Some(y);
  }

  fn rotate_right(
    &mut self,
    x: NodeId,
  ) {
    let Some(y) = self.nodes[x].left else {
      return;
    };

    let inner = self.nodes[y].right;
    self.nodes[x].left = inner;
    if let Some(inner) = inner {
      self.nodes[inner].parent = Some(x);
    }

    let parent = self.nodes[x].parent;
    self.nodes[y].parent = parent;
    self.replace_child(parent, x, Some(y));

    self.nodes[y].right = Some(x);
    self.nodes[x].parent = Some(y);
  }

  /// Restores the red-black invariants after `node` was linked in red.
  fn rebalance(
    &mut self,
    mut node: NodeId,
  ) {
    while Some(node) != self.header.root {
      let Some(mut parent) = self.nodes[node].parent else {
        break;
      };
      if !self.nodes[parent].is_red() {
        break;
      }
      // a red parent is never the root
      let Some(grandparent) = self.nodes[parent].parent else {
        break;
      };

      if self.nodes[grandparent].left == Some(parent) {
        let uncle = self.nodes[grandparent].right;

        if self.is_red(uncle) {
          self.nodes[parent].color = Color::Black;
          if let Some(uncle) = uncle {
            self.nodes[uncle].color = Color::Black;
          }
          self.nodes[grandparent].color = Color::Red;
          node = grandparent;
          continue;
        }

        if self.nodes[parent].right == Some(node) {
          self.rotate_left(parent);
          (node, parent) = (parent, node);
        }

        self.nodes[parent].color = Color::Black;
        self.nodes[grandparent].color = Color::Red;
        self.rotate_right(grandparent);
      } else {
        let uncle = self.nodes[grandparent].left;

        if self.is_red(uncle) {
          self.nodes[parent].color = Color::Black;
          if let Some(uncle) = uncle {
            self.nodes[uncle].color = Color::Black;
          }
          self.nodes[grandparent].color = Color::Red;
          node = grandparent;
          continue;
        }

        if self.nodes[parent].left == Some(node) {
          self.rotate_right(parent);
          (node, parent) = (parent, node);
        }

        self.nodes[parent].color = Color::Black;
        self.nodes[grandparent].color = Color::Red;
        self.rotate_left(grandparent);
      }
    }

    if let Some(root) = self.header.root {
      self.nodes[root].color = Color::Black;
    }
  }

  /// Removes the extra black left where a black node was spliced out.
  /// `node` may be absent, so its parent travels alongside.
  fn erase_fixup(
    &mut self,
    mut node: Option<NodeId>,
    mut parent: Option<NodeId>,
  ) {
    while node != self.header.root && !self.is_red(node) {
      let Some(p) = parent else {
        break;
      };

      if node == self.nodes[p].left {
        let Some(mut sibling) = self.nodes[p].right else {
          break;
        };

        if self.nodes[sibling].is_red() {
          self.nodes[sibling].color = Color::Black;
          self.nodes[p].color = Color::Red;
          self.rotate_left(p);
          let Some(next) = self.nodes[p].right else {
            break;
          };
          sibling = next;
        }

        if !self.is_red(self.nodes[sibling].left) && !self.is_red(self.nodes[sibling].right) {
          self.nodes[sibling].color = Color::Red;
          node = Some(p);
          parent = self.nodes[p].parent;
          continue;
        }

        if !self.is_red(self.nodes[sibling].right) {
          if let Some(inner) = self.nodes[sibling].left {
            self.nodes[inner].color = Color::Black;
          }
          self.nodes[sibling].color = Color::Red;
          self.rotate_right(sibling);
          let Some(next) = self.nodes[p].right else {
            break;
          };
          sibling = next;
        }

        self.nodes[sibling].color = self.nodes[p].color;
        self.nodes[p].color = Color::Black;
        if let Some(outer) = self.nodes[sibling].right {
          self.nodes[outer].color = Color::Black;
        }
        self.rotate_left(p);
      } else {
        let Some(mut sibling) = self.nodes[p].left else {
          break;
        };

        if self.nodes[sibling].is_red() {
          self.nodes[sibling].color = Color::Black;
          self.nodes[p].color = Color::Red;
          self.rotate_right(p);
          let Some(next) = self.nodes[p].left else {
            break;
          };
          sibling = next;
        }

        if !self.is_red(self.nodes[sibling].left) && !self.is_red(self.nodes[sibling].right) {
          self.nodes[sibling].color = Color::Red;
          node = Some(p);
          parent = self.nodes[p].parent;
          continue;
        }

        if !self.is_red(self.nodes[sibling].left) {
          if let Some(inner) = self.nodes[sibling].right {
            self.nodes[inner].color = Color::Black;
          }
          self.nodes[sibling].color = Color::Red;
          self.rotate_left(sibling);
          let Some(next) = self.nodes[p].left else {
            break;
          };
          sibling = next;
        }

        self.nodes[sibling].color = self.nodes[p].color;
        self.nodes[p].color = Color::Black;
        if let Some(outer) = self.nodes[sibling].left {
          self.nodes[outer].color = Color::Black;
        }
        self.rotate_right(p);
      }

      node = self.header.root;
    }

    if let Some(node) = node {
      self.nodes[node].color = Color::Black;
    }
  }
}

impl<V, KoV, C> RbTree<V, KoV, C>
where
  KoV: KeyOf<V>,
  C: Compare<KoV::Key>,
{
  fn key(
    &self,
    id: NodeId,
  ) -> &KoV::Key {
    KoV::key(&self.nodes[id].value)
  }

  /// Walks from the root to the empty slot where `key` belongs, going left
  /// whenever `key` orders before the current node. Returns the last node
  /// visited and whether the final step went left.
  fn descend(
    &self,
    key: &KoV::Key,
  ) -> (Option<NodeId>, bool) {
    let mut parent = None;
    let mut went_left = true;
    let mut current = self.header.root;

    while let Some(id) = current {
      parent = Some(id);
      went_left = self.compare.less(key, self.key(id));
      current = if went_left {
        self.nodes[id].left
      } else {
        self.nodes[id].right
      };
    }

    (parent, went_left)
  }

  /// Links `value` as a new red child of `parent` and rebalances.
  fn link(
    &mut self,
    parent: Option<NodeId>,
    went_left: bool,
    value: V,
  ) -> Result<NodeId, AllocError> {
    let id = self.nodes.insert(Node::new(value, parent))?;

    match parent {
      None => {
        self.header.root = Some(id);
        self.header.leftmost = Some(id);
        self.header.rightmost = Some(id);
      }
      Some(parent) if went_left => {
        self.nodes[parent].left = Some(id);
        if self.header.leftmost == Some(parent) {
          self.header.leftmost = Some(id);
        }
      }
      Some(parent) => {
        self.nodes[parent].right = Some(id);
        if self.header.rightmost == Some(parent) {
          self.header.rightmost = Some(id);
        }
      }
    }

    self.rebalance(id);

    Ok(id)
  }

  /// Inserts `value` unless an equivalent key is present.
  ///
  /// Returns the position of the new value and `true`, or the position of the
  /// existing equivalent value and `false` (in which case `value` is dropped).
  ///
  /// Equivalence is proven with the strict order alone: the in-order
  /// predecessor of the insertion slot is never greater than the key, so it
  /// is equivalent exactly when it is not less.
  pub fn insert_unique(
    &mut self,
    value: V,
  ) -> Result<(Position, bool), AllocError> {
    let key = KoV::key(&value);
    let (parent, went_left) = self.descend(key);

    let Some(parent) = parent else {
      let id = self.link(None, went_left, value)?;
      return Ok((Position::At(id), true));
    };

    let predecessor = if went_left {
      if self.header.leftmost == Some(parent) {
        let id = self.link(Some(parent), went_left, value)?;
        return Ok((Position::At(id), true));
      }
      self.prev(Position::At(parent))
    } else {
      Position::At(parent)
    };

    if let Position::At(existing) = predecessor {
      if !self.compare.less(self.key(existing), key) {
        return Ok((predecessor, false));
      }
    }

    let id = self.link(Some(parent), went_left, value)?;

    Ok((Position::At(id), true))
  }

  /// Inserts `value` after any equivalent values already present.
  pub fn insert_equal(
    &mut self,
    value: V,
  ) -> Result<Position, AllocError> {
    let (parent, went_left) = self.descend(KoV::key(&value));
    let id = self.link(parent, went_left, value)?;

    Ok(Position::At(id))
  }

  /// First element whose key is not less than `key`.
  pub fn lower_bound(
    &self,
    key: &KoV::Key,
  ) -> Position {
    let mut result = Position::End;
    let mut current = self.header.root;

    while let Some(id) = current {
      if !self.compare.less(self.key(id), key) {
        result = Position::At(id);
        current = self.nodes[id].left;
      } else {
        current = self.nodes[id].right;
      }
    }

    result
  }

  /// First element whose key is greater than `key`.
  pub fn upper_bound(
    &self,
    key: &KoV::Key,
  ) -> Position {
    let mut result = Position::End;
    let mut current = self.header.root;

    while let Some(id) = current {
      if self.compare.less(key, self.key(id)) {
        result = Position::At(id);
        current = self.nodes[id].left;
      } else {
        current = self.nodes[id].right;
      }
    }

    result
  }

  /// Position of an element equivalent to `key`, or `End`.
  pub fn find(
    &self,
    key: &KoV::Key,
  ) -> Position {
    match self.lower_bound(key) {
      Position::At(id) if !self.compare.less(key, self.key(id)) => Position::At(id),
      _ => Position::End,
    }
  }

  pub fn contains(
    &self,
    key: &KoV::Key,
  ) -> bool {
    !self.find(key).is_end()
  }

  pub fn equal_range(
    &self,
    key: &KoV::Key,
  ) -> (Position, Position) {
    (self.lower_bound(key), self.upper_bound(key))
  }

  pub fn count(
    &self,
    key: &KoV::Key,
  ) -> usize {
    let (first, last) = self.equal_range(key);
    self.range(first, last).len()
  }

  /// Removes every element equivalent to `key`; returns how many.
  pub fn erase_key(
    &mut self,
    key: &KoV::Key,
  ) -> usize {
    let (first, last) = self.equal_range(key);
    self.erase_range(first, last)
  }
}

impl<V: Clone, KoV, C: Clone> RbTree<V, KoV, C> {
  /// Deep copy on the same pool, keeping shape and colours.
  pub fn try_clone(&self) -> Result<Self, AllocError> {
    let mut tree = Self::new_in(self.pool().clone(), self.compare.clone());
    tree.copy_from(self)?;
    Ok(tree)
  }

  /// Deep-copy assignment: drops the current contents, then copies `source`.
  /// On failure the tree is left empty.
  pub fn clone_from_tree(
    &mut self,
    source: &Self,
  ) -> Result<(), AllocError> {
    self.clear();
    self.compare = source.compare.clone();
    self.copy_from(source)
  }

  fn copy_from(
    &mut self,
    source: &Self,
  ) -> Result<(), AllocError> {
    let Some(root) = source.header.root else {
      return Ok(());
    };

    match self.copy_subtree(source, root, None) {
      Ok(root) => {
        self.header = Header {
          root: Some(root),
          leftmost: Some(self.min_of(root)),
          rightmost: Some(self.max_of(root)),
        };
        Ok(())
      }
      Err(err) => {
        self.clear();
        Err(err)
      }
    }
  }

  /// Copies the subtree under `node`. Recurses into right children only and
  /// walks the left spine in a loop, so depth stays within the tree height.
  fn copy_subtree(
    &mut self,
    source: &Self,
    node: NodeId,
    parent: Option<NodeId>,
  ) -> Result<NodeId, AllocError> {
    let top = self.clone_node(source, node, parent)?;
    if let Some(right) = source.nodes[node].right {
      let copy = self.copy_subtree(source, right, Some(top))?;
      self.nodes[top].right = Some(copy);
    }

    let mut parent = top;
    let mut current = source.nodes[node].left;

    while let Some(src) = current {
      let copy = self.clone_node(source, src, Some(parent))?;
      self.nodes[parent].left = Some(copy);

      if let Some(right) = source.nodes[src].right {
        let right_copy = self.copy_subtree(source, right, Some(copy))?;
        self.nodes[copy].right = Some(right_copy);
      }

      parent = copy;
      current = source.nodes[src].left;
    }

    Ok(top)
  }

  fn clone_node(
    &mut self,
    source: &Self,
    node: NodeId,
    parent: Option<NodeId>,
  ) -> Result<NodeId, AllocError> {
    let original = &source.nodes[node];
    let mut copy = Node::new(original.value.clone(), parent);
    copy.color = original.color;

    self.nodes.insert(copy)
  }
}

impl<V: Clone, KoV, C: Clone> Clone for RbTree<V, KoV, C> {
  fn clone(&self) -> Self {
    match self.try_clone() {
      Ok(tree) => tree,
      Err(_) => handle_alloc_error(Layout::new::<Node<V>>()),
    }
  }
}

impl<V, KoV, C: Default> Default for RbTree<V, KoV, C> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V: fmt::Debug, KoV, C> fmt::Debug for RbTree<V, KoV, C> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

#[cfg(test)]
impl<V, KoV, C> RbTree<V, KoV, C>
where
  KoV: KeyOf<V>,
  C: Compare<KoV::Key>,
{
  /// Panics unless every red-black and bookkeeping invariant holds.
  pub(crate) fn check_invariants(&self) {
    match self.header.root {
      None => {
        assert_eq!(self.len(), 0, "empty tree with nodes");
        assert!(self.header.leftmost.is_none() && self.header.rightmost.is_none());
      }
      Some(root) => {
        assert!(self.nodes[root].parent.is_none(), "root has a parent");
        assert_eq!(self.nodes[root].color, Color::Black, "root must be black");

        let (count, _) = self.check_subtree(root);
        assert_eq!(count, self.len(), "node count mismatch");
        assert_eq!(self.header.leftmost, Some(self.min_of(root)), "stale leftmost");
        assert_eq!(self.header.rightmost, Some(self.max_of(root)), "stale rightmost");
      }
    }

    let mut previous: Option<&V> = None;
    for value in self.iter() {
      if let Some(previous) = previous {
        assert!(
          !self.compare.less(KoV::key(value), KoV::key(previous)),
          "in-order traversal out of order"
        );
      }
      previous = Some(value);
    }
  }

  /// Returns (node count, black height) of the subtree.
  fn check_subtree(
    &self,
    id: NodeId,
  ) -> (usize, usize) {
    let node = &self.nodes[id];
    let mut count = 1;
    let mut heights = [0; 2];

    for (side, child) in [node.left, node.right].into_iter().enumerate() {
      if let Some(child) = child {
        assert_eq!(self.nodes[child].parent, Some(id), "child parent link mismatch");
        if node.is_red() {
          assert!(!self.nodes[child].is_red(), "red node with red child");
        }

        let (child_count, height) = self.check_subtree(child);
        count += child_count;
        heights[side] = height;
      }
    }

    assert_eq!(heights[0], heights[1], "black height mismatch");

    (count, heights[0] + usize::from(!node.is_red()))
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::BTreeSet, rc::Rc};

  use proptest::prelude::*;

  use super::*;
  use crate::{
    config::PoolConfig,
    pool::BlockAllocator,
    testing::RecordingMemory,
    tree::{First, Greater, Identity, Less},
  };

  type IntTree = RbTree<i32, Identity, Less>;

  fn values(tree: &IntTree) -> Vec<i32> {
    tree.iter().copied().collect()
  }

  #[test]
  fn test_unique_inserts_come_out_sorted() {
    let mut tree = IntTree::new();

    for key in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
      let (pos, inserted) = tree.insert_unique(key).unwrap();
      assert!(inserted);
      assert_eq!(tree.get(pos), Some(&key));
      tree.check_invariants();
    }

    assert_eq!(values(&tree), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(tree.len(), 9);
    assert_eq!(tree.first(), Some(&1));
    assert_eq!(tree.last(), Some(&9));
  }

  #[test]
  fn test_duplicate_is_rejected() {
    let mut tree = IntTree::new();

    let (first, inserted) = tree.insert_unique(5).unwrap();
    assert!(inserted);

    let (second, inserted) = tree.insert_unique(5).unwrap();
    assert!(!inserted);
    assert_eq!(second, first);
    assert_eq!(tree.len(), 1);

    for key in [3, 7, 1, 9] {
      tree.insert_unique(key).unwrap();
    }
    for key in [1, 3, 5, 7, 9] {
      let (pos, inserted) = tree.insert_unique(key).unwrap();
      assert!(!inserted);
      assert_eq!(tree.get(pos), Some(&key));
    }
    assert_eq!(tree.len(), 5);
    tree.check_invariants();
  }

  #[test]
  fn test_equal_keys_keep_insertion_order() {
    let mut tree: RbTree<(i32, char), First, Less> = RbTree::new();

    for entry in [(1, 'a'), (2, 'b'), (1, 'c'), (0, 'd'), (1, 'e'), (2, 'f')] {
      tree.insert_equal(entry).unwrap();
      tree.check_invariants();
    }

    let entries: Vec<_> = tree.iter().copied().collect();
    assert_eq!(
      entries,
      vec![(0, 'd'), (1, 'a'), (1, 'c'), (1, 'e'), (2, 'b'), (2, 'f')]
    );
    assert_eq!(tree.count(&1), 3);
    assert_eq!(tree.count(&3), 0);
  }

  #[test]
  fn test_find_and_bounds() {
    let mut tree = IntTree::new();
    assert_eq!(tree.find(&1), tree.end());

    for key in [10, 20, 30] {
      tree.insert_unique(key).unwrap();
    }

    assert_eq!(tree.get(tree.find(&20)), Some(&20));
    assert_eq!(tree.find(&25), tree.end());
    assert!(tree.contains(&30));
    assert!(!tree.contains(&31));

    assert_eq!(tree.get(tree.lower_bound(&20)), Some(&20));
    assert_eq!(tree.get(tree.upper_bound(&20)), Some(&30));
    assert_eq!(tree.get(tree.lower_bound(&25)), Some(&30));
    assert_eq!(tree.get(tree.lower_bound(&5)), Some(&10));
    assert_eq!(tree.upper_bound(&30), tree.end());

    let (first, last) = tree.equal_range(&20);
    assert_eq!(tree.next(first), last);
    assert!(tree.max_size() > tree.len());
  }

  #[test]
  fn test_erase_keeps_invariants() {
    let mut tree = IntTree::new();
    for key in 1..=100 {
      tree.insert_unique(key).unwrap();
    }

    for key in (2..=100).step_by(2) {
      let pos = tree.find(&key);
      assert_eq!(tree.erase(pos), Some(key));
      tree.check_invariants();
    }

    assert_eq!(values(&tree), (1..=100).step_by(2).collect::<Vec<_>>());
    assert_eq!(tree.erase(tree.end()), None);

    for key in (1..100).step_by(2).rev() {
      assert_eq!(tree.erase_key(&key), 1);
      tree.check_invariants();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.begin(), tree.end());
  }

  #[test]
  fn test_erase_keeps_other_positions() {
    let mut tree = IntTree::new();
    for key in [50, 25, 75, 10, 30, 60, 90] {
      tree.insert_unique(key).unwrap();
    }

    let kept: Vec<_> = [10, 30, 60, 90].iter().map(|key| (tree.find(key), *key)).collect();

    tree.erase(tree.find(&50));
    tree.erase(tree.find(&25));

    for (pos, key) in kept {
      assert_eq!(tree.get(pos), Some(&key));
    }
    tree.check_invariants();
  }

  #[test]
  fn test_erased_position_does_not_alias_new_node() {
    let mut tree = IntTree::new();
    for key in [1, 2, 3] {
      tree.insert_unique(key).unwrap();
    }

    let stale = tree.find(&2);
    assert_eq!(tree.erase(stale), Some(2));

    let (fresh, inserted) = tree.insert_unique(99).unwrap();
    assert!(inserted);
    assert_ne!(fresh, stale);

    assert_eq!(tree.get(stale), None);
    assert_eq!(tree.erase(stale), None);
    assert_eq!(values(&tree), vec![1, 3, 99]);
    tree.check_invariants();
  }

  #[test]
  fn test_positions_die_with_clear() {
    let mut tree = IntTree::new();
    tree.insert_unique(7).unwrap();
    let old = tree.begin();

    tree.clear();
    tree.insert_unique(8).unwrap();

    assert_eq!(tree.get(old), None);
    assert_eq!(tree.erase(old), None);
    assert_eq!(tree.len(), 1);
  }

  #[test]
  #[should_panic(expected = "vacant or stale")]
  fn test_stepping_from_erased_position_panics() {
    let mut tree = IntTree::new();
    for key in [1, 2, 3] {
      tree.insert_unique(key).unwrap();
    }

    let stale = tree.find(&2);
    tree.erase(stale);
    tree.insert_unique(4).unwrap();

    tree.next(stale);
  }

  #[test]
  fn test_erase_range() {
    let mut tree = IntTree::new();
    for key in 0..20 {
      tree.insert_unique(key).unwrap();
    }

    let removed = tree.erase_range(tree.find(&5), tree.find(&15));
    assert_eq!(removed, 10);
    tree.check_invariants();
    assert_eq!(values(&tree), (0..5).chain(15..20).collect::<Vec<_>>());

    let removed = tree.erase_range(tree.begin(), tree.end());
    assert_eq!(removed, 10);
    assert!(tree.is_empty());
  }

  #[test]
  fn test_custom_orders() {
    let mut descending: RbTree<i32, Identity, Greater> = RbTree::new();
    for key in [3, 1, 4, 1, 5, 9, 2, 6] {
      descending.insert_unique(key).unwrap();
    }
    descending.check_invariants();
    assert_eq!(descending.iter().copied().collect::<Vec<_>>(), vec![9, 6, 5, 4, 3, 2, 1]);

    let by_magnitude = |a: &i32, b: &i32| a.abs() < b.abs();
    let mut tree = RbTree::<i32, Identity, _>::with_compare(by_magnitude);
    assert!(tree.insert_unique(-3).unwrap().1);
    assert!(!tree.insert_unique(3).unwrap().1);
    assert!(tree.insert_unique(-1).unwrap().1);
    assert_eq!(tree.get(tree.find(&1)), Some(&-1));
    assert!(tree.key_comp().less(&1, &-2));
  }

  #[test]
  fn test_clone_is_deep() {
    let mut tree = IntTree::new();
    for key in [8, 4, 12, 2, 6, 10, 14] {
      tree.insert_unique(key).unwrap();
    }

    let mut copy = tree.clone();
    copy.check_invariants();
    assert_eq!(values(&copy), values(&tree));
    assert!(copy.pool().ptr_eq(tree.pool()));

    copy.insert_unique(100).unwrap();
    copy.erase_key(&8);
    assert_eq!(values(&tree), vec![2, 4, 6, 8, 10, 12, 14]);
    assert_eq!(values(&copy), vec![2, 4, 6, 10, 12, 14, 100]);
  }

  #[test]
  fn test_clone_from_tree_replaces_contents() {
    let mut source = IntTree::new();
    for key in 0..50 {
      source.insert_unique(key * 3).unwrap();
    }

    let mut target = IntTree::new();
    for key in 0..10 {
      target.insert_unique(-key).unwrap();
    }

    target.clone_from_tree(&source).unwrap();
    target.check_invariants();
    assert_eq!(values(&target), values(&source));

    target.clone_from_tree(&IntTree::new()).unwrap();
    assert!(target.is_empty());
  }

  #[test]
  fn test_values_dropped_with_tree() {
    let shared = Rc::new(());
    let mut tree: RbTree<(u32, Rc<()>), First, Less> = RbTree::new();

    for key in 0..10 {
      tree.insert_unique((key, shared.clone())).unwrap();
    }
    assert!(!tree.insert_unique((3, shared.clone())).unwrap().1);
    assert_eq!(Rc::strong_count(&shared), 11);

    let removed = tree.erase(tree.find(&4));
    assert!(removed.is_some());
    drop(removed);
    assert_eq!(Rc::strong_count(&shared), 10);

    drop(tree);
    assert_eq!(Rc::strong_count(&shared), 1);
  }

  #[test]
  fn test_failed_allocation_leaves_tree_unchanged() {
    let memory = RecordingMemory::new();
    let pool = Pool::from_allocator(BlockAllocator::with_memory(PoolConfig::default(), Box::new(memory.clone())).unwrap());
    let mut tree: RbTree<u64, Identity, Less> = RbTree::new_in(pool, Less);

    for key in 0..10 {
      tree.insert_unique(key).unwrap();
    }
    memory.refuse();

    let mut key = 10;
    let err = loop {
      match tree.insert_unique(key) {
        Ok(_) => key += 1,
        Err(err) => break err,
      }
      assert!(key < 10_000, "pool never ran dry");
    };

    assert!(matches!(err, AllocError::OutOfMemory { .. }));
    assert_eq!(tree.len(), key as usize);
    assert!(!tree.contains(&key));
    tree.check_invariants();

    memory.unlimited();
    assert!(tree.insert_equal(key).is_ok());
    tree.check_invariants();
  }

  #[test]
  fn test_out_of_memory_on_empty_tree() {
    let memory = RecordingMemory::new();
    memory.refuse();
    let pool = Pool::from_allocator(BlockAllocator::with_memory(PoolConfig::default(), Box::new(memory)).unwrap());
    let mut tree: RbTree<i32, Identity, Less> = RbTree::new_in(pool, Less);

    assert!(tree.insert_unique(1).is_err());
    assert!(tree.is_empty());
    assert_eq!(tree.begin(), tree.end());
    tree.check_invariants();
  }

  #[derive(Clone, Debug)]
  enum Op {
    Insert(i32),
    Erase(i32),
  }

  fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
      3 => (0i32..128).prop_map(Op::Insert),
      2 => (0i32..128).prop_map(Op::Erase),
    ]
  }

  proptest! {
    #[test]
    fn unique_tree_matches_btreeset(ops in proptest::collection::vec(arb_op(), 1..300)) {
      let mut tree = IntTree::new();
      let mut model = BTreeSet::new();

      for op in ops {
        match op {
          Op::Insert(key) => {
            let (pos, inserted) = tree.insert_unique(key).unwrap();
            prop_assert_eq!(inserted, model.insert(key));
            prop_assert_eq!(tree.get(pos), Some(&key));
          }
          Op::Erase(key) => {
            prop_assert_eq!(tree.erase_key(&key), usize::from(model.remove(&key)));
          }
        }
        tree.check_invariants();
      }

      prop_assert_eq!(values(&tree), model.iter().copied().collect::<Vec<_>>());
      prop_assert_eq!(tree.len(), model.len());
    }

    #[test]
    fn multi_tree_matches_sorted_vec(keys in proptest::collection::vec(0i32..16, 1..200)) {
      let mut tree = IntTree::new();
      let mut model = Vec::new();

      for key in keys {
        tree.insert_equal(key).unwrap();
        model.push(key);
        tree.check_invariants();
      }
      model.sort();

      prop_assert_eq!(values(&tree), model.clone());
      for key in 0..16 {
        prop_assert_eq!(tree.count(&key), model.iter().filter(|k| **k == key).count());
      }
    }

    #[test]
    fn erasing_everything_empties_tree(keys in proptest::collection::btree_set(any::<i32>(), 1..200), seed in any::<u64>()) {
      let mut tree = IntTree::new();
      for &key in &keys {
        tree.insert_unique(key).unwrap();
      }

      let mut order: Vec<_> = keys.into_iter().collect();
      let len = order.len();
      for i in 0..len {
        let j = (seed as usize).wrapping_mul(i + 1) % len;
        order.swap(i, j);
      }

      for key in order {
        prop_assert!(tree.erase(tree.find(&key)).is_some());
        tree.check_invariants();
      }

      prop_assert!(tree.is_empty());
    }
  }
}
