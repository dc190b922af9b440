#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
  Red,
  Black,
}

/// Handle to a node in its tree's slot table.
///
/// Links between nodes are plain handles, so the cyclic parent/child graph
/// never owns anything: the tree owns every node through its slab. The
/// generation advances whenever a slot is vacated, so a handle to an erased
/// node stops resolving instead of aliasing the next node placed in its slot
/// (until one slot has been reused 2^32 times).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
  index: u32,
  generation: u32,
}

impl NodeId {
  pub(crate) fn new(
    index: u32,
    generation: u32,
  ) -> Self {
    Self { index, generation }
  }

  pub fn index(self) -> usize {
    self.index as usize
  }

  pub fn generation(self) -> u32 {
    self.generation
  }
}

pub(crate) struct Node<V> {
  pub color: Color,
  pub parent: Option<NodeId>,
  pub left: Option<NodeId>,
  pub right: Option<NodeId>,
  pub value: V,
}

impl<V> Node<V> {
  /// A detached red node, ready to be linked under `parent`.
  pub fn new(
    value: V,
    parent: Option<NodeId>,
  ) -> Self {
    Self {
      color: Color::Red,
      parent,
      left: None,
      right: None,
      value,
    }
  }

  pub fn is_red(&self) -> bool {
    self.color == Color::Red
  }
}
