use std::{
  mem,
  ops::{Index, IndexMut},
  ptr::NonNull,
};

use super::node::{Node, NodeId};
use crate::{error::AllocError, pool::Pool, typed::TypedAllocator};

struct Slot<V> {
  generation: u32,
  node: Option<NonNull<Node<V>>>,
}

/// Slot table owning every node of one tree.
///
/// Each node lives in its own pool block; the table maps ids to blocks and
/// recycles vacated slots under a new generation.
pub(crate) struct NodeSlab<V> {
  allocator: TypedAllocator<Node<V>>,
  slots: Vec<Slot<V>>,
  vacant: Vec<u32>,
  len: usize,
}

impl<V> NodeSlab<V> {
  pub fn new(pool: Pool) -> Self {
    Self {
      allocator: TypedAllocator::new(pool),
      slots: Vec::new(),
      vacant: Vec::new(),
      len: 0,
    }
  }

  pub fn pool(&self) -> &Pool {
    self.allocator.pool()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Moves `node` into pool storage. Nothing changes when the pool fails or
  /// the slot table is out of ids.
  pub fn insert(
    &mut self,
    node: Node<V>,
  ) -> Result<NodeId, AllocError> {
    let reused = self.vacant.last().copied();
    let index = match reused {
      Some(index) => index,
      None => slot_index(self.slots.len()).ok_or(AllocError::OutOfMemory {
        bytes: mem::size_of::<Node<V>>(),
      })?,
    };

    let ptr = self.allocator.allocate_one()?;

    unsafe { ptr.as_ptr().write(node) };

    if reused.is_some() {
      self.vacant.pop();
    } else {
      self.slots.push(Slot {
        generation: 0,
        node: None,
      });
    }

    let slot = &mut self.slots[index as usize];
    slot.node = Some(ptr);
    self.len += 1;

    Ok(NodeId::new(index, slot.generation))
  }

  /// Moves the node out of storage and gives its block back to the pool.
  pub fn remove(
    &mut self,
    id: NodeId,
  ) -> Option<Node<V>> {
    let slot = self.slots.get_mut(id.index())?;
    if slot.generation != id.generation() {
      return None;
    }
    let ptr = slot.node.take()?;
    slot.generation = slot.generation.wrapping_add(1);

    let node = unsafe { ptr.as_ptr().read() };

    unsafe { self.allocator.deallocate_one(ptr) };

    self.vacant.push(id.index() as u32);
    self.len -= 1;

    Some(node)
  }

  fn live(
    &self,
    id: NodeId,
  ) -> Option<NonNull<Node<V>>> {
    let slot = self.slots.get(id.index())?;
    if slot.generation != id.generation() {
      return None;
    }
    slot.node
  }

  pub fn get(
    &self,
    id: NodeId,
  ) -> Option<&Node<V>> {
    let ptr = self.live(id)?;

    Some(unsafe { ptr.as_ref() })
  }

  pub fn get_mut(
    &mut self,
    id: NodeId,
  ) -> Option<&mut Node<V>> {
    let mut ptr = self.live(id)?;

    Some(unsafe { ptr.as_mut() })
  }

  /// Drops every node and returns all blocks to the pool. Every id handed out
  /// so far stops resolving.
  pub fn clear(&mut self) {
    self.vacant.clear();

    for (index, slot) in self.slots.iter_mut().enumerate() {
      if let Some(ptr) = slot.node.take() {
        slot.generation = slot.generation.wrapping_add(1);
        unsafe {
          ptr.as_ptr().drop_in_place();
          self.allocator.deallocate_one(ptr);
        }
      }
      self.vacant.push(index as u32);
    }

    self.len = 0;
  }
}

/// Index for a new slot at position `len`, if it still fits in a node id.
fn slot_index(len: usize) -> Option<u32> {
  u32::try_from(len).ok()
}

impl<V> Index<NodeId> for NodeSlab<V> {
  type Output = Node<V>;

  fn index(
    &self,
    id: NodeId,
  ) -> &Node<V> {
    match self.get(id) {
      Some(node) => node,
      None => panic!("node {:?} is vacant or stale", id),
    }
  }
}

impl<V> IndexMut<NodeId> for NodeSlab<V> {
  fn index_mut(
    &mut self,
    id: NodeId,
  ) -> &mut Node<V> {
    match self.get_mut(id) {
      Some(node) => node,
      None => panic!("node {:?} is vacant or stale", id),
    }
  }
}

impl<V> Drop for NodeSlab<V> {
  fn drop(&mut self) {
    self.clear();
  }
}
