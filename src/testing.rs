//! Test double for the system memory seam.

use std::{cell::RefCell, collections::HashMap, ptr::NonNull, rc::Rc};

use crate::malloc::{LibcMemory, SystemMemory};

#[derive(Default)]
struct State {
  budget: Option<usize>,
  requests: Vec<usize>,
  refusals: usize,
  live: HashMap<usize, usize>,
}

/// libc-backed memory that records every request and can be told to refuse.
///
/// Clones share state, so a test can keep one handle while the allocator owns
/// another.
#[derive(Clone, Default)]
pub struct RecordingMemory {
  state: Rc<RefCell<State>>,
}

impl RecordingMemory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Refuses every request from now on.
  pub fn refuse(&self) {
    self.state.borrow_mut().budget = Some(0);
  }

  /// Grants `count` more successful requests while refusing.
  pub fn allow(
    &self,
    count: usize,
  ) {
    if let Some(budget) = self.state.borrow_mut().budget.as_mut() {
      *budget += count;
    }
  }

  pub fn unlimited(&self) {
    self.state.borrow_mut().budget = None;
  }

  /// Sizes of every request, granted or refused, in order.
  pub fn requests(&self) -> Vec<usize> {
    self.state.borrow().requests.clone()
  }

  pub fn refusals(&self) -> usize {
    self.state.borrow().refusals
  }

  pub fn live_blocks(&self) -> usize {
    self.state.borrow().live.len()
  }

  pub fn live_bytes(&self) -> usize {
    self.state.borrow().live.values().sum()
  }

  fn grant(&self) -> bool {
    let mut guard = self.state.borrow_mut();
    let state = &mut *guard;
    match state.budget {
      Some(0) => {
        state.refusals += 1;
        false
      }
      Some(ref mut budget) => {
        *budget -= 1;
        true
      }
      None => true,
    }
  }
}

impl SystemMemory for RecordingMemory {
  fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.state.borrow_mut().requests.push(size);

    if !self.grant() {
      return None;
    }

    let ptr = LibcMemory.allocate(size)?;
    self.state.borrow_mut().live.insert(ptr.as_ptr() as usize, size);
    Some(ptr)
  }

  unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
  ) -> Option<NonNull<u8>> {
    self.state.borrow_mut().requests.push(new_size);

    if !self.grant() {
      return None;
    }

    let new_ptr = unsafe { LibcMemory.reallocate(ptr, old_size, new_size)? };
    let mut state = self.state.borrow_mut();
    state.live.remove(&(ptr.as_ptr() as usize));
    state.live.insert(new_ptr.as_ptr() as usize, new_size);
    Some(new_ptr)
  }

  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    self.state.borrow_mut().live.remove(&(ptr.as_ptr() as usize));
    unsafe { LibcMemory.deallocate(ptr, size) }
  }
}
