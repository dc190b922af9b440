use std::ptr::{self, NonNull};

/// Link stored in the first machine word of a free block.
///
/// A block only carries this header while it sits on a free list. Once it is
/// handed out the caller owns every byte of it, header included.
pub struct FreeBlock {
  pub next: *mut FreeBlock,
}

impl FreeBlock {
  pub fn new(next: *mut FreeBlock) -> Self {
    Self { next }
  }
}

/// Intrusive singly linked list of equally sized free blocks.
///
/// The list keeps no storage of its own: every link lives inside the block it
/// describes.
pub struct FreeList {
  head: *mut FreeBlock,
  len: usize,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
      len: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_null()
  }

  /// Pushes `block` onto the head of the list.
  ///
  /// # Safety
  ///
  /// `block` must be valid for writes of one pointer, aligned for a pointer,
  /// and must not be read or written by anyone else until it is popped again.
  pub unsafe fn push(
    &mut self,
    block: NonNull<u8>,
  ) {
    let block = block.as_ptr() as *mut FreeBlock;

    unsafe {
      block.write(FreeBlock::new(self.head));
    }

    self.head = block;
    self.len += 1;
  }

  /// Pops the most recently pushed block.
  pub fn pop(&mut self) -> Option<NonNull<u8>> {
    let block = NonNull::new(self.head)?;

    // SAFETY: only `push` puts blocks on the list and it requires them to stay
    // valid and untouched while linked.
    self.head = unsafe { block.as_ref().next };
    self.len -= 1;

    Some(block.cast())
  }

  /// Threads `count` consecutive blocks of `size` bytes starting at `chunk`
  /// onto the list. The blocks keep address order, so `chunk` becomes the new
  /// head.
  ///
  /// # Safety
  ///
  /// The whole span `chunk..chunk + size * count` must satisfy the contract of
  /// [`FreeList::push`] and `size` must be a multiple of the pointer alignment.
  pub unsafe fn thread(
    &mut self,
    chunk: NonNull<u8>,
    size: usize,
    count: usize,
  ) {
    for i in (0..count).rev() {
      unsafe {
        self.push(chunk.add(i * size));
      }
    }
  }
}

impl Default for FreeList {
  fn default() -> Self {
    Self::new()
  }
}
