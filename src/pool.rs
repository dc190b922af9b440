use std::{
  cell::RefCell,
  fmt,
  ptr::{self, NonNull},
  rc::Rc,
};

use tracing::{debug, trace, warn};

use crate::{
  align_to,
  block::FreeList,
  config::PoolConfig,
  error::{AllocError, ConfigError},
  malloc::{MallocAllocator, OomHandler, SystemMemory},
};

/// Two-level block allocator.
///
/// Requests above `max_bytes` go straight to the system path. Smaller ones
/// are rounded up to a size class and served from that class's free list,
/// which is refilled in batches carved out of a shared arena.
pub struct BlockAllocator {
  config: PoolConfig,
  free_lists: Vec<FreeList>,
  watermark: *mut u8,
  arena_end: *mut u8,
  heap_size: usize,
  arenas: Vec<(NonNull<u8>, usize)>,
  system: MallocAllocator,
}

impl BlockAllocator {
  pub fn new() -> Self {
    Self::build(PoolConfig::default(), MallocAllocator::new())
  }

  pub fn with_config(config: PoolConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self::build(config, MallocAllocator::new()))
  }

  /// Builds an allocator drawing arenas and large blocks from `memory`.
  pub fn with_memory(
    config: PoolConfig,
    memory: Box<dyn SystemMemory>,
  ) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self::build(config, MallocAllocator::with_memory(memory)))
  }

  fn build(
    config: PoolConfig,
    system: MallocAllocator,
  ) -> Self {
    Self {
      config,
      free_lists: (0..config.class_count()).map(|_| FreeList::new()).collect(),
      watermark: ptr::null_mut(),
      arena_end: ptr::null_mut(),
      heap_size: 0,
      arenas: Vec::new(),
      system,
    }
  }

  pub fn config(&self) -> &PoolConfig {
    &self.config
  }

  /// Total bytes ever requested from the system for arenas.
  pub fn heap_size(&self) -> usize {
    self.heap_size
  }

  /// Bytes left in the current arena above the watermark.
  pub fn arena_remaining(&self) -> usize {
    self.arena_end as usize - self.watermark as usize
  }

  /// Number of blocks waiting on the free list that serves `bytes`.
  pub fn free_count(
    &self,
    bytes: usize,
  ) -> usize {
    if bytes > self.config.max_bytes {
      return 0;
    }

    self.free_lists[self.class_index(bytes)].len()
  }

  pub fn set_oom_handler(
    &mut self,
    handler: Option<OomHandler>,
  ) -> Option<OomHandler> {
    self.system.set_oom_handler(handler)
  }

  /// Allocates `bytes` bytes aligned to the configured alignment.
  ///
  /// Zero-byte requests are served from the smallest size class.
  pub fn allocate(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if bytes > self.config.max_bytes {
      return self.system.allocate(bytes);
    }

    let index = self.class_index(bytes);

    if let Some(block) = self.free_lists[index].pop() {
      return Ok(block);
    }

    self.refill(self.class_size(bytes))
  }

  /// Returns a block to its free list, or to the system when it is large.
  ///
  /// # Safety
  ///
  /// `ptr` must come from [`allocate`](Self::allocate) or
  /// [`reallocate`](Self::reallocate) on this allocator with the same `bytes`,
  /// and must not be used afterwards.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    bytes: usize,
  ) {
    if bytes > self.config.max_bytes {
      unsafe { self.system.deallocate(ptr, bytes) };
      return;
    }

    let index = self.class_index(bytes);

    unsafe { self.free_lists[index].push(ptr) };
  }

  /// Resizes a block, keeping the first `min(old_bytes, new_bytes)` bytes.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate) for `ptr` and
  /// `old_bytes`. On success the old pointer must no longer be used.
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    old_bytes: usize,
    new_bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let max = self.config.max_bytes;

    if old_bytes > max && new_bytes > max {
      return unsafe { self.system.reallocate(ptr, old_bytes, new_bytes) };
    }

    if old_bytes <= max && new_bytes <= max && self.class_index(old_bytes) == self.class_index(new_bytes) {
      return Ok(ptr);
    }

    let new_ptr = self.allocate(new_bytes)?;

    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_bytes.min(new_bytes));
      self.deallocate(ptr, old_bytes);
    }

    Ok(new_ptr)
  }

  fn class_size(
    &self,
    bytes: usize,
  ) -> usize {
    align_to!(bytes.max(1), self.config.align)
  }

  fn class_index(
    &self,
    bytes: usize,
  ) -> usize {
    self.class_size(bytes) / self.config.align - 1
  }

  /// Hands out one block of `size` bytes and parks the rest of the batch on
  /// the free list of that class.
  fn refill(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let (chunk, count) = self.chunk_alloc(size, self.config.refill_count)?;

    if count > 1 {
      let index = self.class_index(size);

      unsafe { self.free_lists[index].thread(chunk.add(size), size, count - 1) };
    }

    trace!(class = size, blocks = count, "refilled free list");

    Ok(chunk)
  }

  /// Carves up to `want` blocks of `size` bytes from the arena, growing it as
  /// needed. Returns the span and how many blocks it holds.
  fn chunk_alloc(
    &mut self,
    size: usize,
    want: usize,
  ) -> Result<(NonNull<u8>, usize), AllocError> {
    let total = size.checked_mul(want).ok_or(AllocError::OutOfMemory { bytes: usize::MAX })?;

    loop {
      let remaining = self.arena_remaining();

      if remaining >= total {
        return Ok((self.carve(total), want));
      }

      if remaining >= size {
        let count = remaining / size;
        return Ok((self.carve(count * size), count));
      }

      self.donate_leftover();

      let request = total
        .checked_mul(2)
        .and_then(|bytes| bytes.checked_add(align_to!(self.heap_size >> 4, self.config.align)))
        .ok_or(AllocError::OutOfMemory { bytes: usize::MAX })?;

      if let Some(arena) = self.system.try_allocate(request) {
        self.adopt_arena(arena, request);
        continue;
      }

      warn!(bytes = request, class = size, "arena request refused, repossessing a free block");

      if let Some((block, block_size)) = self.repossess(size) {
        self.watermark = block.as_ptr();
        self.arena_end = unsafe { block.as_ptr().add(block_size) };
        continue;
      }

      let arena = self.system.allocate(request)?;
      self.adopt_arena(arena, request);
    }
  }

  fn carve(
    &mut self,
    bytes: usize,
  ) -> NonNull<u8> {
    debug_assert!(bytes > 0 && bytes <= self.arena_remaining());

    let start = self.watermark;

    unsafe {
      self.watermark = start.add(bytes);

      // the arena holds at least `bytes > 0` bytes, so the watermark is live
      NonNull::new_unchecked(start)
    }
  }

  /// Moves whatever is left of the arena onto the free list it fits exactly.
  fn donate_leftover(&mut self) {
    let remaining = self.arena_remaining();

    if let Some(start) = NonNull::new(self.watermark) {
      if remaining > 0 {
        let index = self.class_index(remaining);

        unsafe { self.free_lists[index].push(start) };

        trace!(bytes = remaining, "donated arena leftover");
      }
    }

    self.watermark = ptr::null_mut();
    self.arena_end = ptr::null_mut();
  }

  /// Takes one block from the first non-empty free list serving at least
  /// `size` bytes.
  fn repossess(
    &mut self,
    size: usize,
  ) -> Option<(NonNull<u8>, usize)> {
    let first = self.class_index(size);

    (first..self.free_lists.len()).find_map(|index| {
      let block = self.free_lists[index].pop()?;
      Some((block, (index + 1) * self.config.align))
    })
  }

  fn adopt_arena(
    &mut self,
    arena: NonNull<u8>,
    bytes: usize,
  ) {
    self.arenas.push((arena, bytes));
    self.heap_size += bytes;
    self.watermark = arena.as_ptr();
    self.arena_end = unsafe { arena.as_ptr().add(bytes) };

    debug!(bytes, heap_size = self.heap_size, "arena grown");
  }
}

impl Default for BlockAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for BlockAllocator {
  fn drop(&mut self) {
    for (arena, bytes) in self.arenas.drain(..) {
      unsafe { self.system.deallocate(arena, bytes) };
    }
  }
}

impl fmt::Debug for BlockAllocator {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("BlockAllocator")
      .field("config", &self.config)
      .field("heap_size", &self.heap_size)
      .field("arena_remaining", &self.arena_remaining())
      .field("arenas", &self.arenas.len())
      .finish_non_exhaustive()
  }
}

/// Shared handle to a [`BlockAllocator`].
///
/// Cheap to clone; every container that needs node storage keeps one. The
/// handle is single-threaded (`!Send`, `!Sync`). An out-of-memory handler runs
/// while the pool is borrowed and must not call back into it.
#[derive(Clone, Default)]
pub struct Pool {
  inner: Rc<RefCell<BlockAllocator>>,
}

impl Pool {
  pub fn new() -> Self {
    Self::from_allocator(BlockAllocator::new())
  }

  pub fn with_config(config: PoolConfig) -> Result<Self, ConfigError> {
    Ok(Self::from_allocator(BlockAllocator::with_config(config)?))
  }

  pub fn from_allocator(allocator: BlockAllocator) -> Self {
    Self {
      inner: Rc::new(RefCell::new(allocator)),
    }
  }

  pub fn allocate(
    &self,
    bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.inner.borrow_mut().allocate(bytes)
  }

  /// # Safety
  ///
  /// See [`BlockAllocator::deallocate`].
  pub unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    bytes: usize,
  ) {
    unsafe { self.inner.borrow_mut().deallocate(ptr, bytes) }
  }

  /// # Safety
  ///
  /// See [`BlockAllocator::reallocate`].
  pub unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    old_bytes: usize,
    new_bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    unsafe { self.inner.borrow_mut().reallocate(ptr, old_bytes, new_bytes) }
  }

  pub fn set_oom_handler(
    &self,
    handler: Option<OomHandler>,
  ) -> Option<OomHandler> {
    self.inner.borrow_mut().set_oom_handler(handler)
  }

  pub fn config(&self) -> PoolConfig {
    *self.inner.borrow().config()
  }

  pub fn heap_size(&self) -> usize {
    self.inner.borrow().heap_size()
  }

  pub fn arena_remaining(&self) -> usize {
    self.inner.borrow().arena_remaining()
  }

  pub fn free_count(
    &self,
    bytes: usize,
  ) -> usize {
    self.inner.borrow().free_count(bytes)
  }

  /// Whether both handles share one allocator.
  pub fn ptr_eq(
    &self,
    other: &Pool,
  ) -> bool {
    Rc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for Pool {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self.inner.try_borrow() {
      Ok(allocator) => f.debug_tuple("Pool").field(&*allocator).finish(),
      Err(_) => f.write_str("Pool(<borrowed>)"),
    }
  }
}
