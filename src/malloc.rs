use std::{fmt, mem, ptr::NonNull};

use libc::{c_void, free, malloc, realloc};
use tracing::{error, warn};

use crate::error::AllocError;

/// Alignment of every block handed out by the system allocator.
///
/// `malloc(3)` returns memory suitably aligned for any fundamental type,
/// which is two machine words on the platforms this crate targets.
pub const SYSTEM_ALIGN: usize = 2 * mem::size_of::<usize>();

/// Callback run when the system allocator refuses a request.
///
/// It is expected to release memory elsewhere (or abort); the allocation is
/// retried after every call, for as long as the handler stays registered.
pub type OomHandler = Box<dyn FnMut()>;

/// Raw source of memory underneath the pool.
///
/// A single attempt per call: no retries, no handler. Returning `None` means
/// the request was refused.
pub trait SystemMemory {
  fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// # Safety
  ///
  /// `ptr` must come from this memory with a size of `old_size` and must not
  /// have been released yet.
  unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
  ) -> Option<NonNull<u8>>;

  /// # Safety
  ///
  /// `ptr` must come from this memory with a size of `size` and must not have
  /// been released yet.
  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  );
}

/// `malloc`/`realloc`/`free` from the C library.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibcMemory;

impl SystemMemory for LibcMemory {
  fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { malloc(size.max(1)) } as *mut u8)
  }

  unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    _old_size: usize,
    new_size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { realloc(ptr.as_ptr() as *mut c_void, new_size.max(1)) } as *mut u8)
  }

  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    _size: usize,
  ) {
    unsafe { free(ptr.as_ptr() as *mut c_void) }
  }
}

/// Large-object path: system memory plus the out-of-memory retry loop.
pub struct MallocAllocator {
  memory: Box<dyn SystemMemory>,
  oom_handler: Option<OomHandler>,
}

impl MallocAllocator {
  pub fn new() -> Self {
    Self::with_memory(Box::new(LibcMemory))
  }

  pub fn with_memory(memory: Box<dyn SystemMemory>) -> Self {
    Self {
      memory,
      oom_handler: None,
    }
  }

  /// Installs `handler` and returns the one it replaces.
  pub fn set_oom_handler(
    &mut self,
    handler: Option<OomHandler>,
  ) -> Option<OomHandler> {
    mem::replace(&mut self.oom_handler, handler)
  }

  pub fn has_oom_handler(&self) -> bool {
    self.oom_handler.is_some()
  }

  /// One attempt against system memory, without running the handler.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.memory.allocate(size)
  }

  /// Allocates `size` bytes, running the out-of-memory handler between
  /// attempts. Fails only when no handler is registered.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if let Some(ptr) = self.memory.allocate(size) {
      return Ok(ptr);
    }

    loop {
      self.run_oom_handler(size)?;

      if let Some(ptr) = self.memory.allocate(size) {
        return Ok(ptr);
      }
    }
  }

  /// Resizes a system block, with the same retry loop as [`allocate`].
  ///
  /// # Safety
  ///
  /// `ptr` must come from this allocator with a size of `old_size`. On success
  /// the old pointer must no longer be used.
  ///
  /// [`allocate`]: MallocAllocator::allocate
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if let Some(ptr) = unsafe { self.memory.reallocate(ptr, old_size, new_size) } {
      return Ok(ptr);
    }

    loop {
      self.run_oom_handler(new_size)?;

      if let Some(ptr) = unsafe { self.memory.reallocate(ptr, old_size, new_size) } {
        return Ok(ptr);
      }
    }
  }

  /// # Safety
  ///
  /// `ptr` must come from this allocator with a size of `size`.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    unsafe { self.memory.deallocate(ptr, size) }
  }

  fn run_oom_handler(
    &mut self,
    size: usize,
  ) -> Result<(), AllocError> {
    let Some(handler) = self.oom_handler.as_mut() else {
      error!(bytes = size, "out of memory and no handler registered");
      return Err(AllocError::OutOfMemory { bytes: size });
    };

    warn!(bytes = size, "system allocation refused, running out-of-memory handler");
    handler();

    Ok(())
  }
}

impl Default for MallocAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for MallocAllocator {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("MallocAllocator")
      .field("has_oom_handler", &self.has_oom_handler())
      .finish_non_exhaustive()
  }
}
