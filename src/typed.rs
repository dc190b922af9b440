use std::{fmt, marker::PhantomData, mem, ptr::NonNull};

use crate::{error::AllocError, malloc::SYSTEM_ALIGN, pool::Pool};

/// Allocates storage for `n` values of `T` from a [`Pool`].
///
/// Only converts counts into byte sizes; values are neither constructed nor
/// dropped here. Types aligned above the pool's alignment are routed to the
/// system path, which guarantees [`SYSTEM_ALIGN`].
pub struct TypedAllocator<T> {
  pool: Pool,
  _marker: PhantomData<fn() -> T>,
}

impl<T> TypedAllocator<T> {
  const ALIGN_SUPPORTED: () = assert!(
    mem::align_of::<T>() <= SYSTEM_ALIGN,
    "type alignment exceeds what the system allocator guarantees"
  );

  pub fn new(pool: Pool) -> Self {
    #[allow(clippy::let_unit_value)]
    let () = Self::ALIGN_SUPPORTED;

    Self {
      pool,
      _marker: PhantomData,
    }
  }

  pub fn pool(&self) -> &Pool {
    &self.pool
  }

  /// Storage for `n` values. `n == 0` and zero-sized `T` get a dangling,
  /// well-aligned pointer without touching the pool.
  pub fn allocate(
    &self,
    n: usize,
  ) -> Result<NonNull<T>, AllocError> {
    match self.byte_count(n)? {
      0 => Ok(NonNull::dangling()),
      bytes => Ok(self.pool.allocate(bytes)?.cast()),
    }
  }

  pub fn allocate_one(&self) -> Result<NonNull<T>, AllocError> {
    self.allocate(1)
  }

  /// # Safety
  ///
  /// `ptr` must come from [`allocate`](Self::allocate) on an allocator sharing
  /// this pool, with the same `n`, and must not be used afterwards. Any values
  /// stored there must already have been dropped or moved out.
  pub unsafe fn deallocate(
    &self,
    ptr: NonNull<T>,
    n: usize,
  ) {
    if let Ok(bytes) = self.byte_count(n) {
      if bytes != 0 {
        unsafe { self.pool.deallocate(ptr.cast(), bytes) };
      }
    }
  }

  /// # Safety
  ///
  /// See [`deallocate`](Self::deallocate) with `n == 1`.
  pub unsafe fn deallocate_one(
    &self,
    ptr: NonNull<T>,
  ) {
    unsafe { self.deallocate(ptr, 1) }
  }

  fn byte_count(
    &self,
    n: usize,
  ) -> Result<usize, AllocError> {
    let bytes = mem::size_of::<T>()
      .checked_mul(n)
      .ok_or(AllocError::OutOfMemory { bytes: usize::MAX })?;

    let config = self.pool.config();

    if bytes != 0 && mem::align_of::<T>() > config.align {
      return Ok(bytes.max(config.max_bytes + 1));
    }

    Ok(bytes)
  }
}

impl<T> Clone for TypedAllocator<T> {
  fn clone(&self) -> Self {
    Self::new(self.pool.clone())
  }
}

impl<T> fmt::Debug for TypedAllocator<T> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("TypedAllocator")
      .field("type", &std::any::type_name::<T>())
      .field("pool", &self.pool)
      .finish()
  }
}
