//! Pool configuration parameters.

use std::mem;

use crate::error::ConfigError;
use crate::malloc::SYSTEM_ALIGN;

/// Configuration for [`BlockAllocator`](crate::BlockAllocator).
///
/// Controls size-class rounding, the small-object threshold and how many
/// blocks a refill carves at once. Validated when the allocator is built;
/// immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
  /// Size-class granularity in bytes.
  ///
  /// Default: 8. Must be a power of two, at least one pointer wide (a free
  /// block stores its link in its first word) and at most [`SYSTEM_ALIGN`]
  /// (arenas come from the system allocator and only carry that alignment).
  pub align: usize,

  /// Largest request served from the free lists. Anything bigger goes
  /// straight to the system allocator.
  ///
  /// Default: 128. Must be a non-zero multiple of `align`.
  pub max_bytes: usize,

  /// Number of blocks requested from the arena when a free list runs dry.
  ///
  /// Default: 20.
  pub refill_count: usize,
}

impl PoolConfig {
  pub const DEFAULT_ALIGN: usize = 8;

  pub const DEFAULT_MAX_BYTES: usize = 128;

  pub const DEFAULT_REFILL_COUNT: usize = 20;

  pub fn new() -> Self {
    Self {
      align: Self::DEFAULT_ALIGN,
      max_bytes: Self::DEFAULT_MAX_BYTES,
      refill_count: Self::DEFAULT_REFILL_COUNT,
    }
  }

  pub fn with_align(
    mut self,
    align: usize,
  ) -> Self {
    self.align = align;
    self
  }

  pub fn with_max_bytes(
    mut self,
    max_bytes: usize,
  ) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  pub fn with_refill_count(
    mut self,
    refill_count: usize,
  ) -> Self {
    self.refill_count = refill_count;
    self
  }

  /// Number of size classes, and therefore of free lists.
  pub fn class_count(&self) -> usize {
    self.max_bytes / self.align
  }

  /// Largest batch the pool may ask for at once, twice the biggest class
  /// times the refill count. `None` when that does not fit in `usize`.
  fn max_arena_request(&self) -> Option<usize> {
    self.max_bytes.checked_mul(self.refill_count)?.checked_mul(2)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let min = mem::size_of::<usize>();

    if !self.align.is_power_of_two() || self.align < min || self.align > SYSTEM_ALIGN {
      return Err(ConfigError::InvalidAlignment {
        align: self.align,
        min,
        max: SYSTEM_ALIGN,
      });
    }

    if self.max_bytes == 0 || self.max_bytes % self.align != 0 {
      return Err(ConfigError::InvalidThreshold {
        max_bytes: self.max_bytes,
        align: self.align,
      });
    }

    if self.refill_count == 0 || self.max_arena_request().is_none() {
      return Err(ConfigError::InvalidRefillCount {
        refill_count: self.refill_count,
      });
    }

    Ok(())
  }
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self::new()
  }
}
