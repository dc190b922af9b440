//! Error types for the allocator and the containers built on it.

use thiserror::Error;

/// Failure to obtain memory.
///
/// Raised by the system path once the out-of-memory handler loop gives up
/// (no handler registered). Pool, typed allocator and containers propagate it
/// unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  #[error("out of memory: failed to allocate {bytes} bytes")]
  OutOfMemory { bytes: usize },
}

/// Rejected [`PoolConfig`](crate::PoolConfig) values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
  #[error("alignment {align} must be a power of two between {min} and {max}")]
  InvalidAlignment { align: usize, min: usize, max: usize },

  #[error("small-object threshold {max_bytes} must be a non-zero multiple of the alignment {align}")]
  InvalidThreshold { max_bytes: usize, align: usize },

  #[error("refill batch of {refill_count} blocks must be non-zero and keep arena requests within usize")]
  InvalidRefillCount { refill_count: usize },
}
