//! # rstl - Pooled Block Allocator and Red-Black Tree Containers
//!
//! This crate provides a **two-level block allocator** that serves many small,
//! short-lived allocations from size-class free lists, and a **red-black
//! tree** ordered index (with set, multiset and map adapters) whose nodes are
//! drawn from that allocator.
//!
//! ## Overview
//!
//! Small requests are rounded up to a multiple of the pool alignment and
//! served from one free list per size class. Large requests go straight to
//! the system allocator.
//!
//! ```text
//!   Two-Level Allocation:
//!
//!                        allocate(bytes)
//!                              │
//!               ┌──────────────┴──────────────┐
//!               │ bytes > max_bytes ?         │
//!               └──────┬───────────────┬──────┘
//!                  yes │               │ no
//!                      ▼               ▼
//!          ┌────────────────┐   ┌─────────────────────────────────┐
//!          │ MallocAllocator│   │ free_lists[round_up(bytes)/8-1] │
//!          │ malloc + OOM   │   │ pop head, or refill a batch     │
//!          │ handler loop   │   │ from the current arena          │
//!          └────────────────┘   └─────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rstl
//!   ├── align      - Alignment macro (align_to!)
//!   ├── block      - Intrusive free list (internal)
//!   ├── config     - PoolConfig and its defaults
//!   ├── error      - AllocError, ConfigError
//!   ├── malloc     - System path: SystemMemory, OOM handler loop
//!   ├── pool       - BlockAllocator and the shared Pool handle
//!   ├── typed      - TypedAllocator<T> over a Pool
//!   ├── tree       - RbTree, Position, Cursor, Iter
//!   ├── set        - Set, MultiSet
//!   └── map        - Map
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rstl::{Map, Pool, Set};
//! use rstl::tree::Less;
//!
//! let pool = Pool::new();
//!
//! let mut primes = Set::new_in(pool.clone(), Less);
//! for n in [7, 2, 5, 3, 2] {
//!   primes.insert(n).unwrap();
//! }
//! assert_eq!(primes.iter().copied().collect::<Vec<_>>(), vec![2, 3, 5, 7]);
//!
//! let mut ages = Map::new_in(pool.clone(), Less);
//! ages.insert("ada", 36).unwrap();
//! assert_eq!(ages.get(&"ada"), Some(&36));
//!
//! // both containers carve their nodes from the same arenas
//! assert!(primes.pool().ptr_eq(ages.pool()));
//! ```
//!
//! ## How It Works
//!
//! Free lists are intrusive: a free block stores the pointer to the next free
//! block in its own first word, so an empty block costs nothing extra.
//!
//! ```text
//!   free_lists[2] (24-byte class):
//!
//!   head ─► ┌────────┬───────┐   ┌────────┬───────┐   ┌────────┬───────┐
//!           │ next ──┼───────┼──►│ next ──┼───────┼──►│ null   │       │
//!           └────────┴───────┘   └────────┴───────┘   └────────┴───────┘
//!             24 bytes             24 bytes             24 bytes
//! ```
//!
//! An empty list is refilled with a batch of `refill_count` blocks carved from
//! the current arena. When the arena runs short, its leftover bytes are
//! donated to the matching free list and a new arena of
//! `2 * batch + round_up(heap_size / 16)` bytes is requested:
//!
//! ```text
//!   Arena:
//!   ┌─────┬─────┬─────┬─────┬───────────────────────────────────┐
//!   │ blk │ blk │ blk │ ... │        unused (arena_remaining)   │
//!   └─────┴─────┴─────┴─────┴───────────────────────────────────┘
//!                           ▲                                   ▲
//!                       watermark                          arena_end
//! ```
//!
//! If the system refuses, free blocks of an equal or larger class are taken
//! back and reused as a small arena; only then does the OOM handler loop run.
//!
//! The tree keeps its nodes in pool blocks addressed by [`tree::NodeId`], with
//! a header caching the root, minimum and maximum, and a distinct
//! [`tree::Position::End`] as the one-past-the-last position.
//!
//! ## Features
//!
//! - **Size-class pooling**: O(1) allocate/free for small blocks
//! - **Batch refill**: one arena request feeds many allocations
//! - **OOM handler**: optional callback retried until the system succeeds
//! - **Ordered containers**: unique and equal-key insertion, bounds, erase
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Pool` is an `Rc<RefCell<_>>`
//! - **Arenas are never shrunk**: memory returns to the system on drop
//! - **Unix-style libc**: system blocks come from `malloc`/`free`
//!
//! ## Safety
//!
//! Raw block allocation hands out pointers and requires `unsafe` to free;
//! the typed allocator and containers wrap it behind safe APIs.

pub mod align;
mod block;
pub mod config;
pub mod error;
pub mod malloc;
pub mod map;
pub mod pool;
pub mod set;
pub mod tree;
pub mod typed;

#[cfg(test)]
mod testing;

pub use config::PoolConfig;
pub use error::{AllocError, ConfigError};
pub use malloc::{LibcMemory, MallocAllocator, OomHandler, SYSTEM_ALIGN, SystemMemory};
pub use map::Map;
pub use pool::{BlockAllocator, Pool};
pub use set::{MultiSet, Set};
pub use tree::{Compare, Cursor, First, Greater, Identity, Iter, KeyOf, Less, Position, RbTree};
pub use typed::TypedAllocator;
