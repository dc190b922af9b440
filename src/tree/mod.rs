//! Red-black tree ordered index.
//!
//! Nodes live in pool blocks and are addressed by [`NodeId`]; parent, left and
//! right links are ids, never owning pointers. The header caches the root and
//! the minimum/maximum nodes, and the one-past-the-last position is the
//! distinct [`Position::End`].
//!
//! ```text
//!   Header { root, leftmost, rightmost }
//!              │       │          │
//!              ▼       │          │
//!            ┌───┐     │          │
//!            │ 5B│     │          │
//!            └───┘     │          │
//!           ╱     ╲    │          │
//!       ┌───┐     ┌───┐           │
//!       │ 3R│     │ 8R│◄──────────┤ (subtree max)
//!       └───┘     └───┘           │
//!      ╱    ╲    ╱    ╲           │
//!   ┌──┐  ┌──┐ ┌──┐  ┌──┐         │
//!   │1B│  │4B│ │7B│  │9B│◄────────┘
//!   └──┘  └──┘ └──┘  └──┘
//!    ▲
//!    └── leftmost = begin()            end() = Position::End
//! ```
//!
//! Keys are compared with a strict "less than" only; uniqueness is proven
//! through the in-order predecessor, never through an equality test.

mod iter;
mod node;
mod rbtree;
mod slab;

pub use iter::{Cursor, Iter, Position};
pub use node::{Color, NodeId};
pub use rbtree::RbTree;

/// Extracts the ordering key from a stored value.
pub trait KeyOf<V> {
  type Key: ?Sized;

  fn key(value: &V) -> &Self::Key;
}

/// The value is its own key (sets).
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<T> KeyOf<T> for Identity {
  type Key = T;

  fn key(value: &T) -> &T {
    value
  }
}

/// The key is the first half of a pair (maps).
#[derive(Clone, Copy, Debug, Default)]
pub struct First;

impl<K, V> KeyOf<(K, V)> for First {
  type Key = K;

  fn key(value: &(K, V)) -> &K {
    &value.0
  }
}

/// Strict weak ordering on keys.
///
/// Violating strict weak ordering leaves the tree in an unspecified (though
/// memory-safe) shape.
pub trait Compare<K: ?Sized> {
  fn less(
    &self,
    a: &K,
    b: &K,
  ) -> bool;
}

/// Ascending order through [`Ord`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Less;

impl<K: Ord + ?Sized> Compare<K> for Less {
  fn less(
    &self,
    a: &K,
    b: &K,
  ) -> bool {
    a < b
  }
}

/// Descending order through [`Ord`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Greater;

impl<K: Ord + ?Sized> Compare<K> for Greater {
  fn less(
    &self,
    a: &K,
    b: &K,
  ) -> bool {
    a > b
  }
}

impl<K: ?Sized, F> Compare<K> for F
where
  F: Fn(&K, &K) -> bool,
{
  fn less(
    &self,
    a: &K,
    b: &K,
  ) -> bool {
    self(a, b)
  }
}
