// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use wasmtime_slab::Id;

/// A non-owning reference to a node in the tree's arena. `None` stands for the anchor: as a parent
/// link it means "this is the root", as a cursor position it means "end".
pub(crate) type Link = Option<Id>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

impl Side {
    pub(crate) fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// A single cell of the tree.
///
/// Nodes are owned by the arena; `parent`, `left` and `right` are plain ids into it. A node whose
/// `tombstone` is set is logically absent from the set but stays linked until no cursor holds a
/// stake in it anymore.
pub(crate) struct Node<T> {
    pub(crate) value: T,
    pub(crate) height: u8,
    pub(crate) parent: Link,
    pub(crate) left: Link,
    pub(crate) right: Link,
    pub(crate) tombstone: bool,
    // Stakes are taken under shared guards, so this must be atomic. Dropping to zero is only ever
    // acted upon under the exclusive guard.
    stakes: AtomicU32,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T, parent: Link) -> Self {
        Self {
            value,
            height: 1,
            parent,
            left: None,
            right: None,
            tombstone: false,
            stakes: AtomicU32::new(0),
        }
    }

    #[inline]
    pub(crate) fn child(&self, side: Side) -> Link {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[inline]
    pub(crate) fn child_mut(&mut self, side: Side) -> &mut Link {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    #[inline]
    pub(crate) fn stakes(&self) -> u32 {
        self.stakes.load(Ordering::Acquire)
    }

    /// Adds a stake, returning the new count.
    ///
    /// # Panics
    ///
    /// Panics if the count would overflow.
    #[inline]
    pub(crate) fn stake(&self) -> u32 {
        let prev = self.stakes.fetch_add(1, Ordering::AcqRel);
        assert_ne!(prev, u32::MAX, "stake count overflow");
        prev + 1
    }

    /// Drops a stake, returning the remaining count.
    ///
    /// # Panics
    ///
    /// Panics if the node holds no stakes.
    #[inline]
    pub(crate) fn unstake(&self) -> u32 {
        let prev = self.stakes.fetch_sub(1, Ordering::AcqRel);
        assert_ne!(prev, 0, "released a stake that was never taken");
        prev - 1
    }

    /// Whether the node satisfies the reclamation precondition: logically absent and unobserved.
    #[inline]
    pub(crate) fn is_due(&self) -> bool {
        self.tombstone && self.stakes() == 0
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("value", &self.value)
            .field("height", &self.height)
            .field("parent", &self.parent)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("tombstone", &self.tombstone)
            .field("stakes", &self.stakes())
            .finish()
    }
}
