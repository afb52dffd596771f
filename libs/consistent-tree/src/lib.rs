// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # A concurrent ordered set with stable cursors.
//!
//! [`ConsistentTree`] is an AVL tree holding a set of unique, ordered values that can be shared
//! between threads. Its defining feature are its [`Cursor`]s: a cursor stays valid no matter what
//! happens to the tree in the meantime. Erasing the element a cursor points at only *tombstones* it,
//! the element disappears from the set but its node stays linked so every cursor on it can still
//! read it and move on from it. The node is physically freed once the last cursor lets go of it.
//!
//! ```
//! use consistent_tree::ConsistentTree;
//!
//! let tree: ConsistentTree<u32> = (1..=5).collect();
//! let mut cursor = tree.find(&3);
//!
//! tree.erase(&3);
//! tree.erase(&4);
//! assert_eq!(tree.to_vec(), [1, 2, 5]);
//!
//! // the cursor still sits on the erased element and skips erased neighbours
//! assert_eq!(cursor.get(), Some(3));
//! cursor.move_next();
//! assert_eq!(cursor.get(), Some(5));
//! ```
//!
//! ## when to use this
//!
//! - **iterate while others mutate** - cursors are never invalidated, so long-running traversals
//!   can run alongside writers without copying the set first.
//! - **want ordered lookups** - the tree is height balanced, lookups and updates are `O(log n)`.
//! - **need to pick your synchronization** - the locking strategy is a type parameter, see below.
//!
//! ## when not to use this
//!
//! - **need snapshots** - a traversal observes mutations made while it is running, it is not a
//!   consistent point-in-time view.
//! - **never share the set** - a `BTreeSet` is simpler and faster.
//!
//! ## strategies
//!
//! How the tree is protected against concurrent access is chosen through its second type parameter,
//! see the [`strategy`] module. All strategies behave the same from a single thread's point of view.
//!
//! ## features
//!
//! | Feature | Default | Explanation                                                                             |
//! |:--------|:--------|:----------------------------------------------------------------------------------------|
//! | `std`   | `true`  | Enables the `parking_lot` backed strategies; without it the crate is `no_std` + `alloc` |
//! | `dot`   | `false` | Enables the `ConsistentTree::dot` method, which renders the tree in [graphviz format]   |
//!
//! [graphviz format]: https://graphviz.org/doc/info/lang.html

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

mod balance;
mod cursor;
#[cfg(feature = "dot")]
mod dot;
mod error;
mod graph;
mod node;
mod reclaim;
mod spin;
pub mod strategy;

use alloc::vec::Vec;
use core::fmt;

use lock_api::RwLockUpgradableReadGuard;
use wasmtime_slab::Id;

pub use cursor::{Cursor, Iter};
#[cfg(feature = "dot")]
pub use dot::Dot;
pub use error::ReplaceError;
pub use reclaim::ReclaimCounter;
pub use spin::{Backoff, RawSpinRwLock};
pub use strategy::{DefaultStrategy, RawUnsync, Spinning, Strategy, Unsynchronized};
#[cfg(feature = "std")]
pub use strategy::{Optimistic, WholeStructure};

use crate::graph::Graph;

/// An ordered set whose cursors survive concurrent modification.
///
/// Every operation takes `&self`; the tree is synchronized internally according to `S`. See the
/// [crate-level documentation](crate) for an overview.
pub struct ConsistentTree<T, S: Strategy = DefaultStrategy> {
    pub(crate) graph: lock_api::RwLock<S::Lock, Graph<T>>,
}

impl<T, S: Strategy> ConsistentTree<T, S> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: lock_api::RwLock::new(Graph::new()),
        }
    }

    /// Creates an empty tree that reports the number of nodes it frees into `counter`.
    ///
    /// See [`ReclaimCounter`] for what exactly is reported.
    #[must_use]
    pub fn with_reclaim_counter(counter: ReclaimCounter) -> Self {
        let mut graph = Graph::new();
        graph.counter = Some(counter);
        Self {
            graph: lock_api::RwLock::new(graph),
        }
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.graph.read().len
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of nodes physically freed so far.
    ///
    /// Erasing an element frees its node only once no cursor points at it anymore, so this can lag
    /// behind the number of erased elements.
    pub fn reclaimed(&self) -> usize {
        self.graph.read().reclaimed
    }

    /// Returns the name of the tree's synchronization strategy.
    pub fn strategy_name(&self) -> &'static str {
        S::NAME
    }
}

impl<T: Ord, S: Strategy> ConsistentTree<T, S> {
    /// Runs `apply` under an exclusive guard, but only if `probe` finds there is something to do.
    ///
    /// Strategies that upgrade their writes run `probe` under an upgradable guard, so a mutation
    /// that turns out to be a no-op never excludes readers.
    fn mutate<P, R>(
        &self,
        probe: impl FnOnce(&Graph<T>) -> Option<P>,
        apply: impl FnOnce(&mut Graph<T>, P) -> R,
    ) -> Option<R> {
        if S::UPGRADE_WRITES {
            let graph = self.graph.upgradable_read();
            let probed = probe(&graph)?;
            let mut graph = RwLockUpgradableReadGuard::upgrade(graph);
            Some(apply(&mut graph, probed))
        } else {
            let mut graph = self.graph.write();
            let probed = probe(&graph)?;
            Some(apply(&mut graph, probed))
        }
    }

    /// Drops a cursor's stake in `id` and frees the node if that was the last stake on an erased
    /// element.
    pub(crate) fn release(&self, id: Id) {
        let due = {
            let graph = self.graph.read();
            debug_assert!(graph.contains_node(id), "released a node that is gone");
            let node = &graph[id];
            node.unstake() == 0 && node.tombstone
        };

        // Another release, a revive or a clear may get to the node before we hold the exclusive
        // guard; `reclaim_if_due` re-checks.
        if due {
            self.graph.write().reclaim_if_due(id);
        }
    }

    /// Adds `value` to the set.
    ///
    /// Returns whether the value was newly inserted. Inserting a value that was erased while a
    /// cursor still pointed at it brings that very element back, and the cursor with it.
    pub fn insert(&self, value: T) -> bool {
        self.mutate(
            move |graph| graph.find_live(&value).is_none().then_some(value),
            Graph::insert,
        )
        .unwrap_or(false)
    }

    /// Removes `value` from the set. Returns whether it was present.
    ///
    /// The element's node is freed right away unless a cursor points at it.
    pub fn erase(&self, value: &T) -> bool {
        self.mutate(|graph| graph.find_live(value), Graph::tombstone)
            .unwrap_or(false)
    }

    /// Removes the element under `cursor` from the set. Returns whether it was present.
    ///
    /// The cursor keeps pointing at the erased element.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` belongs to another tree.
    pub fn erase_at(&self, cursor: &Cursor<'_, T, S>) -> bool {
        assert!(
            core::ptr::eq(self, cursor.tree),
            "cursor belongs to a different tree"
        );
        let Some(id) = cursor.current else {
            return false;
        };

        self.mutate(|graph| (!graph[id].tombstone).then_some(id), Graph::tombstone)
            .unwrap_or(false)
    }

    /// Removes every element.
    ///
    /// Nodes that cursors point at are freed once those cursors let go; such cursors only ever
    /// move to the end from then on.
    pub fn clear(&self) {
        self.mutate(|graph| graph.root, |graph, _| graph.clear());
    }

    /// Returns a cursor at `value`, or at the end if the set does not contain it.
    pub fn find(&self, value: &T) -> Cursor<'_, T, S> {
        let graph = self.graph.read();
        let found = graph.find_live(value);
        graph.stake(found);
        drop(graph);
        Cursor::staked(self, found)
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.graph.read().find_live(value).is_some()
    }

    /// Returns a cursor at the smallest element, or at the end if the set is empty.
    pub fn begin(&self) -> Cursor<'_, T, S> {
        let graph = self.graph.read();
        let first = graph.first_live();
        graph.stake(first);
        drop(graph);
        Cursor::staked(self, first)
    }

    /// Returns a cursor at the end.
    pub fn end(&self) -> Cursor<'_, T, S> {
        Cursor::staked(self, None)
    }

    /// Returns a copy of the smallest element, or `None` if the set is empty.
    pub fn first(&self) -> Option<T>
    where
        T: Clone,
    {
        let graph = self.graph.read();
        graph.first_live().map(|id| graph[id].value.clone())
    }

    /// Returns a copy of the greatest element, or `None` if the set is empty.
    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        let graph = self.graph.read();
        graph.last_live().map(|id| graph[id].value.clone())
    }

    /// Returns a copy of the smallest element.
    ///
    /// # Panics
    ///
    /// Panics if the set is empty. Use [`first`](Self::first) if it might be.
    #[track_caller]
    pub fn front(&self) -> T
    where
        T: Clone,
    {
        self.first().expect("front() called on an empty tree")
    }

    /// Returns a copy of the greatest element.
    ///
    /// # Panics
    ///
    /// Panics if the set is empty. Use [`last`](Self::last) if it might be.
    #[track_caller]
    pub fn back(&self) -> T
    where
        T: Clone,
    {
        self.last().expect("back() called on an empty tree")
    }

    /// Copies the elements into a `Vec` in ascending order.
    ///
    /// The copy is taken under one read guard, so it is a consistent view of the set.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let graph = self.graph.read();
        let mut out = Vec::with_capacity(graph.len);
        graph.for_each_live(|value| out.push(value.clone()));
        out
    }

    /// Returns an iterator over copies of the elements in ascending order.
    pub fn iter(&self) -> Iter<'_, T, S> {
        Iter::new(self.begin())
    }

    /// Asserts as many of the tree's invariants as possible.
    ///
    /// Only meaningful while no other thread is in the middle of an operation.
    ///
    /// # Panics
    ///
    /// Panics if the tree's links, ordering, heights or bookkeeping are corrupt, or if an erased
    /// node nobody points at is still linked.
    #[track_caller]
    pub fn assert_valid(&self) {
        self.graph.read().assert_valid();
    }

    /// Returns a [graphviz] rendering of the tree, including erased nodes and their stakes.
    ///
    /// [graphviz]: https://graphviz.org/doc/info/lang.html
    #[cfg(feature = "dot")]
    pub fn dot(&self) -> Dot<'_, T, S> {
        Dot { tree: self }
    }
}

impl<T, S: Strategy> Default for ConsistentTree<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone, S: Strategy> Clone for ConsistentTree<T, S> {
    /// Copies the elements into a new tree. Cursors, erased elements and the reclaim counter are
    /// not carried over.
    fn clone(&self) -> Self {
        self.to_vec().into_iter().collect()
    }
}

impl<T: fmt::Debug, S: Strategy> fmt::Debug for ConsistentTree<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.read();
        let mut set = f.debug_set();
        graph.for_each_live(|value| {
            set.entry(value);
        });
        set.finish()
    }
}

impl<T: Ord, S: Strategy> FromIterator<T> for ConsistentTree<T, S> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<T: Ord, S: Strategy> Extend<T> for ConsistentTree<T, S> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let graph = self.graph.get_mut();
        for value in iter {
            graph.insert(value);
        }
    }
}

impl<'a, T: Ord + Clone, S: Strategy> IntoIterator for &'a ConsistentTree<T, S> {
    type Item = T;
    type IntoIter = Iter<'a, T, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
