// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The sequential algorithm.
//!
//! [`Graph`] knows nothing about threads. The tree wraps it in the strategy's lock and every
//! method here assumes the caller holds the right kind of guard: `&self` methods need at least a
//! shared guard, `&mut self` methods an exclusive one.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::ops::{Index, IndexMut};

use wasmtime_slab::{Id, Slab};

use crate::node::{Link, Node, Side};
use crate::reclaim::ReclaimCounter;

pub(crate) struct Graph<T> {
    nodes: Slab<Node<T>>,
    pub(crate) root: Link,
    /// Number of nodes that are not tombstoned.
    pub(crate) len: usize,
    /// Number of nodes physically freed over the tree's lifetime.
    pub(crate) reclaimed: usize,
    pub(crate) counter: Option<ReclaimCounter>,
}

impl<T> Index<Id> for Graph<T> {
    type Output = Node<T>;

    #[inline]
    fn index(&self, id: Id) -> &Self::Output {
        &self.nodes[id]
    }
}

impl<T> IndexMut<Id> for Graph<T> {
    #[inline]
    fn index_mut(&mut self, id: Id) -> &mut Self::Output {
        &mut self.nodes[id]
    }
}

impl<T> Graph<T> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
            len: 0,
            reclaimed: 0,
            counter: None,
        }
    }

    /// Number of nodes physically present, live or tombstoned, attached or orphaned.
    pub(crate) fn physical_len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn contains_node(&self, id: Id) -> bool {
        self.nodes.contains(id)
    }

    /// Allocates a fresh live node.
    pub(crate) fn alloc(&mut self, value: T, parent: Link) -> Id {
        self.len += 1;
        self.nodes.alloc(Node::new(value, parent))
    }

    pub(crate) fn set_child(&mut self, parent: Id, side: Side, child: Link) {
        *self[parent].child_mut(side) = child;
        if let Some(child) = child {
            self[child].parent = Some(parent);
        }
    }

    /// Puts `child` into the anchor's slot.
    pub(crate) fn set_root(&mut self, child: Link) {
        self.root = child;
        if let Some(child) = child {
            self[child].parent = None;
        }
    }

    /// Whether `id` is reachable from the root, as opposed to orphaned by `clear`.
    pub(crate) fn is_attached(&self, id: Id) -> bool {
        self.root == Some(id) || self[id].parent.is_some()
    }

    /// Takes a stake in `link`. The anchor is never counted.
    #[inline]
    pub(crate) fn stake(&self, link: Link) {
        if let Some(id) = link {
            self[id].stake();
        }
    }

    pub(crate) fn find_minimum(&self, mut curr: Id) -> Id {
        while let Some(left) = self[curr].left {
            curr = left;
        }
        curr
    }

    pub(crate) fn find_maximum(&self, mut curr: Id) -> Id {
        while let Some(right) = self[curr].right {
            curr = right;
        }
        curr
    }

    /// In-order neighbour of `id` on `side`, ignoring tombstones.
    fn neighbour(&self, id: Id, side: Side) -> Link {
        // If we have a child on that side, its extreme descendant towards us is the neighbour
        if let Some(child) = self[id].child(side) {
            return Some(match side {
                Side::Left => self.find_maximum(child),
                Side::Right => self.find_minimum(child),
            });
        }

        let mut curr = id;
        loop {
            let parent = self[curr].parent?;
            // the first ancestor we reach from its other side is the neighbour
            if self[parent].child(side) != Some(curr) {
                return Some(parent);
            }
            curr = parent;
        }
    }

    fn neighbour_live(&self, id: Id, side: Side) -> Link {
        let mut curr = self.neighbour(id, side);
        while let Some(id) = curr {
            if !self[id].tombstone {
                return Some(id);
            }
            curr = self.neighbour(id, side);
        }
        None
    }

    /// The next live node after `id`, or `None` (end).
    pub(crate) fn next_live(&self, id: Id) -> Link {
        self.neighbour_live(id, Side::Right)
    }

    /// The previous live node before `id`, or `None` (end).
    pub(crate) fn prev_live(&self, id: Id) -> Link {
        self.neighbour_live(id, Side::Left)
    }

    pub(crate) fn first_live(&self) -> Link {
        let min = self.find_minimum(self.root?);
        if self[min].tombstone {
            self.next_live(min)
        } else {
            Some(min)
        }
    }

    pub(crate) fn last_live(&self) -> Link {
        let max = self.find_maximum(self.root?);
        if self[max].tombstone {
            self.prev_live(max)
        } else {
            Some(max)
        }
    }

    /// Calls `f` with every live value in ascending order.
    pub(crate) fn for_each_live(&self, mut f: impl FnMut(&T)) {
        let mut stack = Vec::new();
        let mut curr = self.root;

        loop {
            while let Some(id) = curr {
                stack.push(id);
                curr = self[id].left;
            }
            let Some(id) = stack.pop() else {
                return;
            };
            if !self[id].tombstone {
                f(&self[id].value);
            }
            curr = self[id].right;
        }
    }

    /// Frees `id` from the arena and records it as reclaimed.
    ///
    /// The node must already be unreachable: its parent no longer points to it.
    fn free(&mut self, id: Id) -> T {
        let node = self.nodes.dealloc(id);
        self.reclaimed += 1;
        if let Some(counter) = &self.counter {
            counter.store(self.reclaimed);
        }
        log::trace!("reclaimed node {id:?}, {} reclaimed in total", self.reclaimed);
        node.value
    }

    /// Splices `target` out of the subtree rooted at `at`, returning the new root of that subtree.
    ///
    /// The right subtree's minimum is promoted into the vacated slot and every level on the
    /// way back up is rebalanced.
    fn splice_out(&mut self, at: Link, target: Id) -> Link
    where
        T: Ord,
    {
        let id = at?;

        if id == target {
            let left = self[id].left;
            let right = self[id].right;
            drop(self.free(id));

            let Some(right) = right else {
                return left;
            };

            let min = self.find_minimum(right);
            let rest = self.remove_minimum(right);
            self.set_child(min, Side::Right, rest);
            self.set_child(min, Side::Left, left);
            return Some(self.balance(min));
        }

        match self[target].value.cmp(&self[id].value) {
            Ordering::Less => {
                let left = self.splice_out(self[id].left, target);
                self.set_child(id, Side::Left, left);
            }
            Ordering::Greater => {
                let right = self.splice_out(self[id].right, target);
                self.set_child(id, Side::Right, right);
            }
            Ordering::Equal => unreachable!("two nodes in the tree hold equal values"),
        }

        Some(self.balance(id))
    }

    /// Detaches the minimum of the subtree rooted at `id`, returning the new subtree root.
    fn remove_minimum(&mut self, id: Id) -> Link {
        let Some(left) = self[id].left else {
            return self[id].right;
        };

        let rest = self.remove_minimum(left);
        self.set_child(id, Side::Left, rest);
        Some(self.balance(id))
    }

    /// Physically removes `id` if it is tombstoned and unstaked. Safe to call for any id: a node
    /// that is gone already, or no longer due, is left alone.
    ///
    /// Returns whether a node was freed.
    pub(crate) fn reclaim_if_due(&mut self, id: Id) -> bool
    where
        T: Ord,
    {
        match self.nodes.get(id) {
            Some(node) if node.is_due() => {}
            _ => return false,
        }

        if self.is_attached(id) {
            let root = self.splice_out(self.root, id);
            self.set_root(root);
        } else {
            log::trace!("reclaiming orphaned node {id:?}");
            drop(self.free(id));
        }

        true
    }

    pub(crate) fn find(&self, value: &T) -> Link
    where
        T: Ord,
    {
        let mut curr = self.root;
        while let Some(id) = curr {
            match value.cmp(&self[id].value) {
                Ordering::Less => curr = self[id].left,
                Ordering::Greater => curr = self[id].right,
                Ordering::Equal => return Some(id),
            }
        }
        None
    }

    pub(crate) fn find_live(&self, value: &T) -> Link
    where
        T: Ord,
    {
        self.find(value).filter(|id| !self[*id].tombstone)
    }

    /// Inserts `value`, or revives its tombstoned node. Returns whether the set changed.
    pub(crate) fn insert(&mut self, value: T) -> bool
    where
        T: Ord,
    {
        let before = self.len;
        let root = self.insert_into(self.root, None, value);
        self.set_root(Some(root));
        self.len != before
    }

    fn insert_into(&mut self, at: Link, parent: Link, value: T) -> Id
    where
        T: Ord,
    {
        let Some(id) = at else {
            return self.alloc(value, parent);
        };

        match value.cmp(&self[id].value) {
            Ordering::Less => {
                let left = self.insert_into(self[id].left, Some(id), value);
                self.set_child(id, Side::Left, Some(left));
            }
            Ordering::Greater => {
                let right = self.insert_into(self[id].right, Some(id), value);
                self.set_child(id, Side::Right, Some(right));
            }
            Ordering::Equal => {
                // the node already sits where this value belongs, so no restructuring is needed
                if self[id].tombstone {
                    self[id].tombstone = false;
                    self.len += 1;
                }
                return id;
            }
        }

        self.balance(id)
    }

    /// Marks `id` as logically absent and reclaims it right away if nobody holds a stake.
    /// Returns whether the set changed.
    pub(crate) fn tombstone(&mut self, id: Id) -> bool
    where
        T: Ord,
    {
        if self[id].tombstone {
            return false;
        }

        self[id].tombstone = true;
        self.len -= 1;
        self.reclaim_if_due(id);
        true
    }

    /// Detaches every node from the anchor. Unstaked nodes are freed now; staked ones become
    /// tombstoned orphans that are freed when their last stake is released.
    pub(crate) fn clear(&mut self) {
        let mut stack: Vec<Id> = self.root.into_iter().collect();
        self.root = None;
        self.len = 0;

        let mut orphaned = 0_usize;
        while let Some(id) = stack.pop() {
            let node = &mut self[id];
            stack.extend(node.left.take());
            stack.extend(node.right.take());
            node.parent = None;
            node.tombstone = true;

            if node.stakes() == 0 {
                drop(self.free(id));
            } else {
                log::trace!("orphaned staked node {id:?}");
                orphaned += 1;
            }
        }

        log::debug!(
            "cleared tree, {orphaned} nodes orphaned, {} nodes remain",
            self.nodes.len()
        );
    }

    /// Asserts as many of the graph's invariants as possible.
    ///
    /// # Panics
    ///
    /// Panics if any link, ordering, height, balance, tombstone or size invariant is violated.
    #[track_caller]
    pub(crate) fn assert_valid(&self)
    where
        T: Ord,
    {
        let mut live = 0;
        if let Some(root) = self.root {
            assert_eq!(self[root].parent, None, "root must hang off the anchor");
            self.assert_valid_inner(root, &mut live);
        }
        assert_eq!(
            live, self.len,
            "live count mismatch: counted {live} live nodes, tree reports {}",
            self.len
        );
    }

    #[track_caller]
    fn assert_valid_inner(&self, id: Id, live: &mut usize) -> u8
    where
        T: Ord,
    {
        let node = &self[id];

        assert!(
            !node.is_due(),
            "node {id:?} is tombstoned without stakes but was not reclaimed"
        );
        if !node.tombstone {
            *live += 1;
        }

        let mut child_height = |side: Side| -> u8 {
            let Some(child) = node.child(side) else {
                return 0;
            };
            assert_eq!(
                self[child].parent,
                Some(id),
                "{side} child of {id:?} does not point back to it"
            );
            let expected = match side {
                Side::Left => Ordering::Less,
                Side::Right => Ordering::Greater,
            };
            assert_eq!(
                self[child].value.cmp(&node.value),
                expected,
                "ordering violation: {side} child of {id:?} is on the wrong side"
            );
            self.assert_valid_inner(child, live)
        };

        let lh = child_height(Side::Left);
        let rh = child_height(Side::Right);

        // children only bound their own subtree, so check against the extremes as well
        if let Some(left) = node.left {
            assert!(self[self.find_maximum(left)].value < node.value);
        }
        if let Some(right) = node.right {
            assert!(self[self.find_minimum(right)].value > node.value);
        }

        assert_eq!(
            node.height,
            lh.max(rh) + 1,
            "stored height of {id:?} does not match its children"
        );
        let factor = i16::from(rh) - i16::from(lh);
        assert!(
            (-1..=1).contains(&factor),
            "AVL violation: balance factor of {id:?} is {factor}"
        );

        node.height
    }
}

impl<T> Drop for Graph<T> {
    fn drop(&mut self) {
        // the anchor counts as one more freed node
        let total = self.reclaimed + self.physical_len() + 1;
        log::debug!(
            "dropping tree: {} nodes reclaimed earlier, {} freed now",
            self.reclaimed,
            self.physical_len()
        );
        if let Some(counter) = &self.counter {
            counter.store(total);
        }
    }
}
