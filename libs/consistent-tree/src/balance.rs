// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! AVL balancing.
//!
//! Every node stores its height (leaves are 1, missing children count as 0). After any change to a
//! node's children, [`Graph::balance`] restores `|height(right) - height(left)| <= 1` with at most
//! two rotations and returns the new root of that subtree. Callers are responsible for attaching
//! the returned root to the parent slot the old root occupied.

use wasmtime_slab::Id;

use crate::graph::Graph;
use crate::node::{Link, Side};

impl<T> Graph<T> {
    #[inline]
    pub(crate) fn height(&self, link: Link) -> u8 {
        link.map_or(0, |id| self[id].height)
    }

    /// `height(right) - height(left)`.
    #[inline]
    pub(crate) fn balance_factor(&self, id: Id) -> i16 {
        i16::from(self.height(self[id].right)) - i16::from(self.height(self[id].left))
    }

    #[inline]
    pub(crate) fn fix_height(&mut self, id: Id) {
        let lh = self.height(self[id].left);
        let rh = self.height(self[id].right);
        self[id].height = lh.max(rh) + 1;
    }

    /// Rotates the subtree rooted at `top` towards `side`: the child on the opposite side is lifted
    /// into `top`'s place and `top` becomes its `side` child. Returns the lifted node.
    ///
    /// # Panics
    ///
    /// Panics if `top` has no child on the opposite side.
    pub(crate) fn rotate(&mut self, top: Id, side: Side) -> Id {
        let up = side.opposite();
        let pivot = self[top]
            .child(up)
            .expect("rotation requires a child on the lifted side");
        let parent = self[top].parent;

        let inner = self[pivot].child(side);
        self.set_child(top, up, inner);
        self.set_child(pivot, side, Some(top));
        self[pivot].parent = parent;

        self.fix_height(top);
        self.fix_height(pivot);

        pivot
    }

    #[inline]
    pub(crate) fn rotate_left(&mut self, id: Id) -> Id {
        self.rotate(id, Side::Left)
    }

    #[inline]
    pub(crate) fn rotate_right(&mut self, id: Id) -> Id {
        self.rotate(id, Side::Right)
    }

    /// Recomputes `id`'s height and rotates if its balance factor reached ±2.
    pub(crate) fn balance(&mut self, id: Id) -> Id {
        self.fix_height(id);

        match self.balance_factor(id) {
            2 => {
                if let Some(right) = self[id].right
                    && self.balance_factor(right) < 0
                {
                    let lifted = self.rotate_right(right);
                    self.set_child(id, Side::Right, Some(lifted));
                }
                self.rotate_left(id)
            }
            -2 => {
                if let Some(left) = self[id].left
                    && self.balance_factor(left) > 0
                {
                    let lifted = self.rotate_left(left);
                    self.set_child(id, Side::Left, Some(lifted));
                }
                self.rotate_right(id)
            }
            _ => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Links `values` into a degenerate right-leaning chain without balancing.
    fn chain(graph: &mut Graph<u32>, values: &[u32]) -> Vec<Id> {
        let mut ids = Vec::new();
        let mut parent: Link = None;
        for value in values {
            let id = graph.alloc(*value, parent);
            match parent {
                Some(parent) => graph.set_child(parent, Side::Right, Some(id)),
                None => graph.set_root(Some(id)),
            }
            parent = Some(id);
            ids.push(id);
        }
        for id in ids.iter().rev() {
            graph.fix_height(*id);
        }
        ids
    }

    #[test]
    fn heights() {
        let mut graph = Graph::new();
        let ids = chain(&mut graph, &[1, 2, 3]);

        assert_eq!(graph.height(None), 0);
        assert_eq!(graph.height(Some(ids[2])), 1);
        assert_eq!(graph.height(Some(ids[0])), 3);
        assert_eq!(graph.balance_factor(ids[0]), 2);
        assert_eq!(graph.balance_factor(ids[1]), 1);
        assert_eq!(graph.balance_factor(ids[2]), 0);
    }

    #[test]
    fn single_rotation() {
        let mut graph = Graph::new();
        let ids = chain(&mut graph, &[1, 2, 3]);

        let root = graph.balance(ids[0]);
        graph.set_root(Some(root));

        assert_eq!(root, ids[1]);
        assert_eq!(graph[root].left, Some(ids[0]));
        assert_eq!(graph[root].right, Some(ids[2]));
        assert_eq!(graph[ids[0]].parent, Some(root));
        assert_eq!(graph[ids[2]].parent, Some(root));
        assert_eq!(graph[root].parent, None);
        assert_eq!(graph.height(Some(root)), 2);
        graph.assert_valid();
    }

    #[test]
    fn double_rotation() {
        let mut graph = Graph::new();
        // 1 -> 3 -> (left) 2: the right child leans left, so a right pre-rotation is needed
        let one = graph.alloc(1, None);
        graph.set_root(Some(one));
        let three = graph.alloc(3, Some(one));
        graph.set_child(one, Side::Right, Some(three));
        let two = graph.alloc(2, Some(three));
        graph.set_child(three, Side::Left, Some(two));
        graph.fix_height(two);
        graph.fix_height(three);
        graph.fix_height(one);

        let root = graph.balance(one);
        graph.set_root(Some(root));

        assert_eq!(root, two);
        assert_eq!(graph[two].left, Some(one));
        assert_eq!(graph[two].right, Some(three));
        assert_eq!(graph.height(Some(one)), 1);
        assert_eq!(graph.height(Some(three)), 1);
        graph.assert_valid();
    }

    #[test]
    fn balanced_node_is_untouched() {
        let mut graph = Graph::new();
        let ids = chain(&mut graph, &[1, 2]);

        assert_eq!(graph.balance(ids[0]), ids[0]);
        assert_eq!(graph.height(Some(ids[0])), 2);
    }
}
