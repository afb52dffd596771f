// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cmp::Ordering;
use core::iter::FusedIterator;
use core::{fmt, mem, ptr};

use crate::error::ReplaceError;
use crate::node::Link;
use crate::strategy::{DefaultStrategy, Strategy};
use crate::ConsistentTree;

/// A cursor into a [`ConsistentTree`] that keeps its element alive.
///
/// While a cursor points at an element it holds a *stake* in that element's node: erasing the
/// element only removes it from the set, the node stays in place so the cursor can keep reading it
/// and keep moving from it. The node is physically freed once it is erased and the last cursor on
/// it is dropped or moved away.
///
/// A cursor that points at no element is *at the end*. It is the position past the greatest and
/// before the smallest element.
pub struct Cursor<'a, T: Ord, S: Strategy = DefaultStrategy> {
    pub(crate) tree: &'a ConsistentTree<T, S>,
    pub(crate) current: Link,
}

impl<'a, T: Ord, S: Strategy> Cursor<'a, T, S> {
    /// Wraps a position whose stake the caller has already taken.
    pub(crate) fn staked(tree: &'a ConsistentTree<T, S>, current: Link) -> Self {
        Self { tree, current }
    }

    /// Returns `true` if the cursor is at the end.
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Returns `true` if the element under the cursor has been erased since the cursor reached it.
    pub fn is_erased(&self) -> bool {
        self.current.is_some_and(|id| self.tree.graph.read()[id].tombstone)
    }

    /// Returns a copy of the element under the cursor, or `None` at the end.
    ///
    /// An erased element can still be read through the cursors that hold it.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Calls `f` with a reference to the element under the cursor.
    ///
    /// `f` runs while the tree is locked for reading, so it must not call back into the tree.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let id = self.current?;
        let graph = self.tree.graph.read();
        Some(f(&graph[id].value))
    }

    /// Returns a copy of the element the cursor would reach with [`move_next`](Self::move_next).
    pub fn peek_next(&self) -> Option<T>
    where
        T: Clone,
    {
        let graph = self.tree.graph.read();
        let next = graph.next_live(self.current?)?;
        Some(graph[next].value.clone())
    }

    /// Returns a copy of the element the cursor would reach with [`move_prev`](Self::move_prev).
    pub fn peek_prev(&self) -> Option<T>
    where
        T: Clone,
    {
        let graph = self.tree.graph.read();
        let prev = match self.current {
            Some(id) => graph.prev_live(id),
            None => graph.last_live(),
        }?;
        Some(graph[prev].value.clone())
    }

    /// Moves to the next element in ascending order, skipping erased ones.
    ///
    /// Moving past the greatest element reaches the end. At the end this does nothing.
    pub fn move_next(&mut self) {
        let Some(current) = self.current else {
            return;
        };

        let next = {
            let graph = self.tree.graph.read();
            let next = graph.next_live(current);
            graph.stake(next);
            next
        };

        self.current = next;
        self.tree.release(current);
    }

    /// Moves to the previous element in ascending order, skipping erased ones.
    ///
    /// Moving before the smallest element reaches the end; from the end this moves to the
    /// greatest element.
    pub fn move_prev(&mut self) {
        let prev = {
            let graph = self.tree.graph.read();
            let prev = match self.current {
                Some(id) => graph.prev_live(id),
                None => graph.last_live(),
            };
            graph.stake(prev);
            prev
        };

        if let Some(old) = mem::replace(&mut self.current, prev) {
            self.tree.release(old);
        }
    }

    /// Overwrites the element under the cursor with `value`, returning the old element.
    ///
    /// The tree's order is derived from its elements, so the replacement must compare equal to the
    /// element it replaces. This is useful for elements that carry data besides their key.
    ///
    /// # Errors
    ///
    /// Returns [`ReplaceError::End`] if the cursor is at the end, [`ReplaceError::Erased`] if the
    /// element has been erased, and [`ReplaceError::Reordered`] if `value` does not compare equal
    /// to the current element. The latter two hand `value` back.
    pub fn replace(&self, value: T) -> Result<T, ReplaceError<T>> {
        let Some(id) = self.current else {
            return Err(ReplaceError::End);
        };

        let mut graph = self.tree.graph.write();
        let node = &mut graph[id];
        if node.tombstone {
            return Err(ReplaceError::Erased(value));
        }
        if value.cmp(&node.value) != Ordering::Equal {
            return Err(ReplaceError::Reordered(value));
        }

        Ok(mem::replace(&mut node.value, value))
    }
}

impl<T: Ord, S: Strategy> Clone for Cursor<'_, T, S> {
    fn clone(&self) -> Self {
        self.tree.graph.read().stake(self.current);
        Self::staked(self.tree, self.current)
    }
}

impl<T: Ord, S: Strategy> Drop for Cursor<'_, T, S> {
    fn drop(&mut self) {
        if let Some(id) = self.current.take() {
            self.tree.release(id);
        }
    }
}

impl<T: Ord, S: Strategy> PartialEq for Cursor<'_, T, S> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.tree, other.tree) && self.current == other.current
    }
}

impl<T: Ord, S: Strategy> Eq for Cursor<'_, T, S> {}

impl<T: Ord + fmt::Debug, S: Strategy> fmt::Debug for Cursor<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(id) = self.current else {
            return f.write_str("Cursor(end)");
        };

        let graph = self.tree.graph.read();
        let node = &graph[id];
        f.debug_struct("Cursor")
            .field("value", &node.value)
            .field("erased", &node.tombstone)
            .finish()
    }
}

/// An iterator over the elements of a [`ConsistentTree`] in ascending order.
///
/// Created by [`ConsistentTree::iter`]. It yields copies of the elements and, since it is built on
/// a [`Cursor`], keeps working while other threads insert and erase. Elements erased before the
/// iterator reaches them are skipped.
pub struct Iter<'a, T: Ord, S: Strategy = DefaultStrategy> {
    cursor: Cursor<'a, T, S>,
}

impl<'a, T: Ord, S: Strategy> Iter<'a, T, S> {
    pub(crate) fn new(cursor: Cursor<'a, T, S>) -> Self {
        Self { cursor }
    }
}

impl<T: Ord + Clone, S: Strategy> Iterator for Iter<'_, T, S> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_erased() {
            self.cursor.move_next();
        }
        let value = self.cursor.get()?;
        self.cursor.move_next();
        Some(value)
    }
}

impl<T: Ord + Clone, S: Strategy> FusedIterator for Iter<'_, T, S> {}

impl<T: Ord + fmt::Debug, S: Strategy> fmt::Debug for Iter<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iter").field(&self.cursor).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;
    use crate::Unsynchronized;

    type Tree = ConsistentTree<u32, Unsynchronized>;

    #[test]
    fn move_next_to_end_and_stay() {
        let tree: Tree = [1, 2].into_iter().collect();
        let mut cursor = tree.begin();
        assert_eq!(cursor.get(), Some(1));
        cursor.move_next();
        assert_eq!(cursor.get(), Some(2));
        cursor.move_next();
        assert!(cursor.is_end());
        cursor.move_next();
        assert!(cursor.is_end());
    }

    #[test]
    fn move_prev_from_end_reaches_greatest() {
        let tree: Tree = [3, 1, 2].into_iter().collect();
        let mut cursor = tree.end();
        assert_eq!(cursor.peek_prev(), Some(3));
        cursor.move_prev();
        assert_eq!(cursor.get(), Some(3));
        cursor.move_prev();
        cursor.move_prev();
        assert_eq!(cursor.get(), Some(1));
        cursor.move_prev();
        assert_eq!(cursor, tree.end());
    }

    #[test]
    fn clone_holds_its_own_stake() {
        let tree: Tree = [1, 2, 3].into_iter().collect();
        let a = tree.find(&2);
        let b = a.clone();
        assert_eq!(a, b);

        assert!(tree.erase(&2));
        drop(a);
        assert_eq!(tree.reclaimed(), 0);
        assert!(b.is_erased());
        assert_eq!(b.get(), Some(2));

        drop(b);
        assert_eq!(tree.reclaimed(), 1);
        tree.assert_valid();
    }

    #[test]
    fn moving_off_an_erased_element_reclaims_it() {
        let tree: Tree = [1, 2, 3].into_iter().collect();
        let mut cursor = tree.find(&2);
        tree.erase(&2);
        assert_eq!(cursor.peek_next(), Some(3));

        cursor.move_next();
        assert_eq!(cursor.get(), Some(3));
        assert_eq!(tree.reclaimed(), 1);
        assert_eq!(tree.to_vec(), [1, 3]);
    }

    #[test]
    fn replace_keeps_position() {
        #[derive(Debug, Clone)]
        struct Entry(u32, &'static str);
        impl PartialEq for Entry {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }
        impl Eq for Entry {}
        impl PartialOrd for Entry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Entry {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.cmp(&other.0)
            }
        }

        let tree: ConsistentTree<Entry, Unsynchronized> =
            [Entry(1, "a"), Entry(2, "b")].into_iter().collect();
        let cursor = tree.find(&Entry(2, ""));

        let old = cursor.replace(Entry(2, "c")).unwrap();
        assert_eq!(old.1, "b");
        assert_eq!(cursor.with(|e| e.1), Some("c"));

        let err = cursor.replace(Entry(7, "d")).unwrap_err();
        assert!(matches!(err, ReplaceError::Reordered(Entry(7, "d"))));

        tree.erase(&Entry(2, ""));
        assert!(matches!(
            cursor.replace(Entry(2, "e")),
            Err(ReplaceError::Erased(_))
        ));
        assert_eq!(tree.end().replace(Entry(1, "")).unwrap_err().into_value(), None);
    }

    #[test]
    fn iter_skips_elements_erased_ahead_of_it() {
        let tree: Tree = (0..6).collect();
        let mut iter = tree.iter();
        assert_eq!(iter.next(), Some(0));
        tree.erase(&1);
        tree.erase(&3);
        assert_eq!(iter.collect::<Vec<_>>(), [2, 4, 5]);
    }

    #[test]
    fn iter_skips_the_element_it_stands_on_once_erased() {
        let tree: Tree = (0..3).collect();
        let mut iter = tree.iter();
        assert_eq!(iter.next(), Some(0));
        // the iterator now holds a stake in 1
        tree.erase(&1);
        assert_eq!(iter.next(), Some(2));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
        assert_eq!(tree.reclaimed(), 1);
    }
}
