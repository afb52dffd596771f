// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A shared cell the tree reports its cumulative number of freed nodes into.
///
/// Clones refer to the same cell. The tree stores the running total after every node it frees and,
/// when it is dropped, the final total: every node ever freed, the ones freed by the drop itself,
/// plus one for the tree's anchor. The tree never reads the cell back.
///
/// ```
/// use consistent_tree::{ConsistentTree, ReclaimCounter};
///
/// let counter = ReclaimCounter::new();
/// let tree: ConsistentTree<u32> = ConsistentTree::with_reclaim_counter(counter.clone());
/// tree.insert(1);
/// tree.insert(2);
/// tree.erase(&1);
/// assert_eq!(counter.get(), 1);
///
/// drop(tree);
/// assert_eq!(counter.get(), 3);
/// ```
#[derive(Clone, Default)]
pub struct ReclaimCounter(Arc<AtomicUsize>);

impl ReclaimCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last value the tree reported.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Resets the cell to zero, e.g. before handing it to another tree.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub(crate) fn store(&self, total: usize) {
        self.0.store(total, Ordering::Release);
    }
}

impl fmt::Debug for ReclaimCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReclaimCounter").field(&self.get()).finish()
    }
}
