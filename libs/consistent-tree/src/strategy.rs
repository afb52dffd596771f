// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Concurrency strategies.
//!
//! A [`ConsistentTree`](crate::ConsistentTree) keeps its whole node graph behind one
//! [`lock_api::RwLock`] whose raw lock is picked by the tree's [`Strategy`]. Readers take shared
//! guards, mutators exclusive ones, and guards are released on every exit path because they are
//! ordinary RAII values. The algorithm underneath is the same for every strategy, so all of them
//! show the same observable behaviour; they only differ in who waits for whom and how.
//!
//! | Strategy           | Raw lock                    | Mutators search under   | `Sync` |
//! |:-------------------|:----------------------------|:------------------------|:-------|
//! | [`Unsynchronized`] | [`RawUnsync`]               | exclusive guard         | no     |
//! | [`WholeStructure`] | `parking_lot::RawRwLock`    | exclusive guard         | yes    |
//! | [`Optimistic`]     | `parking_lot::RawRwLock`    | upgradable read guard   | yes    |
//! | [`Spinning`]       | [`RawSpinRwLock`]           | exclusive guard         | yes    |

use core::cell::Cell;
use core::fmt;

use crate::spin::RawSpinRwLock;

/// A way of guarding the tree against concurrent access.
pub trait Strategy {
    /// Lock protecting the node graph.
    type Lock: lock_api::RawRwLock + lock_api::RawRwLockUpgrade;

    /// Human readable name, used in logs and benchmarks.
    const NAME: &'static str;

    /// Whether mutators locate their target under an upgradable read guard, which readers may
    /// share, and only upgrade to an exclusive guard when the set actually changes.
    const UPGRADE_WRITES: bool;
}

/// No synchronization: the tree is `!Sync`, so the compiler confines it to one thread.
///
/// Guards are still tracked, like `RefCell` borrows, so calling back into the tree while one of its
/// guards is held panics instead of corrupting it.
///
/// ```compile_fail
/// use consistent_tree::{ConsistentTree, Unsynchronized};
///
/// fn share<T: Sync>(_: &T) {}
/// share(&ConsistentTree::<u32, Unsynchronized>::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsynchronized;

impl Strategy for Unsynchronized {
    type Lock = RawUnsync;
    const NAME: &'static str = "unsynchronized";
    const UPGRADE_WRITES: bool = false;
}

/// One blocking reader-writer lock around the whole tree. Mutators are totally ordered, readers run
/// in parallel with each other but never with a mutator.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeStructure;

#[cfg(feature = "std")]
impl Strategy for WholeStructure {
    type Lock = parking_lot::RawRwLock;
    const NAME: &'static str = "whole-structure";
    const UPGRADE_WRITES: bool = false;
}

/// Like [`WholeStructure`], but mutators search under an upgradable guard that readers may share.
///
/// Only mutations that change the set (a new or revived value, an actual erase, a clear) wait for
/// readers to drain. Duplicate inserts and erases of absent values never block readers.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimistic;

#[cfg(feature = "std")]
impl Strategy for Optimistic {
    type Lock = parking_lot::RawRwLock;
    const NAME: &'static str = "optimistic";
    const UPGRADE_WRITES: bool = true;
}

/// A whole-structure guard that spins with exponential backoff instead of parking threads.
/// Available without `std`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spinning;

impl Strategy for Spinning {
    type Lock = RawSpinRwLock;
    const NAME: &'static str = "spinning";
    const UPGRADE_WRITES: bool = false;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// The strategy used when none is named: [`WholeStructure`].
        pub type DefaultStrategy = WholeStructure;
    } else {
        /// The strategy used when none is named: [`Spinning`], since blocking needs `std`.
        pub type DefaultStrategy = Spinning;
    }
}

const UNLOCKED: isize = 0;
const EXCLUSIVE: isize = -1;

/// Raw lock behind [`Unsynchronized`].
///
/// It never blocks: acquiring a guard that conflicts with one already held panics. `Cell` makes it
/// `!Sync`, and so every tree using it.
pub struct RawUnsync {
    // number of shared guards, or `EXCLUSIVE`
    state: Cell<isize>,
    upgradable: Cell<bool>,
}

impl fmt::Debug for RawUnsync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawUnsync")
            .field("state", &self.state.get())
            .field("upgradable", &self.upgradable.get())
            .finish()
    }
}

#[cold]
#[track_caller]
fn conflicting_guard() -> ! {
    panic!("unsynchronized tree accessed while a conflicting guard is held")
}

// Safety: the state cell hands out either one exclusive guard or any number of shared guards (plus
// at most one upgradable guard), and the type is `!Sync`, so it is never raced on.
unsafe impl lock_api::RawRwLock for RawUnsync {
    #[allow(
        clippy::declare_interior_mutable_const,
        reason = "lock_api initializes raw locks from this constant"
    )]
    const INIT: Self = Self {
        state: Cell::new(UNLOCKED),
        upgradable: Cell::new(false),
    };
    type GuardMarker = lock_api::GuardNoSend;

    #[track_caller]
    fn lock_shared(&self) {
        if !self.try_lock_shared() {
            conflicting_guard();
        }
    }

    fn try_lock_shared(&self) -> bool {
        let state = self.state.get();
        if state == EXCLUSIVE {
            return false;
        }
        self.state.set(state + 1);
        true
    }

    unsafe fn unlock_shared(&self) {
        debug_assert!(self.state.get() > 0);
        self.state.set(self.state.get() - 1);
    }

    #[track_caller]
    fn lock_exclusive(&self) {
        if !self.try_lock_exclusive() {
            conflicting_guard();
        }
    }

    fn try_lock_exclusive(&self) -> bool {
        if self.state.get() != UNLOCKED || self.upgradable.get() {
            return false;
        }
        self.state.set(EXCLUSIVE);
        true
    }

    unsafe fn unlock_exclusive(&self) {
        debug_assert_eq!(self.state.get(), EXCLUSIVE);
        self.state.set(UNLOCKED);
    }

    fn is_locked(&self) -> bool {
        self.state.get() != UNLOCKED || self.upgradable.get()
    }
}

// Safety: see above; the upgradable guard is tracked separately and only upgrades once no shared
// guard is left.
unsafe impl lock_api::RawRwLockUpgrade for RawUnsync {
    #[track_caller]
    fn lock_upgradable(&self) {
        if !self.try_lock_upgradable() {
            conflicting_guard();
        }
    }

    fn try_lock_upgradable(&self) -> bool {
        if self.state.get() == EXCLUSIVE || self.upgradable.get() {
            return false;
        }
        self.upgradable.set(true);
        true
    }

    unsafe fn unlock_upgradable(&self) {
        debug_assert!(self.upgradable.get());
        self.upgradable.set(false);
    }

    #[track_caller]
    unsafe fn upgrade(&self) {
        // Safety: caller holds the upgradable guard
        if !unsafe { self.try_upgrade() } {
            conflicting_guard();
        }
    }

    unsafe fn try_upgrade(&self) -> bool {
        if self.state.get() != UNLOCKED {
            return false;
        }
        self.upgradable.set(false);
        self.state.set(EXCLUSIVE);
        true
    }
}
