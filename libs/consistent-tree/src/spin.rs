// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A spinning reader-writer lock, for trees that should never put a thread to sleep.
//!
//! The layout follows folly's `RWSpinLock`: bit 0 marks a writer, bit 1 an upgradable reader, and
//! the remaining bits count plain readers. A held upgradable lock keeps new readers out so that its
//! upgrade cannot be starved.

use core::fmt;
use core::hint;
use core::sync::atomic::{AtomicUsize, Ordering};

const WRITER: usize = 1;
const UPGRADABLE: usize = 1 << 1;
const READER: usize = 1 << 2;

/// An exponential backoff for spin loops.
///
/// Each call to [`Backoff::spin`] issues `2^exp` spin loop hints and bumps the exponent until it
/// reaches the maximum. Once saturated, hosted builds also yield the thread so that a preempted
/// lock holder gets to run.
#[derive(Debug, Copy, Clone)]
pub struct Backoff {
    exp: u8,
    max: u8,
}

impl Backoff {
    /// The default maximum exponent (2^8 spins).
    pub const DEFAULT_MAX_EXPONENT: u8 = 8;

    /// Returns a new backoff with the maximum exponent set to [`Self::DEFAULT_MAX_EXPONENT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            exp: 0,
            max: Self::DEFAULT_MAX_EXPONENT,
        }
    }

    /// Backs off in a spin loop.
    ///
    /// Issues `2^exp` [spin loop hints](hint::spin_loop) and increments the exponent, up to the
    /// maximum. Should be called whenever a lock attempt failed because another thread holds it.
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..1_u32 << self.exp {
            hint::spin_loop();
        }

        if self.exp < self.max {
            self.exp += 1;
        } else {
            #[cfg(feature = "std")]
            std::thread::yield_now();
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw lock behind the [`Spinning`](crate::Spinning) strategy.
pub struct RawSpinRwLock {
    state: AtomicUsize,
}

impl fmt::Debug for RawSpinRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load(Ordering::Relaxed);
        f.debug_struct("RawSpinRwLock")
            .field("writer", &(state & WRITER != 0))
            .field("upgradable", &(state & UPGRADABLE != 0))
            .field("readers", &(state / READER))
            .finish()
    }
}

impl RawSpinRwLock {
    /// Applies `update` to the state word as long as `pred` holds for it, giving up once it does not.
    #[inline]
    fn transition(&self, pred: impl Fn(usize) -> bool, update: impl Fn(usize) -> usize) -> bool {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            if !pred(state) {
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                update(state),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    #[inline]
    fn spin_until(&self, mut attempt: impl FnMut() -> bool) {
        let mut boff = Backoff::new();
        while !attempt() {
            boff.spin();
        }
    }
}

// Safety: the state word hands out at most one writer, or any number of readers plus at most one
// upgradable reader, and all acquisitions use `Acquire` while releases use `Release`.
unsafe impl lock_api::RawRwLock for RawSpinRwLock {
    const INIT: Self = Self {
        state: AtomicUsize::new(0),
    };
    type GuardMarker = lock_api::GuardSend;

    fn lock_shared(&self) {
        self.spin_until(|| self.try_lock_shared());
    }

    fn try_lock_shared(&self) -> bool {
        self.transition(
            |state| state & (WRITER | UPGRADABLE) == 0 && state <= usize::MAX - READER,
            |state| state + READER,
        )
    }

    unsafe fn unlock_shared(&self) {
        let prev = self.state.fetch_sub(READER, Ordering::Release);
        debug_assert!(prev >= READER, "unlocked a shared lock that was not held");
    }

    fn lock_exclusive(&self) {
        self.spin_until(|| self.try_lock_exclusive());
    }

    fn try_lock_exclusive(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock_exclusive(&self) {
        let prev = self.state.fetch_and(!WRITER, Ordering::Release);
        debug_assert_eq!(prev & WRITER, WRITER, "unlocked a write lock that was not held");
    }

    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }

    fn is_locked_exclusive(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER != 0
    }
}

// Safety: an upgradable reader excludes writers and other upgradable readers, and only becomes a
// writer once every plain reader has left.
unsafe impl lock_api::RawRwLockUpgrade for RawSpinRwLock {
    fn lock_upgradable(&self) {
        self.spin_until(|| self.try_lock_upgradable());
    }

    fn try_lock_upgradable(&self) -> bool {
        self.transition(
            |state| state & (WRITER | UPGRADABLE) == 0,
            |state| state | UPGRADABLE,
        )
    }

    unsafe fn unlock_upgradable(&self) {
        let prev = self.state.fetch_and(!UPGRADABLE, Ordering::Release);
        debug_assert_eq!(prev & UPGRADABLE, UPGRADABLE);
    }

    unsafe fn upgrade(&self) {
        // Safety: caller holds the upgradable lock
        self.spin_until(|| unsafe { self.try_upgrade() });
    }

    unsafe fn try_upgrade(&self) -> bool {
        self.state
            .compare_exchange(UPGRADABLE, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}
