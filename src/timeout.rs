//! Holds the [`Timeout`] type and the [`Clock`] it is checked against

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicU32, Ordering};

/// A point in time, or a duration, in ticks of the system tick counter
pub type Ticks = u32;

/// A free-running tick counter
///
/// Expected to count up and wrap at 2^32.
pub trait Clock {
    /// Get the current tick count
    fn now(&self) -> Ticks;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Ticks {
        (**self).now()
    }
}

/// A [`Clock`] that only moves when told to
///
/// For running timeouts on a host, in simulation or tests.
pub struct ManualClock {
    ticks: AtomicU32,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub const fn new(start: Ticks) -> ManualClock {
        ManualClock {
            ticks: AtomicU32::new(start),
        }
    }

    /// Jump to the given time
    pub fn set(&self, ticks: Ticks) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }

    /// Move time forward, wrapping at 2^32
    pub fn advance(&self, ticks: Ticks) {
        self.set(self.now().wrapping_add(ticks));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// A periodic timeout
///
/// Owned by whoever polls it; there is no registry. The period should not
/// exceed [`TIMEOUT_MAX_TICKS`](crate::TIMEOUT_MAX_TICKS).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    /// When the timeout next expires
    due: Ticks,
    /// How far `due` moves on each expiry
    period: Ticks,
}

impl Timeout {
    /// Create a timeout that expires `period` ticks from now
    pub fn new<C: Clock>(clock: &C, period: Ticks) -> Timeout {
        let mut timeout = Timeout::default();
        timeout.set(clock, period);
        timeout
    }

    /// (Re-)arm the timeout to expire `period` ticks from now
    ///
    /// Any period below 2^31 ticks works, but keeping to
    /// [`TIMEOUT_MAX_TICKS`](crate::TIMEOUT_MAX_TICKS) leaves room for the
    /// timeout to be checked late.
    pub fn set<C: Clock>(&mut self, clock: &C, period: Ticks) {
        self.period = period;
        self.due = clock.now().wrapping_add(period);
    }

    /// Change the period without losing phase
    ///
    /// The next expiry is `period` after the point the timeout was last
    /// armed or reloaded, not `period` after now.
    pub fn edit(&mut self, period: Ticks) {
        let start = self.due.wrapping_sub(self.period);
        self.period = period;
        self.due = start.wrapping_add(period);
    }

    /// Has the timeout expired?
    ///
    /// On expiry the timeout reloads by one period. If that still lands in
    /// the past (we were polled too rarely) it restarts one period from now
    /// rather than reporting every missed period.
    pub fn check<C: Clock>(&mut self, clock: &C) -> bool {
        let now = clock.now();
        if until(self.due, now) > 0 {
            return false;
        }
        self.due = self.due.wrapping_add(self.period);
        if until(self.due, now) <= 0 {
            self.due = now.wrapping_add(self.period);
        }
        true
    }

    /// Same as [`Timeout::check`]
    pub fn is_expired<C: Clock>(&mut self, clock: &C) -> bool {
        self.check(clock)
    }

    /// Ticks until the next expiry, or zero if already expired
    pub fn remaining<C: Clock>(&self, clock: &C) -> Ticks {
        let diff = until(self.due, clock.now());
        if diff > 0 { diff as Ticks } else { 0 }
    }

    /// When the timeout next expires
    pub const fn due(&self) -> Ticks {
        self.due
    }

    /// The reload period
    pub const fn period(&self) -> Ticks {
        self.period
    }
}

/// Signed ticks from `now` until `due`; survives one counter wrap
fn until(due: Ticks, now: Ticks) -> i32 {
    due.wrapping_sub(now) as i32
}


// End of File
