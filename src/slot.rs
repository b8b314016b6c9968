//! Holds the [`Slot`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
};

/// The body of a task
///
/// Takes whatever was last sent to the task (or [`NO_PARAM`]) and returns a
/// result the main context can pick up with
/// [`Dispatcher::receive`](crate::Dispatcher::receive).
pub type TaskFn = fn(usize) -> u32;

/// The parameter a task sees when nothing was sent since its last call
pub const NO_PARAM: usize = 0;

/// One entry in the task table
///
/// Only atomic loads and stores are used here, never read-modify-write, so
/// this works on Armv6-M.
pub struct Slot {
    /// The task body, or `None` if this slot is free
    ///
    /// Only written with interrupts masked. Only read with interrupts masked,
    /// or from the dispatch interrupt itself.
    handle: UnsafeCell<Option<TaskFn>>,
    /// What the task returned last time
    result: AtomicU32,
    /// What to pass the task next time
    param: AtomicUsize,
}

impl Slot {
    /// Create a new, free, slot
    pub const fn new() -> Slot {
        Slot {
            handle: UnsafeCell::new(None),
            result: AtomicU32::new(0),
            param: AtomicUsize::new(NO_PARAM),
        }
    }

    /// Get the task body
    ///
    /// Call with interrupts masked, or from the dispatch interrupt.
    pub(crate) fn handle(&self) -> Option<TaskFn> {
        // SAFETY: writers hold the interrupt mask, so on a single core they
        // cannot be part-way through a write while we run.
        unsafe { *self.handle.get() }
    }

    /// Is this slot free?
    pub(crate) fn is_free(&self) -> bool {
        self.handle().is_none()
    }

    /// Install or remove the task body
    ///
    /// # Safety
    ///
    /// Interrupts must be masked, so the dispatch interrupt cannot observe a
    /// partial write.
    pub(crate) unsafe fn set_handle(&self, handle: Option<TaskFn>) {
        unsafe {
            *self.handle.get() = handle;
        }
    }

    /// Return the slot to its power-on state
    ///
    /// # Safety
    ///
    /// As for [`Slot::set_handle`].
    pub(crate) unsafe fn clear(&self) {
        unsafe {
            self.set_handle(None);
        }
        self.result.store(0, Ordering::Relaxed);
        self.param.store(NO_PARAM, Ordering::Relaxed);
    }

    /// Get the last result
    pub(crate) fn result(&self) -> u32 {
        self.result.load(Ordering::Acquire)
    }

    /// Get the pending parameter
    pub(crate) fn param(&self) -> usize {
        self.param.load(Ordering::Acquire)
    }

    /// Replace the pending parameter
    pub(crate) fn set_param(&self, param: usize) {
        self.param.store(param, Ordering::Release)
    }

    /// Call the task body, if any, and consume the pending parameter
    ///
    /// Returns `true` if there was a task to call.
    pub(crate) fn run(&self) -> bool {
        let Some(handle) = self.handle() else {
            return false;
        };
        let result = handle(self.param());
        self.result.store(result, Ordering::Release);
        self.param.store(NO_PARAM, Ordering::Release);
        true
    }
}

/// SAFETY: `handle` is guarded by the interrupt mask (see field docs) and
/// the other fields are atomics. We only support single-core systems.
unsafe impl Sync for Slot {}

impl Default for Slot {
    fn default() -> Self {
        Slot::new()
    }
}


// End of File
