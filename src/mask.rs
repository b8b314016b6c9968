//! Holds the [`IrqMask`] trait and the [`MaskGuard`] critical section

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Global interrupt masking, as provided by the platform
///
/// This is the only mutual exclusion the dispatcher has. On a single core,
/// code that runs with interrupts disabled cannot be pre-empted by the
/// dispatch interrupt.
///
/// # Safety
///
/// From [`IrqMask::disable`] until the matching [`IrqMask::enable`], nothing
/// else may call into a [`Dispatcher`](crate::Dispatcher) using this mask:
/// not the dispatch interrupt, not another thread, not another core.
pub unsafe trait IrqMask: Sync {
    /// Are interrupts currently enabled?
    fn is_enabled(&self) -> bool;

    /// Disable interrupts
    fn disable(&self);

    /// Enable interrupts
    ///
    /// Only ever called by a [`MaskGuard`] that found interrupts enabled when
    /// it was created.
    fn enable(&self);
}

/// An interrupt-masked critical section
///
/// Records whether interrupts were enabled, disables them, and on drop
/// re-enables them only if they were enabled to begin with. This makes it
/// safe to open one inside a section that some outer caller has already
/// masked.
pub struct MaskGuard<'a> {
    mask: &'a dyn IrqMask,
    was_enabled: bool,
}

impl<'a> MaskGuard<'a> {
    /// Save the interrupt state and disable interrupts
    pub fn new(mask: &'a dyn IrqMask) -> MaskGuard<'a> {
        let was_enabled = mask.is_enabled();
        mask.disable();
        MaskGuard { mask, was_enabled }
    }
}

impl Drop for MaskGuard<'_> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.mask.enable();
        }
    }
}

/// A software interrupt flag
///
/// Stands in for the hardware when running the dispatcher on a host, e.g.
/// in simulation or tests. Counts how many times it was asked to disable.
/// It excludes nothing, so it is only sound when everything that touches the
/// dispatcher runs in one execution context.
///
/// Creating one is therefore `unsafe`:
///
/// ```compile_fail
/// let mask = punctual::SoftMask::new();
/// ```
pub struct SoftMask {
    enabled: AtomicBool,
    disables: AtomicU32,
}

impl SoftMask {
    /// Create a new flag, with interrupts enabled
    ///
    /// # Safety
    ///
    /// Every dispatcher using this mask, including its `dispatch` calls, must
    /// only ever be driven from a single thread of execution.
    pub const unsafe fn new() -> SoftMask {
        SoftMask {
            enabled: AtomicBool::new(true),
            disables: AtomicU32::new(0),
        }
    }

    /// How many times has [`IrqMask::disable`] been called?
    pub fn disable_count(&self) -> u32 {
        self.disables.load(Ordering::Relaxed)
    }
}

// SAFETY: `SoftMask::new` requires a single execution context, so nothing
// can call into the dispatcher while we are "disabled".
unsafe impl IrqMask for SoftMask {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.disables.store(
            self.disables.load(Ordering::Relaxed).wrapping_add(1),
            Ordering::Relaxed,
        );
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }
}


// End of File
