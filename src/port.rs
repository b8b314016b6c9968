//! Cortex-M port
//!
//! Masks interrupts with PRIMASK, drives the dispatcher and the tick counter
//! from SysTick, and exposes that tick counter as a [`Clock`].

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::{Clock, Dispatcher, IrqMask, Ticks};

/// The location of our one and only [`Dispatcher`] object.
///
/// We need this so that the free-standing SysTick handler knows where the
/// task table is.
static DISPATCHER_PTR: AtomicPtr<Dispatcher<'static>> = AtomicPtr::new(core::ptr::null_mut());

/// Free-running tick counter, advanced by SysTick
static TICKS: AtomicU32 = AtomicU32::new(0);

/// How far [`TICKS`] moves per SysTick
static TICKS_PER_ISR: AtomicU32 = AtomicU32::new(1);

/// Interrupt masking through PRIMASK
pub struct CortexMask;

impl CortexMask {
    /// Create a handle to the PRIMASK register
    pub const fn new() -> CortexMask {
        CortexMask
    }
}

impl Default for CortexMask {
    fn default() -> Self {
        CortexMask::new()
    }
}

// SAFETY: on a single core, setting PRIMASK stops every configurable
// exception, SysTick included, from running until it is cleared again. The
// dispatcher is only supported on single-core parts.
unsafe impl IrqMask for CortexMask {
    fn is_enabled(&self) -> bool {
        cortex_m::register::primask::read().is_active()
    }

    fn disable(&self) {
        cortex_m::interrupt::disable();
    }

    fn enable(&self) {
        // SAFETY: only called by a MaskGuard restoring the state it found,
        // so we never re-enable inside someone else's critical section.
        unsafe { cortex_m::interrupt::enable() }
    }
}

/// The SysTick tick counter, as a [`Clock`]
pub struct SysTickClock;

impl Clock for SysTickClock {
    fn now(&self) -> Ticks {
        now()
    }
}

/// Start calling the dispatcher from SysTick
///
/// Call this once from `fn main()`, after [`Dispatcher::init`]. Tasks may be
/// created before or after. `systicks_per_isr` is the number of processor
/// clock cycles between SysTick interrupts and should match the
/// dispatcher's configured interrupt period.
pub fn start(
    dispatcher: &'static Dispatcher<'static>,
    mut syst: cortex_m::peripheral::SYST,
    systicks_per_isr: u32,
) {
    if !DISPATCHER_PTR.load(Ordering::Acquire).is_null() {
        warn!("Dispatcher already started");
        return;
    }

    info!(
        "Dispatcher @ {=usize:08x}, {=u32} systicks per interrupt",
        dispatcher as *const Dispatcher as usize,
        systicks_per_isr
    );
    TICKS_PER_ISR.store(dispatcher.config().ticks_per_isr(), Ordering::Relaxed);

    // Must do this /before/ enabling SysTick because the SysTick exception
    // handler will use DISPATCHER_PTR
    let dispatcher_ptr = dispatcher as *const Dispatcher<'static> as *mut Dispatcher<'static>;
    DISPATCHER_PTR.store(dispatcher_ptr, Ordering::Release);

    // The counter runs from the reload value down to zero, inclusive
    syst.set_reload(systicks_per_isr.saturating_sub(1));
    syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Get the current time in ticks
pub fn now() -> Ticks {
    TICKS.load(Ordering::Relaxed)
}

/// Get the running dispatcher, if [`start`] has been called
fn get_dispatcher() -> Option<&'static Dispatcher<'static>> {
    let dispatcher_ptr = DISPATCHER_PTR.load(Ordering::Acquire);
    if dispatcher_ptr.is_null() {
        None
    } else {
        // SAFETY: Only [`start`] writes to [`DISPATCHER_PTR`] and it always
        // sets it from a `&'static Dispatcher`.
        Some(unsafe { &*dispatcher_ptr })
    }
}

/// Move the tick counter on by one interrupt's worth
fn advance_ticks() {
    let step = TICKS_PER_ISR.load(Ordering::Relaxed);

    #[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
    TICKS.fetch_add(step, Ordering::Relaxed);

    #[cfg(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))]
    cortex_m::interrupt::free(|_| {
        TICKS.store(TICKS.load(Ordering::Relaxed).wrapping_add(step), Ordering::Relaxed);
    });
}

/// SysTick Handler
#[unsafe(no_mangle)]
extern "C" fn SysTick() {
    advance_ticks();
    if let Some(dispatcher) = get_dispatcher() {
        dispatcher.dispatch();
    }
}

// End of File
