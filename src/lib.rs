//! Punctual: periodic tasks and timeouts for bare-metal systems
//!
//! A fixed table of tasks is called, in order, from a timer interrupt. The
//! main context can hand each task a parameter and read back what it last
//! returned, without locks and without masking interrupts on the read path.
//! [`Timeout`] provides cheap periodic timeouts against the same tick
//! counter.
//!
//! ```no_run
//! use punctual::{Config, Dispatcher, Slot, SoftMask};
//!
//! const TASKS: usize = punctual::DEFAULT_MAX_TASKS;
//!
//! static SLOTS: [Slot; TASKS] = [const { Slot::new() }; TASKS];
//! // SAFETY: this program drives the dispatcher from one thread only
//! static MASK: SoftMask = unsafe { SoftMask::new() };
//! static DISPATCHER: Dispatcher<'static> = Dispatcher::new(&SLOTS, &MASK, Config::DEFAULT);
//!
//! fn square(x: usize) -> u32 {
//!     (x * x) as u32
//! }
//!
//! DISPATCHER.init();
//! let task = DISPATCHER.create(square).unwrap();
//! DISPATCHER.send(task, 12);
//! // ... the timer interrupt calls DISPATCHER.dispatch() ...
//! let _last = DISPATCHER.receive(task);
//! ```
//!
//! On Cortex-M, the `port` module provides the interrupt mask, the SysTick handler and
//! the tick counter.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

#[macro_use]
mod fmt;

mod config;
mod dispatcher;
mod mask;
mod slot;
mod timeout;

#[cfg(target_arch = "arm")]
pub mod port;

pub use config::{Config, DEFAULT_MAX_TASKS, TIMEOUT_MAX_TICKS};
pub use dispatcher::{Dispatcher, Error, TaskId};
pub use mask::{IrqMask, MaskGuard, SoftMask};
pub use slot::{NO_PARAM, Slot, TaskFn};
pub use timeout::{Clock, ManualClock, Ticks, Timeout};

// End of File
