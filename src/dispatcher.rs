//! Contains the [`Dispatcher`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering, compiler_fence};

use crate::{Config, IrqMask, MaskGuard, Slot, TaskFn};

/// Identifies a task in the table
///
/// Handed out by [`Dispatcher::create`] and valid until passed to
/// [`Dispatcher::destroy`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskId(usize);

impl TaskId {
    /// Get the position of this task in the table
    pub const fn index(self) -> usize {
        self.0
    }

    /// Refer to a given table position
    ///
    /// Positions outside the table are accepted here and ignored by the
    /// dispatcher.
    pub const fn from_index(index: usize) -> TaskId {
        TaskId(index)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "T{=usize:03}", self.0);
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "T{:03}", self.0)
    }
}

/// Things that can go wrong when registering a task
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Every slot in the table already holds a task
    TableFull,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::TableFull => defmt::write!(fmt, "task table full"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TableFull => write!(fmt, "task table full"),
        }
    }
}

/// A cooperative, interrupt-driven task dispatcher
///
/// Every task in the table is called, in table order, from the timer
/// interrupt once every `postscaler` interrupts. The main context talks to
/// a task by sending it a parameter and reading back its last result.
///
/// There is meant to be exactly one of these per system, usually in a
/// `static`. Only single-core systems are supported.
pub struct Dispatcher<'a> {
    /// The task table. Caller-owned so it never moves.
    slots: &'a [Slot],
    /// How we keep the dispatch interrupt out
    mask: &'a dyn IrqMask,
    /// Clocking parameters
    config: Config,
    /// Interrupts seen since the last dispatch pass
    postscaler: AtomicU32,
    /// Bumped at the start of every dispatch pass
    generation: AtomicU8,
}

impl<'a> Dispatcher<'a> {
    /// Build the dispatcher over the given task table
    pub const fn new(slots: &'a [Slot], mask: &'a dyn IrqMask, config: Config) -> Dispatcher<'a> {
        // Cannot dispatch without at least one slot
        assert!(!slots.is_empty());
        Dispatcher {
            slots,
            mask,
            config,
            postscaler: AtomicU32::new(0),
            generation: AtomicU8::new(0),
        }
    }

    /// Empty the task table and restart the postscaler
    ///
    /// Call this once, before anything else.
    pub fn init(&self) {
        let _masked = MaskGuard::new(self.mask);
        self.postscaler.store(0, Ordering::Relaxed);
        for slot in self.slots {
            // SAFETY: interrupts are masked
            unsafe { slot.clear() };
        }
        debug!("Init {=usize} slots", self.slots.len());
    }

    /// Put a task into the first free slot
    ///
    /// The task will be called on every dispatch pass from now on. A reused
    /// slot keeps the previous task's result until the first pass.
    pub fn create(&self, handle: TaskFn) -> Result<TaskId, Error> {
        let claimed = {
            // scan and claim in one critical section
            let _masked = MaskGuard::new(self.mask);
            let index = self.slots.iter().position(Slot::is_free);
            if let Some(index) = index {
                // SAFETY: interrupts are masked
                unsafe { self.slots[index].set_handle(Some(handle)) };
            }
            index
        };

        match claimed {
            Some(index) => {
                let task_id = TaskId(index);
                debug!("Created {}", task_id);
                Ok(task_id)
            }
            None => {
                warn!("Create failed: {}", Error::TableFull);
                Err(Error::TableFull)
            }
        }
    }

    /// Remove a task from the table
    ///
    /// Once this returns the task will not be called again. Unknown task IDs
    /// are ignored.
    ///
    /// This also clears the slot's pending parameter, so `destroy` is a third
    /// writer of it besides [`Dispatcher::send`] and the dispatch pass. A task
    /// later created in the same slot must not be handed a parameter that was
    /// meant for the task destroyed here.
    pub fn destroy(&self, task_id: TaskId) {
        let Some(slot) = self.slot(task_id) else {
            trace!("Ignored destroy of {}", task_id);
            return;
        };
        let _masked = MaskGuard::new(self.mask);
        // SAFETY: interrupts are masked
        unsafe { slot.set_handle(None) };
        slot.set_param(crate::NO_PARAM);
        debug!("Destroyed {}", task_id);
    }

    /// Call every task, if the postscaler says it is time
    ///
    /// Call this from the timer interrupt, and nowhere else. Returns `true`
    /// if this call did a dispatch pass.
    pub fn dispatch(&self) -> bool {
        let count = self.postscaler.load(Ordering::Relaxed).wrapping_add(1);
        if count < self.config.postscaler() {
            self.postscaler.store(count, Ordering::Relaxed);
            return false;
        }
        self.postscaler.store(0, Ordering::Relaxed);

        let generation = self.generation.load(Ordering::Relaxed).wrapping_add(1);
        self.generation.store(generation, Ordering::Release);
        compiler_fence(Ordering::SeqCst);
        trace!("Pass {=u8}", generation);

        for slot in self.slots {
            slot.run();
        }
        true
    }

    /// Give a task its parameter for the next dispatch pass
    ///
    /// Replaces anything sent earlier that the task has not yet seen.
    /// Unknown task IDs are ignored.
    pub fn send(&self, task_id: TaskId, data: usize) {
        let Some(slot) = self.slot(task_id) else {
            trace!("Ignored send to {}", task_id);
            return;
        };
        let _masked = MaskGuard::new(self.mask);
        slot.set_param(data);
        trace!("Sent {=usize} to {}", data, task_id);
    }

    /// Get the value the task returned on its last call
    ///
    /// Zero if it has not been called yet, or if the task ID is unknown.
    /// Never masks interrupts; retries instead if a dispatch pass happened
    /// during the read.
    pub fn receive(&self, task_id: TaskId) -> u32 {
        match self.slot(task_id) {
            Some(slot) => self.read_result(slot, || {}),
            None => 0,
        }
    }

    /// Read a slot's result, retrying until no dispatch pass overlaps the read
    ///
    /// `between` runs after the result is read and before the generation is
    /// checked again.
    fn read_result(&self, slot: &Slot, mut between: impl FnMut()) -> u32 {
        loop {
            let before = self.generation.load(Ordering::Acquire);
            compiler_fence(Ordering::SeqCst);
            let result = slot.result();
            between();
            compiler_fence(Ordering::SeqCst);
            if self.generation.load(Ordering::Acquire) == before {
                return result;
            }
        }
    }

    /// Number of completed dispatch passes, modulo 256
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Acquire)
    }

    /// Size of the task table
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently holding a task
    pub fn active(&self) -> usize {
        let _masked = MaskGuard::new(self.mask);
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    /// The clocking parameters we were built with
    pub const fn config(&self) -> Config {
        self.config
    }

    /// Look up a slot, checking the ID is inside the table
    fn slot(&self, task_id: TaskId) -> Option<&Slot> {
        self.slots.get(task_id.0)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::sync::atomic::AtomicU32;
    use std::string::ToString;

    use super::*;
    use crate::{NO_PARAM, SoftMask};

    const TASKS: usize = 4;

    fn double_plus_one(param: usize) -> u32 {
        param as u32 * 2 + 1
    }

    fn echo(param: usize) -> u32 {
        param as u32
    }

    fn soft_mask() -> SoftMask {
        // SAFETY: each test drives its dispatcher from one thread
        unsafe { SoftMask::new() }
    }

    fn table() -> [Slot; TASKS] {
        [const { Slot::new() }; TASKS]
    }

    #[test]
    fn full_table_rejects_create() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();

        let ids: [TaskId; TASKS] =
            core::array::from_fn(|_| d.create(echo).expect("table has room"));
        for (index, id) in ids.iter().enumerate() {
            assert_eq!(id.index(), index);
        }
        assert_eq!(d.active(), TASKS);
        assert_eq!(d.create(echo), Err(Error::TableFull));

        d.destroy(ids[2]);
        assert_eq!(d.active(), TASKS - 1);
        assert_eq!(d.create(echo), Ok(ids[2]));
    }

    #[test]
    fn param_is_delivered_once() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(double_plus_one).unwrap();

        d.send(id, 20);
        assert!(d.dispatch());
        assert_eq!(d.receive(id), 41);

        // nothing sent, so the task sees the cleared parameter
        assert!(d.dispatch());
        assert_eq!(d.receive(id), double_plus_one(NO_PARAM));
    }

    #[test]
    fn last_send_wins() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(echo).unwrap();

        d.send(id, 1);
        d.send(id, 2);
        d.send(id, 3);
        d.dispatch();
        assert_eq!(d.receive(id), 3);
    }

    #[test]
    fn receive_before_first_pass_is_zero() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(double_plus_one).unwrap();
        d.send(id, 5);
        assert_eq!(d.receive(id), 0);
    }

    #[test]
    fn read_retries_when_a_pass_overlaps() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(echo).unwrap();
        d.send(id, 10);
        d.dispatch();

        // A pass lands in the middle of the first read attempt
        d.send(id, 20);
        let mut attempts = 0;
        let result = d.read_result(&slots[id.index()], || {
            attempts += 1;
            if attempts == 1 {
                d.dispatch();
            }
        });
        assert_eq!(attempts, 2);
        assert_eq!(result, 20);
    }

    #[test]
    fn read_without_overlap_does_not_retry() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(echo).unwrap();
        d.send(id, 7);
        d.dispatch();

        let mut attempts = 0;
        let result = d.read_result(&slots[id.index()], || attempts += 1);
        assert_eq!(attempts, 1);
        assert_eq!(result, 7);
    }

    #[test]
    fn destroy_is_idempotent() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        fn counted(_: usize) -> u32 {
            CALLS.store(CALLS.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
            0
        }

        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(counted).unwrap();
        d.dispatch();
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);

        d.destroy(id);
        d.destroy(id);
        assert_eq!(d.active(), 0);
        d.dispatch();
        d.dispatch();
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn destroy_drops_pending_param() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(echo).unwrap();
        d.send(id, 99);
        d.destroy(id);

        let id = d.create(echo).unwrap();
        d.dispatch();
        assert_eq!(d.receive(id), NO_PARAM as u32);
    }

    #[test]
    fn out_of_range_ids_are_ignored() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(echo).unwrap();

        // one past the end is out of range too
        let bogus = TaskId::from_index(TASKS);
        d.send(bogus, 5);
        d.destroy(bogus);
        d.destroy(TaskId::from_index(usize::MAX));
        assert_eq!(d.receive(bogus), 0);
        assert_eq!(d.active(), 1);

        d.send(id, 3);
        d.dispatch();
        assert_eq!(d.receive(id), 3);
    }

    #[test]
    fn postscaler_divides_interrupts() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT.with_postscaler(3));
        d.init();

        let passes: [bool; 7] = core::array::from_fn(|_| d.dispatch());
        assert_eq!(passes, [false, false, true, false, false, true, false]);
        assert_eq!(d.generation(), 2);
    }

    #[test]
    fn tasks_run_in_table_order() {
        static SEQUENCE: AtomicU32 = AtomicU32::new(0);
        fn next(_: usize) -> u32 {
            let value = SEQUENCE.load(Ordering::Relaxed) + 1;
            SEQUENCE.store(value, Ordering::Relaxed);
            value
        }

        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let first = d.create(next).unwrap();
        let second = d.create(next).unwrap();
        let third = d.create(next).unwrap();

        d.dispatch();
        assert_eq!(d.receive(first), 1);
        assert_eq!(d.receive(second), 2);
        assert_eq!(d.receive(third), 3);
    }

    #[test]
    fn generation_wraps() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        for _ in 0..256 {
            d.dispatch();
        }
        assert_eq!(d.generation(), 0);
    }

    #[test]
    fn mutations_restore_interrupt_state() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        assert!(mask.is_enabled());

        let id = d.create(echo).unwrap();
        d.send(id, 1);
        d.destroy(id);
        assert!(mask.is_enabled());
        assert_eq!(mask.disable_count(), 4);

        // called from inside someone else's critical section
        mask.disable();
        let id = d.create(echo).unwrap();
        d.send(id, 1);
        d.destroy(id);
        assert!(!mask.is_enabled());
    }

    #[test]
    fn receive_never_masks() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT);
        d.init();
        let id = d.create(echo).unwrap();
        let before = mask.disable_count();
        d.receive(id);
        assert_eq!(mask.disable_count(), before);
    }

    #[test]
    fn init_clears_table() {
        let slots = table();
        let mask = soft_mask();
        let d = Dispatcher::new(&slots, &mask, Config::DEFAULT.with_postscaler(2));
        d.init();
        let id = d.create(echo).unwrap();
        d.send(id, 8);
        d.dispatch();
        d.dispatch();
        assert_eq!(d.receive(id), 8);
        // leave the postscaler part-way
        d.dispatch();

        d.init();
        assert_eq!(d.active(), 0);
        assert_eq!(d.receive(id), 0);
        assert!(!d.dispatch());
        assert!(d.dispatch());
    }

    #[test]
    fn display_task_id() {
        assert_eq!(TaskId::from_index(7).to_string(), "T007");
        assert_eq!(Error::TableFull.to_string(), "task table full");
    }
}

// End of File
