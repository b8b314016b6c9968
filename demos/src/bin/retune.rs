//! A heartbeat task whose rate the main loop changes on the fly

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use punctual::{
    Clock, Config, Dispatcher, Slot, TaskId, Timeout,
    port::{self, CortexMask, SysTickClock},
};
use punctual_demos::SYSTICKS_PER_MS;

static DISPATCHER: Dispatcher<'static> = Dispatcher::new(
    {
        static SLOTS: [Slot; 2] = [const { Slot::new() }; 2];
        &SLOTS
    },
    &CortexMask,
    Config::DEFAULT,
);

#[cortex_m_rt::entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    DISPATCHER.init();
    let watcher = DISPATCHER.create(timestamp).unwrap();
    port::start(&DISPATCHER, cp.SYST, SYSTICKS_PER_MS);

    let mut heartbeat = Timeout::new(&SysTickClock, 200);
    let mut beats = 0;
    loop {
        if heartbeat.check(&SysTickClock) {
            beats += 1;
            defmt::info!(
                "Beat {=u32} at {=u32}, task last ran at {=u32}",
                beats,
                SysTickClock.now(),
                DISPATCHER.receive(watcher)
            );
            match beats {
                // speed up without losing phase
                5 => heartbeat.edit(50),
                15 => retire(watcher),
                20 => semihosting::process::exit(0),
                _ => {}
            }
        }
        cortex_m::asm::wfi();
    }
}

fn retire(task: TaskId) {
    defmt::info!("Retiring {}", task);
    DISPATCHER.destroy(task);
}

/// Reports the time it was called
fn timestamp(_: usize) -> u32 {
    port::now()
}

// End of File
