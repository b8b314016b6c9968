//! Two tasks called every 10 ms, fed and read from the main loop

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use punctual::{
    Config, Dispatcher, Slot, Timeout,
    port::{self, CortexMask, SysTickClock},
};
use punctual_demos::SYSTICKS_PER_MS;

/// 1 ms SysTick, dispatch every tenth interrupt
const CONFIG: Config = Config::DEFAULT.with_postscaler(10);

static DISPATCHER: Dispatcher<'static> = Dispatcher::new(
    {
        static SLOTS: [Slot; punctual::DEFAULT_MAX_TASKS] =
            [const { Slot::new() }; punctual::DEFAULT_MAX_TASKS];
        &SLOTS
    },
    &CortexMask,
    CONFIG,
);

#[cortex_m_rt::entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    defmt::info!("Hello! Tasks run every {=u32} us", CONFIG.period_us());

    DISPATCHER.init();
    let counter = DISPATCHER.create(count_passes).unwrap();
    let squarer = DISPATCHER.create(square).unwrap();
    port::start(&DISPATCHER, cp.SYST, SYSTICKS_PER_MS);

    let mut report = Timeout::new(&SysTickClock, 100);
    let mut finish = Timeout::new(&SysTickClock, 2000);
    let mut value = 0;
    loop {
        if report.check(&SysTickClock) {
            defmt::info!(
                "{=u32} passes, last square {=u32}",
                DISPATCHER.receive(counter),
                DISPATCHER.receive(squarer)
            );
            value += 1;
            DISPATCHER.send(squarer, value);
        }
        if finish.check(&SysTickClock) {
            defmt::info!("Done");
            semihosting::process::exit(0);
        }
        cortex_m::asm::wfi();
    }
}

/// Counts how many dispatch passes it has seen
fn count_passes(_: usize) -> u32 {
    static PASSES: AtomicU32 = AtomicU32::new(0);
    let passes = PASSES.load(Ordering::Relaxed) + 1;
    PASSES.store(passes, Ordering::Relaxed);
    passes
}

/// Squares whatever it was sent (or zero, if nothing was sent)
fn square(value: usize) -> u32 {
    (value * value) as u32
}

// End of File
