//! Common panic/fault/timestamp handlers for the demos

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

use defmt_semihosting as _;

/// Cycles of the 25 MHz core clock per millisecond
pub const SYSTICKS_PER_MS: u32 = 25_000;

/// Called when a panic occurs.
///
/// Logs the panic to defmt and then crashes the CPU.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::println!("PANIC: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

/// Called when a HardFault occurs.
///
/// Logs the fault to defmt and then crashes the CPU.
#[cortex_m_rt::exception]
unsafe fn HardFault(info: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::println!("FAULT: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

// Log milliseconds since start in the defmt logs
defmt::timestamp!("{=u32:010}", punctual::port::now());

// End of File
