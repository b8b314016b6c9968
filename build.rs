//! Build script for Punctual
//!
//! Emits the `arm_architecture` cfg the Cortex-M port uses to pick between
//! atomic and interrupt-masked tick updates.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
fn main() {
    // Host builds (unit tests, simulation) have no Arm cfgs to emit
    if std::env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("arm") {
        arm_targets::process();
    }
}

// End of File
