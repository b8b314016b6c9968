//! Holds the [`Config`] type and the compile-time limits

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Ticks;

/// Size of the task table if you have no better idea
pub const DEFAULT_MAX_TASKS: usize = 4;

/// The longest period a [`Timeout`](crate::Timeout) should be given, in ticks
///
/// Comparisons are done on signed differences, so anything near 2^31 would
/// be ambiguous. This leaves plenty of headroom for late checks.
pub const TIMEOUT_MAX_TICKS: Ticks = 0x1000_0000;

/// How the dispatcher is clocked
///
/// All the fields are in microseconds except `postscaler`, which is the
/// number of interrupts per dispatch pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// How often the timer interrupt fires
    isr_period_us: u32,
    /// Number of interrupts per dispatch pass
    postscaler: u32,
    /// How long one tick of the tick counter lasts
    tick_us: u32,
}

impl Config {
    /// A 1 ms interrupt, a dispatch pass on every interrupt, and 1 ms ticks
    pub const DEFAULT: Config = Config::new(1000, 1, 1000);

    /// Build a configuration
    ///
    /// Panics (at compile time, if used in a `const` or `static`) if
    /// `postscaler` or `tick_us` is zero.
    pub const fn new(isr_period_us: u32, postscaler: u32, tick_us: u32) -> Config {
        assert!(postscaler != 0, "postscaler must be at least 1");
        assert!(tick_us != 0, "tick must be at least 1 us");
        Config {
            isr_period_us,
            postscaler,
            tick_us,
        }
    }

    /// Change the timer interrupt period
    pub const fn with_isr_period_us(self, isr_period_us: u32) -> Config {
        Config::new(isr_period_us, self.postscaler, self.tick_us)
    }

    /// Change the number of interrupts per dispatch pass
    pub const fn with_postscaler(self, postscaler: u32) -> Config {
        Config::new(self.isr_period_us, postscaler, self.tick_us)
    }

    /// Change the length of a tick
    pub const fn with_tick_us(self, tick_us: u32) -> Config {
        Config::new(self.isr_period_us, self.postscaler, tick_us)
    }

    /// How often the timer interrupt fires, in microseconds
    pub const fn isr_period_us(&self) -> u32 {
        self.isr_period_us
    }

    /// Number of timer interrupts per dispatch pass
    pub const fn postscaler(&self) -> u32 {
        self.postscaler
    }

    /// Length of one tick of the tick counter, in microseconds
    pub const fn tick_us(&self) -> u32 {
        self.tick_us
    }

    /// Time between dispatch passes
    pub const fn period_us(&self) -> u32 {
        self.isr_period_us.saturating_mul(self.postscaler)
    }

    /// Ticks per millisecond (zero if a tick is longer than that)
    pub const fn ticks_per_ms(&self) -> u32 {
        1000 / self.tick_us
    }

    /// Ticks per second
    pub const fn ticks_per_s(&self) -> u32 {
        1_000_000 / self.tick_us
    }

    /// How far the tick counter moves on each timer interrupt
    ///
    /// Never less than one.
    pub const fn ticks_per_isr(&self) -> u32 {
        let ticks = self.isr_period_us / self.tick_us;
        if ticks == 0 { 1 } else { ticks }
    }

    /// [`TIMEOUT_MAX_TICKS`] in milliseconds, saturating at `u32::MAX`
    pub const fn timeout_max_ms(&self) -> u32 {
        saturate(TIMEOUT_MAX_TICKS as u64 * self.tick_us as u64 / 1000)
    }

    /// [`TIMEOUT_MAX_TICKS`] in seconds, saturating at `u32::MAX`
    pub const fn timeout_max_secs(&self) -> u32 {
        saturate(TIMEOUT_MAX_TICKS as u64 * self.tick_us as u64 / 1_000_000)
    }
}

/// `u32::try_from(value).unwrap_or(u32::MAX)`, but usable in a `const fn`
const fn saturate(value: u64) -> u32 {
    if value > u32::MAX as u64 {
        u32::MAX
    } else {
        value as u32
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_ms() {
        let config = Config::default();
        assert_eq!(config.period_us(), 1000);
        assert_eq!(config.ticks_per_ms(), 1);
        assert_eq!(config.ticks_per_s(), 1000);
        assert_eq!(config.ticks_per_isr(), 1);
        assert_eq!(config.timeout_max_ms(), 0x1000_0000);
        assert_eq!(config.timeout_max_secs(), 0x1000_0000 / 1000);
    }

    #[test]
    fn postscaler_stretches_period() {
        let config = Config::DEFAULT.with_isr_period_us(250).with_postscaler(8);
        assert_eq!(config.period_us(), 2000);
        assert_eq!(config.postscaler(), 8);
    }

    #[test]
    fn fine_ticks() {
        let config = Config::DEFAULT.with_isr_period_us(500).with_tick_us(100);
        assert_eq!(config.ticks_per_ms(), 10);
        assert_eq!(config.ticks_per_isr(), 5);
        assert_eq!(config.timeout_max_ms(), 0x1000_0000 / 10);
    }

    #[test]
    fn coarse_ticks_still_advance() {
        let config = Config::DEFAULT.with_isr_period_us(100);
        assert_eq!(config.ticks_per_isr(), 1);
    }

    #[test]
    fn long_ticks_saturate_limits() {
        // 2^28 ticks of 100 ms is more milliseconds than a u32 holds
        let config = Config::DEFAULT.with_tick_us(100_000);
        assert_eq!(config.timeout_max_ms(), u32::MAX);
        assert_eq!(config.timeout_max_secs(), 0x1000_0000 / 10);

        // just past the point where the millisecond figure stops fitting
        let config = Config::DEFAULT.with_tick_us(16_001);
        assert_eq!(config.timeout_max_ms(), u32::MAX);

        let config = Config::DEFAULT.with_tick_us(u32::MAX);
        assert_eq!(config.timeout_max_ms(), u32::MAX);
        assert_eq!(config.timeout_max_secs(), u32::MAX);
    }

    #[test]
    #[should_panic]
    fn zero_postscaler_rejected() {
        let _ = Config::DEFAULT.with_postscaler(0);
    }
}

// End of File
