//! Monotonic clock and blocking delay from `embassy-time`

use embassy_time::{Delay, Instant};
use picoled_hal::{DelayNs, Monotonic};

/// Time source for the drivers
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Monotonic for EmbassyClock {
    fn now_micros(&self) -> u64 {
        Instant::now().as_micros()
    }
}

impl DelayNs for EmbassyClock {
    fn delay_ns(&mut self, ns: u32) {
        Delay.delay_ns(ns);
    }

    fn delay_us(&mut self, us: u32) {
        Delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        Delay.delay_ms(ms);
    }
}
