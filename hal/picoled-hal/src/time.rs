//! Monotonic time source
//!
//! Break/mark phases, latch intervals and bounded waits are all measured
//! against a free-running microsecond counter. Blocking delays come from
//! [`embedded_hal::delay::DelayNs`]; drivers take one clock value that
//! implements both.

pub use embedded_hal::delay::DelayNs;

/// Free-running microsecond counter
pub trait Monotonic {
    /// Microseconds since an arbitrary epoch; never goes backwards
    fn now_micros(&self) -> u64;

    /// Microseconds elapsed since `since`
    fn elapsed_micros(&self, since: u64) -> u64 {
        self.now_micros().saturating_sub(since)
    }
}

/// Clock usable by the drivers: timestamps plus blocking delays
pub trait Clock: Monotonic + DelayNs {}

impl<T: Monotonic + DelayNs> Clock for T {}
