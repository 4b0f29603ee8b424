//! Bounded waits against the monotonic clock

use picoled_hal::Monotonic;

/// Point in time after which a wait gives up
///
/// A zero timeout never expires.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<u64>,
}

impl Deadline {
    pub fn after_ms(clock: &impl Monotonic, timeout_ms: u32) -> Self {
        Self::after_us(clock, timeout_ms as u64 * 1000)
    }

    pub fn after_us(clock: &impl Monotonic, timeout_us: u64) -> Self {
        let at = (timeout_us > 0).then(|| clock.now_micros() + timeout_us);
        Self { at }
    }

    pub fn expired(&self, clock: &impl Monotonic) -> bool {
        match self.at {
            Some(at) => clock.now_micros() >= at,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClock;

    #[test]
    fn test_deadline() {
        let clock = MockClock::new();
        let deadline = Deadline::after_ms(&clock, 1);
        assert!(!deadline.expired(&clock));
        clock.advance(1000);
        assert!(deadline.expired(&clock));
    }

    #[test]
    fn test_zero_timeout_never_expires() {
        let clock = MockClock::new();
        let deadline = Deadline::after_ms(&clock, 0);
        clock.advance(u32::MAX as u64);
        assert!(!deadline.expired(&clock));
    }
}
