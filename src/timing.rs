//! Pacing between completion polls.
//!
//! `read()` polls the completion condition a bounded number of times. What
//! happens between two polls is decided by a [`PollClock`], so tests can
//! drive timeouts deterministically and hosted builds can yield instead of
//! spinning.

use std::time::Duration;

/// Waits between two completion polls.
pub trait PollClock {
    /// Called after the `attempt`-th unsuccessful poll, before the next one.
    fn pause(&mut self, attempt: u32);
}

/// Busy-waits with a CPU spin hint. The default for `read()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinClock;

impl PollClock for SpinClock {
    fn pause(&mut self, _attempt: u32) {
        std::hint::spin_loop();
    }
}

/// Sleeps the calling thread for a fixed interval between polls.
#[derive(Debug, Clone, Copy)]
pub struct SleepClock {
    interval: Duration,
}

impl SleepClock {
    /// Create a clock that sleeps `interval` between polls.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Sleep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl PollClock for SleepClock {
    fn pause(&mut self, _attempt: u32) {
        std::thread::sleep(self.interval);
    }
}

impl<F: FnMut(u32)> PollClock for F {
    fn pause(&mut self, attempt: u32) {
        self(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_clock_sees_attempts() {
        let mut seen = Vec::new();
        {
            let mut clock = |attempt: u32| seen.push(attempt);
            for attempt in 1..=3 {
                clock.pause(attempt);
            }
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_sleep_clock_interval() {
        let clock = SleepClock::new(Duration::from_micros(50));
        assert_eq!(clock.interval(), Duration::from_micros(50));
    }
}
