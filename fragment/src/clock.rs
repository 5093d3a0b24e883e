// SPDX-License-Identifier: Apache-2.0

//! Monotonic tick sources and the sweep throttle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic tick counter.
///
/// The stage never reads the wall clock; everything time-driven is expressed in ticks of
/// an abstract source so that tests can drive time by hand.
pub trait TickSource {
    /// The current tick count. Must be monotonic non-decreasing.
    fn now_ticks(&self) -> u64;
    /// The number of ticks per second of this source.
    fn ticks_per_second(&self) -> u64;
}

/// A [`TickSource`] backed by [`Instant`], counting nanoseconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemClock {
    #[allow(clippy::cast_possible_truncation)] // ~584 years of nanoseconds fit in a u64
    fn now_ticks(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn ticks_per_second(&self) -> u64 {
        1_000_000_000
    }
}

/// A manually advanced [`TickSource`] for tests, ticking in milliseconds.
///
/// Clones share the same underlying counter, so a test can hold one handle and advance
/// the time observed by the stages holding the others.
#[derive(Debug, Clone, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl TestClock {
    /// Ticks per second of a [`TestClock`].
    pub const TICKS_PER_SECOND: u64 = 1_000;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `ticks`.
    pub fn advance(&self, ticks: u64) {
        self.0.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Advance the clock by `seconds`.
    pub fn advance_seconds(&self, seconds: u64) {
        self.advance(seconds * Self::TICKS_PER_SECOND);
    }
}

impl TickSource for TestClock {
    fn now_ticks(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn ticks_per_second(&self) -> u64 {
        Self::TICKS_PER_SECOND
    }
}

/// Fires at most once per period.
///
/// The first call to [`Throttle::ready`] fires immediately; subsequent calls fire once the
/// period has elapsed since the last firing.
#[derive(Debug)]
pub struct Throttle {
    period_ticks: u64,
    last_fired: Option<u64>,
}

impl Throttle {
    /// A throttle with the given period, in ticks.
    #[must_use]
    pub fn new(period_ticks: u64) -> Self {
        Self {
            period_ticks,
            last_fired: None,
        }
    }

    /// A throttle with the given period in seconds of the supplied source.
    #[must_use]
    pub fn from_seconds(seconds: u64, source: &impl TickSource) -> Self {
        Self::new(seconds.saturating_mul(source.ticks_per_second()))
    }

    /// Check (and consume) the throttle: true if the period has elapsed since the last
    /// firing (or if the throttle has never fired).
    pub fn ready(&mut self, now: u64) -> bool {
        match self.last_fired {
            None => {
                self.last_fired = Some(now);
                true
            }
            Some(last) => {
                if now.saturating_sub(last) >= self.period_ticks {
                    self.last_fired = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::clock::{TestClock, Throttle, TickSource};

    #[test]
    fn test_clock_advances_by_hand() {
        let clock = TestClock::new();
        let observer = clock.clone();
        assert_eq!(observer.now_ticks(), 0);
        clock.advance_seconds(2);
        assert_eq!(observer.now_ticks(), 2 * TestClock::TICKS_PER_SECOND);
    }

    #[test]
    fn throttle_fires_first_then_once_per_period() {
        let clock = TestClock::new();
        let mut throttle = Throttle::from_seconds(60, &clock);

        assert!(throttle.ready(clock.now_ticks()));
        assert!(!throttle.ready(clock.now_ticks()));

        clock.advance_seconds(59);
        assert!(!throttle.ready(clock.now_ticks()));

        clock.advance_seconds(1);
        assert!(throttle.ready(clock.now_ticks()));
        assert!(!throttle.ready(clock.now_ticks()));
    }
}
