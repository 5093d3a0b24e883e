// SPDX-License-Identifier: Apache-2.0

//! The outgoing-fragments rate alarm.

use crate::clock::TickSource;
use metrics::Unit;
use stats::{ExponentiallyWeightedMovingAverage, MetricSpec, Register, Registered};
use tracing::{info, warn};

/// Warning-severity alarm on the rate of emitted fragments.
///
/// The fragment counter is sampled once per scheduling pass; the resulting rate is
/// smoothed with an EWMA and compared against the threshold. The raise and clear events
/// are reported on the logging infrastructure and the smoothed rate is published as a
/// gauge; the host's alarm inventory consumes those, not this object.
#[derive(Debug)]
pub struct FragmentRateAlarm {
    threshold: f64,
    rate: ExponentiallyWeightedMovingAverage,
    gauge: Registered<metrics::Gauge>,
    last_sample: Option<(f64, u64)>,
    raised: bool,
}

impl FragmentRateAlarm {
    /// Fragments per second above which the alarm raises.
    pub const DEFAULT_THRESHOLD: f64 = 10_000.0;
    // smoothing constant for the fragment rate
    const TAU_SECONDS: f64 = 2.0;

    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(Self::DEFAULT_THRESHOLD)
    }

    /// An alarm with a custom threshold (fragments per second).
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        let spec = MetricSpec::builder()
            .id("outgoing-ipv4-fragments")
            .unit(Unit::CountPerSecond)
            .target("fragmenter")
            .description("smoothed rate of emitted IPv4 fragments")
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        Self {
            threshold,
            rate: ExponentiallyWeightedMovingAverage::new(Self::TAU_SECONDS),
            gauge: spec.register(),
            last_sample: None,
            raised: false,
        }
    }

    /// Feed the current fragment count into the rate estimator.
    #[allow(clippy::cast_precision_loss)] // counter deltas are far below 2^52
    pub fn observe(&mut self, clock: &impl TickSource, fragments_total: u64) {
        let now = clock.now_ticks() as f64 / clock.ticks_per_second() as f64;
        let Some((last_time, last_count)) = self.last_sample else {
            self.last_sample = Some((now, fragments_total));
            return;
        };
        if now <= last_time {
            return;
        }
        self.last_sample = Some((now, fragments_total));
        let delta = fragments_total.saturating_sub(last_count) as f64;
        let smoothed = self.rate.update((now, delta / (now - last_time)));
        self.gauge.metric.set(smoothed);
        if smoothed > self.threshold && !self.raised {
            self.raised = true;
            warn!(
                "outgoing-ipv4-fragments alarm raised: {smoothed:.0} fragments/s exceeds {threshold:.0}",
                threshold = self.threshold
            );
        } else if smoothed < self.threshold && self.raised {
            self.raised = false;
            info!("outgoing-ipv4-fragments alarm cleared");
        }
    }

    /// Whether the alarm is currently raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }
}

impl Default for FragmentRateAlarm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use crate::alarm::FragmentRateAlarm;
    use crate::clock::TestClock;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn raises_above_threshold_and_clears_below() {
        let clock = TestClock::new();
        let mut alarm = FragmentRateAlarm::with_threshold(100.0);

        let mut total = 0_u64;
        alarm.observe(&clock, total);
        assert!(!alarm.is_raised());

        // 1000 fragments/s for a few seconds
        for _ in 0..5 {
            clock.advance_seconds(1);
            total += 1000;
            alarm.observe(&clock, total);
        }
        assert!(alarm.is_raised());
        assert!(logs_contain("outgoing-ipv4-fragments alarm raised"));

        // silence for a while drives the smoothed rate back down
        for _ in 0..30 {
            clock.advance_seconds(1);
            alarm.observe(&clock, total);
        }
        assert!(!alarm.is_raised());
        assert!(logs_contain("outgoing-ipv4-fragments alarm cleared"));
    }

    #[test]
    fn stalled_clock_does_not_divide_by_zero() {
        let clock = TestClock::new();
        let mut alarm = FragmentRateAlarm::new();
        alarm.observe(&clock, 0);
        alarm.observe(&clock, 1_000_000);
        assert!(!alarm.is_raised());
    }
}
