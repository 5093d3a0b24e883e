// SPDX-License-Identifier: Apache-2.0

//! Stage counters.

use metrics::Unit;
use stats::{MetricSpec, Register, Registered};

/// A monotonic stage counter.
///
/// Carries both the counter registered with the global [`metrics`] recorder (for
/// publication) and a locally readable mirror, so the owning stage and its tests can
/// observe values without going through an exporter.
#[derive(Debug)]
pub struct StageCounter {
    count: u64,
    metric: Registered<metrics::Counter>,
}

impl StageCounter {
    fn register(id: &str, description: &str) -> Self {
        let spec = MetricSpec::builder()
            .id(id)
            .unit(Unit::Count)
            .target("fragmenter")
            .description(description)
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        Self {
            count: 0,
            metric: spec.register(),
        }
    }

    /// Add `n` to the counter.
    pub fn incr(&mut self, n: u64) {
        self.count += n;
        self.metric.metric.increment(n);
    }

    /// The locally mirrored value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.count
    }
}

/// Counters of the forward (fragmenting) path.
#[derive(Debug)]
pub struct FragmenterCounters {
    /// Fragments emitted.
    pub out_frag: StageCounter,
    /// Packets forwarded without fragmentation (including non-IPv4 passthroughs).
    pub out_frag_not: StageCounter,
}

impl FragmenterCounters {
    #[must_use]
    pub fn register() -> Self {
        Self {
            out_frag: StageCounter::register("out-ipv4-frag", "IPv4 fragments emitted"),
            out_frag_not: StageCounter::register(
                "out-ipv4-frag-not",
                "packets forwarded without fragmentation",
            ),
        }
    }
}

/// Counters of the return (PMTU discovery) path.
#[derive(Debug)]
pub struct PmtudCounters {
    /// Packets matching the "fragmentation needed" filter.
    pub ptb_received: StageCounter,
    /// Messages which passed validation and updated the cache.
    pub ptb_valid: StageCounter,
    /// Messages discarded for an invalid ICMP checksum.
    pub ptb_invalid_csum: StageCounter,
    /// Messages discarded for any other validation failure.
    pub ptb_invalid: StageCounter,
}

impl PmtudCounters {
    #[must_use]
    pub fn register() -> Self {
        Self {
            ptb_received: StageCounter::register(
                "ipv4-pmtud-ptb-received",
                "fragmentation-needed messages received",
            ),
            ptb_valid: StageCounter::register(
                "ipv4-pmtud-ptb-valid",
                "fragmentation-needed messages accepted",
            ),
            ptb_invalid_csum: StageCounter::register(
                "ipv4-pmtud-ptb-invalid-csum",
                "fragmentation-needed messages with a bad ICMP checksum",
            ),
            ptb_invalid: StageCounter::register(
                "ipv4-pmtud-ptb-invalid",
                "fragmentation-needed messages failing validation",
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::counters::FragmenterCounters;

    #[test]
    fn local_mirror_tracks_increments() {
        let mut counters = FragmenterCounters::register();
        assert_eq!(counters.out_frag.get(), 0);
        counters.out_frag.incr(3);
        counters.out_frag.incr(1);
        assert_eq!(counters.out_frag.get(), 4);
        assert_eq!(counters.out_frag_not.get(), 0);
    }
}
