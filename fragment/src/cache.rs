// SPDX-License-Identifier: Apache-2.0

//! The per-destination path-MTU cache.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// A learned path MTU toward one destination.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PmtuEntry {
    /// The learned MTU, in bytes at the IP layer.
    pub mtu: u16,
    /// Tick at which the entry was created or last refreshed.
    pub tstamp: u64,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<Ipv4Addr, PmtuEntry>,
    capacity: usize,
}

/// The per-destination MTU cache.
///
/// Keyed by destination address; written by the PMTUD ingest on valid "fragmentation
/// needed" messages, read by the MTU resolver, and pruned by the periodic sweep. The
/// cache is shared between those network functions via `Arc`; the single stage owns the
/// only writers.
///
/// Occupancy is bounded at [`PmtuCache::MAX_LOAD_PERCENT`] of the nominal capacity;
/// inserting past the bound doubles the capacity before the entry goes in.
#[derive(Debug)]
pub struct PmtuCache {
    inner: RwLock<CacheInner>,
}

impl PmtuCache {
    /// Nominal initial capacity of the cache.
    pub const INITIAL_CAPACITY: usize = 128;
    /// Maximum live occupancy, as a percentage of the nominal capacity.
    pub const MAX_LOAD_PERCENT: usize = 40;

    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                map: HashMap::with_capacity(Self::INITIAL_CAPACITY),
                capacity: Self::INITIAL_CAPACITY,
            }),
        }
    }

    /// Look up the learned MTU entry for `dst`.
    #[must_use]
    pub fn lookup(&self, dst: Ipv4Addr) -> Option<PmtuEntry> {
        self.inner.read().map.get(&dst).copied()
    }

    /// Insert or refresh the entry for `dst`.
    pub fn upsert(&self, dst: Ipv4Addr, mtu: u16, tstamp: u64) {
        let mut inner = self.inner.write();
        let entry = PmtuEntry { mtu, tstamp };
        if let Some(existing) = inner.map.get_mut(&dst) {
            *existing = entry;
            return;
        }
        if inner.map.len() + 1 > inner.capacity * Self::MAX_LOAD_PERCENT / 100 {
            inner.capacity *= 2;
            let additional = inner.capacity - inner.map.len();
            inner.map.reserve(additional);
            debug!(
                "path-MTU cache grown to nominal capacity {}",
                inner.capacity
            );
        }
        trace!("learned path MTU {mtu} toward {dst}");
        inner.map.insert(dst, entry);
    }

    /// Remove every entry older than `timeout_ticks`.
    ///
    /// A full scan; the cache is expected to stay small. Surviving entries all satisfy
    /// `now - tstamp <= timeout_ticks` when the sweep returns.
    pub fn sweep(&self, now: u64, timeout_ticks: u64) {
        let mut inner = self.inner.write();
        let before = inner.map.len();
        inner
            .map
            .retain(|_, entry| now.saturating_sub(entry.tstamp) <= timeout_ticks);
        let expired = before - inner.map.len();
        if expired > 0 {
            debug!("expired {expired} path-MTU cache entries");
        }
    }

    /// The number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    /// True when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    /// The current maximum occupancy before the next growth step.
    #[must_use]
    pub fn max_occupancy(&self) -> usize {
        let inner = self.inner.read();
        inner.capacity * Self::MAX_LOAD_PERCENT / 100
    }
}

impl Default for PmtuCache {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::cache::PmtuCache;
    use std::net::Ipv4Addr;

    fn nth_addr(n: u32) -> Ipv4Addr {
        Ipv4Addr::from(0x0A00_0000_u32 | n)
    }

    #[test]
    fn upsert_refreshes_in_place() {
        let cache = PmtuCache::new();
        let dst = nth_addr(1);
        cache.upsert(dst, 1400, 10);
        cache.upsert(dst, 1200, 20);
        assert_eq!(cache.len(), 1);
        let entry = cache.lookup(dst).unwrap();
        assert_eq!(entry.mtu, 1200);
        assert_eq!(entry.tstamp, 20);
    }

    #[test]
    fn occupancy_is_bounded_and_grows() {
        let cache = PmtuCache::new();
        let initial_bound =
            PmtuCache::INITIAL_CAPACITY * PmtuCache::MAX_LOAD_PERCENT / 100;
        assert_eq!(cache.max_occupancy(), initial_bound);

        for n in 0..=initial_bound {
            cache.upsert(nth_addr(u32::try_from(n).unwrap()), 1400, 0);
        }
        // inserting past the bound doubled the nominal capacity
        assert_eq!(cache.len(), initial_bound + 1);
        assert_eq!(cache.max_occupancy(), 2 * initial_bound);
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let cache = PmtuCache::new();
        cache.upsert(nth_addr(1), 1400, 0);
        cache.upsert(nth_addr(2), 1400, 500);
        cache.upsert(nth_addr(3), 1400, 900);

        let timeout = 600;
        let now = 1000;
        cache.sweep(now, timeout);

        assert!(cache.lookup(nth_addr(1)).is_none());
        assert!(cache.lookup(nth_addr(2)).is_some());
        assert!(cache.lookup(nth_addr(3)).is_some());
        // every survivor is fresh
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn sweep_freshness_holds_for_arbitrary_populations() {
        bolero::check!()
            .with_type()
            .for_each(|entries: &Vec<(u32, u16, u64)>| {
                let cache = PmtuCache::new();
                for (addr, mtu, tstamp) in entries {
                    cache.upsert(nth_addr(*addr), *mtu, *tstamp % 2000);
                }
                let now = 1500_u64;
                let timeout = 600_u64;
                cache.sweep(now, timeout);
                for (addr, _, _) in entries {
                    if let Some(entry) = cache.lookup(nth_addr(*addr)) {
                        assert!(now.saturating_sub(entry.tstamp) <= timeout);
                    }
                }
            });
    }
}
