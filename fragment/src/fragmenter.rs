// SPDX-License-Identifier: Apache-2.0

//! The forward path: classify ingress traffic, resolve the egress MTU, cut fragments.

use crate::alarm::FragmentRateAlarm;
use crate::cache::PmtuCache;
use crate::clock::{SystemClock, Throttle, TickSource};
use crate::config::{ConfigError, FragmenterConfig};
use crate::counters::FragmenterCounters;
use crate::frag_id::FragmentIdSequence;
use crate::pmtud::PmtudIngest;
use net::buffer::{PacketBufferAllocator, PacketBufferMut};
use net::checksum::Checksum;
use net::eth::Eth;
use net::eth::ethtype::EthType;
use net::headers::{Headers, TryEth, TryIpv4};
use net::ipv4::frag_offset::FragOffset;
use net::packet::{DoneReason, Packet};
use net::parse::DeParse;
use pipeline::NetworkFunction;
use std::sync::Arc;
use tracing::{trace, warn};

/// The fragmenting network function.
///
/// Sits on the forward path: IPv4 datagrams which fit the effective egress MTU (and all
/// non-IPv4 frames) pass through unchanged; oversize datagrams are replaced by their
/// fragments. When path-MTU discovery is enabled the effective MTU for a destination is
/// the one learned from the network, fed in by the companion [`PmtudIngest`] through the
/// shared [`PmtuCache`].
#[derive(Debug)]
pub struct Fragmenter<A, C = SystemClock>
where
    A: PacketBufferAllocator,
    C: TickSource,
{
    mtu: u16,
    pmtud: bool,
    ids: FragmentIdSequence,
    cache: Arc<PmtuCache>,
    allocator: A,
    clock: C,
    sweep: Throttle,
    timeout_ticks: u64,
    counters: FragmenterCounters,
    alarm: Option<FragmentRateAlarm>,
}

/// What one input packet turned into.
enum Emit<Buf: PacketBufferMut> {
    One(Option<Packet<Buf>>),
    Burst(std::vec::IntoIter<Packet<Buf>>),
}

impl<Buf: PacketBufferMut> Iterator for Emit<Buf> {
    type Item = Packet<Buf>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Emit::One(slot) => slot.take(),
            Emit::Burst(iter) => iter.next(),
        }
    }
}

impl<A, C> Fragmenter<A, C>
where
    A: PacketBufferAllocator,
    C: TickSource + Clone,
{
    /// Build the fragmenter stage from its configuration.
    ///
    /// Returns the forward-path network function and, when path-MTU discovery is enabled,
    /// the return-path [`PmtudIngest`] sharing the same cache.
    ///
    /// # Errors
    ///
    /// Fails fast with a [`ConfigError`] if the configuration is invalid.
    pub fn new(
        config: &FragmenterConfig,
        allocator: A,
        clock: C,
    ) -> Result<(Self, Option<PmtudIngest<C>>), ConfigError> {
        config.validate()?;
        let cache = Arc::new(PmtuCache::new());
        let timeout_ticks =
            u64::from(config.pmtu_timeout).saturating_mul(clock.ticks_per_second());
        // the expiry sweep runs at a tenth of the entry lifetime
        let sweep = Throttle::from_seconds(u64::from(config.pmtu_timeout / 10).max(1), &clock);
        let ingest = config.pmtud.then(|| {
            PmtudIngest::new(
                &config.pmtu_local_addresses,
                Arc::clone(&cache),
                clock.clone(),
            )
        });
        Ok((
            Self {
                mtu: config.mtu,
                pmtud: config.pmtud,
                ids: FragmentIdSequence::new(),
                cache,
                allocator,
                clock,
                sweep,
                timeout_ticks,
                counters: FragmenterCounters::register(),
                alarm: config.use_alarms.then(FragmentRateAlarm::new),
            },
            ingest,
        ))
    }

    /// Start the fragment-ID sequence from the fixed seed, for reproducible tests.
    pub fn use_deterministic_ids(&mut self) {
        self.ids = FragmentIdSequence::deterministic();
    }

    /// The forward-path counters.
    #[must_use]
    pub fn counters(&self) -> &FragmenterCounters {
        &self.counters
    }

    /// The shared path-MTU cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<PmtuCache> {
        &self.cache
    }

    /// The fragment-rate alarm, when alarms are enabled.
    #[must_use]
    pub fn alarm(&self) -> Option<&FragmentRateAlarm> {
        self.alarm.as_ref()
    }
}

impl<A, C> Fragmenter<A, C>
where
    A: PacketBufferAllocator,
    C: TickSource,
{
    fn process_packet<Buf>(&mut self, mut packet: Packet<Buf>) -> Emit<Buf>
    where
        Buf: PacketBufferMut,
        A: PacketBufferAllocator<Buf = Buf>,
    {
        // ingress classification: anything that is not IPv4 passes through untouched
        let Some(eth) = packet.try_eth() else {
            packet.done(DoneReason::Unhandled);
            return Emit::One(Some(packet));
        };
        if eth.ether_type() != EthType::IPV4 {
            self.counters.out_frag_not.incr(1);
            return Emit::One(Some(packet));
        }
        let wire_len = usize::from(packet.total_len());
        let Some(ipv4) = packet.try_ipv4() else {
            // the ethertype said IPv4 but no valid header followed
            packet.done(DoneReason::Malformed);
            return Emit::One(Some(packet));
        };
        if usize::from(ipv4.total_len()) + usize::from(Eth::HEADER_LEN.get()) != wire_len {
            packet.done(DoneReason::Malformed);
            return Emit::One(Some(packet));
        }

        // resolve the effective egress MTU for this destination
        let destination = ipv4.destination();
        let effective_mtu = if self.pmtud {
            self.cache
                .lookup(destination)
                .map_or(self.mtu, |entry| entry.mtu)
        } else {
            self.mtu
        };
        packet.get_meta_mut().mtu = Some(effective_mtu);
        if wire_len <= usize::from(effective_mtu) + usize::from(Eth::HEADER_LEN.get()) {
            self.counters.out_frag_not.incr(1);
            return Emit::One(Some(packet));
        }

        self.fragment(packet, effective_mtu)
    }

    fn fragment<Buf>(&mut self, mut packet: Packet<Buf>, effective_mtu: u16) -> Emit<Buf>
    where
        Buf: PacketBufferMut,
        A: PacketBufferAllocator<Buf = Buf>,
    {
        let Some(ipv4) = packet.try_ipv4() else {
            packet.done(DoneReason::InternalFailure);
            return Emit::One(Some(packet));
        };
        if ipv4.dont_fragment() && !self.pmtud {
            // TODO: send an ICMP fragmentation-needed reply toward the source instead of
            // dropping silently.
            trace!(
                "dropping over-MTU packet toward {dst} with DF set",
                dst = ipv4.destination()
            );
            packet.done(DoneReason::FragmentationProhibited);
            return Emit::One(Some(packet));
        }
        // With discovery enabled the MTU we hold for this destination came from the
        // network itself, so fragmenting a DF-marked packet to that size is sound.

        let original_mf = ipv4.more_fragments();
        let header_len = ipv4.header_len();
        let header_size = usize::from(Eth::HEADER_LEN.get()) + header_len;
        let Some(max_payload) =
            (usize::from(effective_mtu) + usize::from(Eth::HEADER_LEN.get()))
                .checked_sub(header_size)
        else {
            packet.done(DoneReason::InternalFailure);
            return Emit::One(Some(packet));
        };
        let frag_id = self.ids.next_id();

        let eth_template = match packet.try_eth() {
            Some(eth) => eth.clone(),
            None => {
                packet.done(DoneReason::InternalFailure);
                return Emit::One(Some(packet));
            }
        };
        let ipv4_template = match packet.try_ipv4() {
            Some(ipv4) => ipv4.clone(),
            None => {
                packet.done(DoneReason::InternalFailure);
                return Emit::One(Some(packet));
            }
        };
        let Some(payload) = packet.ip_payload() else {
            packet.done(DoneReason::InternalFailure);
            return Emit::One(Some(packet));
        };

        let total_payload = payload.len();
        let mut fragments = Vec::with_capacity(total_payload / max_payload.max(1) + 1);
        let mut offset = 0_usize;
        let mut failed = false;
        while offset < total_payload {
            let remaining = total_payload - offset;
            let (payload_size, more_fragments) = if max_payload < remaining {
                // non-final fragments must carry a multiple of eight bytes
                (max_payload & !7, true)
            } else {
                (remaining, original_mf)
            };
            if payload_size == 0 {
                warn!("effective MTU {effective_mtu} cannot make progress; dropping");
                failed = true;
                break;
            }

            let mut header = ipv4_template.clone();
            header.set_identification(frag_id);
            header.set_more_fragments(more_fragments);
            #[allow(clippy::cast_possible_truncation)] // offset / 8 fits 13 bits
            header.set_fragment_offset(
                FragOffset::new((offset / 8) as u16).unwrap_or_else(|e| unreachable!("{e:?}")),
            );
            #[allow(clippy::cast_possible_truncation)] // bounded by the original total_len
            if header.set_payload_len(payload_size as u16).is_err() {
                failed = true;
                break;
            }
            header.update_checksum(&()).unwrap_or_else(|()| unreachable!());

            #[allow(clippy::cast_possible_truncation)] // bounded by the effective MTU
            let frag_len = (header_size + payload_size) as u16;
            let mut mbuf = match self.allocator.allocate(frag_len) {
                Ok(mbuf) => mbuf,
                Err(e) => {
                    warn!("fragment buffer allocation failed: {e:?}");
                    failed = true;
                    break;
                }
            };

            let mut headers = Headers::new(eth_template.clone());
            headers.net = Some(header);
            match headers.deparse(mbuf.as_mut()) {
                Ok(written) => debug_assert_eq!(usize::from(written.get()), header_size),
                Err(e) => unreachable!("fragment buffer sized for its headers: {e:?}"),
            }
            mbuf.as_mut()[header_size..].copy_from_slice(&payload[offset..offset + payload_size]);

            let fragment =
                Packet::new(mbuf).unwrap_or_else(|e| unreachable!("invalid fragment: {e:?}"));
            fragments.push(fragment);
            self.counters.out_frag.incr(1);
            offset += payload_size;
        }

        trace!(
            "cut {count} fragments of id {frag_id:#06x}",
            count = fragments.len()
        );
        packet.done(if failed {
            DoneReason::InternalFailure
        } else {
            DoneReason::Fragmented
        });
        drop(packet); // the input is consumed exactly once, after all fragments are cut
        Emit::Burst(fragments.into_iter())
    }
}

impl<Buf, A, C> NetworkFunction<Buf> for Fragmenter<A, C>
where
    Buf: PacketBufferMut,
    A: PacketBufferAllocator<Buf = Buf>,
    C: TickSource,
{
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        let now = self.clock.now_ticks();
        if self.pmtud && self.sweep.ready(now) {
            self.cache.sweep(now, self.timeout_ticks);
        }
        if let Some(alarm) = self.alarm.as_mut() {
            alarm.observe(&self.clock, self.counters.out_frag.get());
        }
        input
            .flat_map(move |packet| self.process_packet(packet))
            .filter_map(Packet::enforce)
    }
}
