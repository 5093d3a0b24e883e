// SPDX-License-Identifier: Apache-2.0

//! The return path: learn per-destination MTUs from ICMP "fragmentation needed" messages.

use crate::cache::PmtuCache;
use crate::clock::{SystemClock, TickSource};
use crate::config::MIN_MTU;
use crate::counters::PmtudCounters;
use hashbrown::HashSet;
use net::buffer::PacketBufferMut;
use net::checksum::Checksum;
use net::headers::{TryEmbeddedIpv4, TryIcmp4, TryIpv4};
use net::icmp4::Icmp4;
use net::packet::{DoneReason, Packet};
use pipeline::NetworkFunction;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace};

/// The PMTU-discovery ingest network function.
///
/// Sits on the return path. Inbound ICMP "fragmentation needed" (type 3, code 4)
/// messages addressed to us are validated and turned into entries of the shared
/// [`PmtuCache`], then consumed. Everything else - including messages for other hosts -
/// flows through to the upstream side unchanged.
#[derive(Debug)]
pub struct PmtudIngest<C = SystemClock>
where
    C: TickSource,
{
    cache: Arc<PmtuCache>,
    local_addrs: HashSet<Ipv4Addr>,
    clock: C,
    counters: PmtudCounters,
}

enum PtbVerdict {
    /// Not ours to act on; pass upstream.
    Forward,
    /// Acted on (or rejected); the message stops here.
    Consumed,
}

impl<C: TickSource> PmtudIngest<C> {
    pub(crate) fn new(local_addrs: &[Ipv4Addr], cache: Arc<PmtuCache>, clock: C) -> Self {
        Self {
            cache,
            local_addrs: local_addrs.iter().copied().collect(),
            clock,
            counters: PmtudCounters::register(),
        }
    }

    /// The return-path counters.
    #[must_use]
    pub fn counters(&self) -> &PmtudCounters {
        &self.counters
    }

    /// The shared path-MTU cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<PmtuCache> {
        &self.cache
    }

    fn process_ptb<Buf: PacketBufferMut>(&mut self, packet: &Packet<Buf>) -> PtbVerdict {
        // the "fragmentation needed" filter: ICMP type 3, code 4
        let Some(next_hop_mtu) = packet.try_icmp4().and_then(Icmp4::fragmentation_needed)
        else {
            return PtbVerdict::Forward;
        };
        self.counters.ptb_received.incr(1);

        let Some(outer) = packet.try_ipv4() else {
            return PtbVerdict::Forward;
        };
        if !self.local_addrs.is_empty() && !self.local_addrs.contains(&outer.destination()) {
            trace!(
                "fragmentation-needed for {dst} is not for us",
                dst = outer.destination()
            );
            return PtbVerdict::Forward;
        }

        let Some(body) = packet.icmp4_payload() else {
            self.counters.ptb_invalid.incr(1);
            return PtbVerdict::Consumed;
        };
        let checksum_ok = packet
            .try_icmp4()
            .is_some_and(|icmp| icmp.validate_checksum(body).is_ok());
        if !checksum_ok {
            debug!("fragmentation-needed message with bad ICMP checksum");
            self.counters.ptb_invalid_csum.incr(1);
            return PtbVerdict::Consumed;
        }

        // The quoted packet names the flow the router could not forward: its source must
        // be ours (when we know our addresses) and its destination is the path to clamp.
        let accepted = packet.try_embedded_ipv4().and_then(|quoted| {
            let quoted_src = quoted.source();
            if !self.local_addrs.is_empty() && !self.local_addrs.contains(&quoted_src) {
                return None;
            }
            if next_hop_mtu < MIN_MTU {
                // RFC 1191 forbids advertising below the 68-byte floor
                return None;
            }
            Some(quoted.destination())
        });
        match accepted {
            Some(path_dst) => {
                self.counters.ptb_valid.incr(1);
                self.cache
                    .upsert(path_dst, next_hop_mtu, self.clock.now_ticks());
            }
            None => {
                debug!("rejecting invalid fragmentation-needed message");
                self.counters.ptb_invalid.incr(1);
            }
        }
        PtbVerdict::Consumed
    }
}

impl<Buf, C> NetworkFunction<Buf> for PmtudIngest<C>
where
    Buf: PacketBufferMut,
    C: TickSource,
{
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        input.filter_map(move |mut packet| {
            match self.process_ptb(&packet) {
                PtbVerdict::Forward => {}
                PtbVerdict::Consumed => {
                    packet.done(DoneReason::PtbConsumed);
                }
            }
            packet.enforce()
        })
    }
}
