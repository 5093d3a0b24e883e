// SPDX-License-Identifier: Apache-2.0

//! Per-packet metadata carried between pipeline stages.

/// The reason a packet was marked as done.
///
/// Broadly there are two kinds of reason: the packet is to be dropped, or the packet has been
/// fully processed and later stages must not touch it again.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum DoneReason {
    /// catch-all for internal issues
    InternalFailure,
    /// the frame is not well-formed (short, bad IHL, total-length mismatch)
    Malformed,
    /// DF was set on an over-MTU packet and nothing authorized fragmenting it
    FragmentationProhibited,
    /// the packet was an ICMP "fragmentation needed" message consumed by PMTU discovery
    PtbConsumed,
    /// the packet was replaced by the fragments cut from it
    Fragmented,
    /// there exists no support to handle this type of packet
    Unhandled,
    /// the packet buffer was delivered by the NF - e.g. for xmit
    Delivered,
}

/// Packet metadata added by stages to drive other stages down the pipeline.
#[derive(Debug, Default, Clone)]
pub struct PacketMeta {
    /// The egress MTU resolved for this packet (configured or learned), stamped by the MTU
    /// resolver and consumed by the fragment engine. Rides the packet as a sidecar; the
    /// buffer itself is never annotated.
    pub mtu: Option<u16>,
    /// If `Some`, the reason why a packet was marked as done, including delivery to the NF.
    pub done: Option<DoneReason>,
}
