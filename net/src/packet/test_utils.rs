// SPDX-License-Identifier: Apache-2.0

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation
)]

//! Helpers to build well-formed frames for tests.

pub use crate::buffer::TestBuffer;
use crate::packet::Packet;
use etherparse::icmpv4::DestUnreachableHeader;
use etherparse::{EtherType, Ethernet2Header, Icmpv4Header, Icmpv4Type, IpNumber, Ipv4Header};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Build an Ipv4 address from a &str
#[must_use]
pub fn addr_v4(a: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(a).expect("Bad IPv4 address")
}

fn test_eth_header(ether_type: EtherType) -> Ethernet2Header {
    Ethernet2Header {
        destination: [0x02, 0, 0, 0, 0, 2],
        source: [0x02, 0, 0, 0, 0, 1],
        ether_type,
    }
}

/// Builds a UDP-over-IPv4 frame of exactly `14 + 20 + payload_len` bytes.
///
/// The payload is filled with a rolling byte pattern so that slicing errors show up in
/// content comparisons, not just in lengths.
#[must_use]
pub fn build_test_ipv4_packet(dst: Ipv4Addr, payload_len: u16) -> Packet<TestBuffer> {
    build_test_ipv4_packet_with_flags(dst, payload_len, false, false)
}

/// Builds a UDP-over-IPv4 frame with explicit DF / MF flag values.
#[must_use]
pub fn build_test_ipv4_packet_with_flags(
    dst: Ipv4Addr,
    payload_len: u16,
    dont_fragment: bool,
    more_fragments: bool,
) -> Packet<TestBuffer> {
    build_ipv4_frame(
        addr_v4("192.0.2.1"),
        dst,
        payload_len,
        dont_fragment,
        more_fragments,
    )
}

/// Builds a UDP-over-IPv4 frame with an explicit source address.
#[must_use]
pub fn build_test_ipv4_packet_from(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    payload_len: u16,
) -> Packet<TestBuffer> {
    build_ipv4_frame(src, dst, payload_len, false, false)
}

fn build_ipv4_frame(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    payload_len: u16,
    dont_fragment: bool,
    more_fragments: bool,
) -> Packet<TestBuffer> {
    let mut ipv4 = Ipv4Header::new(payload_len, 64, IpNumber::UDP, src.octets(), dst.octets())
        .unwrap();
    ipv4.identification = 0x7777;
    ipv4.dont_fragment = dont_fragment;
    ipv4.more_fragments = more_fragments;
    ipv4.header_checksum = ipv4.calc_header_checksum();

    let mut buf = Vec::new();
    test_eth_header(EtherType::IPV4).write(&mut buf).unwrap();
    ipv4.write(&mut buf).unwrap();
    for i in 0..payload_len {
        buf.push((i & 0xFF) as u8);
    }

    Packet::new(TestBuffer::from_raw_data(&buf)).unwrap()
}

/// Builds a UDP-over-IPv4 frame whose buffer carries `pad` extra bytes beyond the IP
/// datagram, as link-layer padding would.
#[must_use]
pub fn build_test_ipv4_packet_padded(dst: Ipv4Addr, payload_len: u16, pad: u16) -> Packet<TestBuffer> {
    let mut ipv4 = Ipv4Header::new(
        payload_len,
        64,
        IpNumber::UDP,
        [192, 0, 2, 1],
        dst.octets(),
    )
    .unwrap();
    ipv4.header_checksum = ipv4.calc_header_checksum();

    let mut buf = Vec::new();
    test_eth_header(EtherType::IPV4).write(&mut buf).unwrap();
    ipv4.write(&mut buf).unwrap();
    buf.extend_from_slice(&vec![0; usize::from(payload_len) + usize::from(pad)]);

    Packet::new(TestBuffer::from_raw_data(&buf)).unwrap()
}

/// Builds a frame with a non-IPv4 ethertype (ARP) and `len` opaque bytes after the
/// Ethernet header.
#[must_use]
pub fn build_test_non_ipv4_packet(len: u16) -> Packet<TestBuffer> {
    let mut buf = Vec::new();
    test_eth_header(EtherType::ARP).write(&mut buf).unwrap();
    buf.extend_from_slice(&vec![0x42; usize::from(len)]);
    Packet::new(TestBuffer::from_raw_data(&buf)).unwrap()
}

/// Builds an ICMP "fragmentation needed" (type 3, code 4) frame.
///
/// The quoted packet is a UDP datagram from `quoted_src` to `quoted_dst`; the quote
/// carries the quoted IPv4 header plus the first 8 payload bytes, per RFC 792.
#[must_use]
pub fn build_test_ptb_packet(
    outer_dst: Ipv4Addr,
    quoted_src: Ipv4Addr,
    quoted_dst: Ipv4Addr,
    next_hop_mtu: u16,
) -> Packet<TestBuffer> {
    build_ptb(outer_dst, quoted_src, quoted_dst, next_hop_mtu, false)
}

/// Builds an ICMP "fragmentation needed" frame whose ICMP checksum is corrupted.
#[must_use]
pub fn build_test_ptb_packet_bad_checksum(
    outer_dst: Ipv4Addr,
    quoted_src: Ipv4Addr,
    quoted_dst: Ipv4Addr,
    next_hop_mtu: u16,
) -> Packet<TestBuffer> {
    build_ptb(outer_dst, quoted_src, quoted_dst, next_hop_mtu, true)
}

fn build_ptb(
    outer_dst: Ipv4Addr,
    quoted_src: Ipv4Addr,
    quoted_dst: Ipv4Addr,
    next_hop_mtu: u16,
    corrupt_checksum: bool,
) -> Packet<TestBuffer> {
    let mut quoted = Ipv4Header::new(
        1400, // payload length of the original (too big) datagram
        64,
        IpNumber::UDP,
        quoted_src.octets(),
        quoted_dst.octets(),
    )
    .unwrap();
    quoted.header_checksum = quoted.calc_header_checksum();

    let mut icmp_body = Vec::new();
    quoted.write(&mut icmp_body).unwrap();
    icmp_body.extend_from_slice(&[0xAA; 8]); // first 64 bits of the original payload

    let icmp_type =
        Icmpv4Type::DestinationUnreachable(DestUnreachableHeader::FragmentationNeeded {
            next_hop_mtu,
        });
    let mut checksum = icmp_type.calc_checksum(&icmp_body);
    if corrupt_checksum {
        checksum = !checksum;
    }
    let icmp = Icmpv4Header {
        icmp_type,
        checksum,
    };

    let mut outer = Ipv4Header::new(
        (icmp.header_len() + icmp_body.len()) as u16,
        64,
        IpNumber::ICMP,
        [198, 51, 100, 99],
        outer_dst.octets(),
    )
    .unwrap();
    outer.header_checksum = outer.calc_header_checksum();

    let mut buf = Vec::new();
    test_eth_header(EtherType::IPV4).write(&mut buf).unwrap();
    outer.write(&mut buf).unwrap();
    icmp.write(&mut buf).unwrap();
    buf.extend_from_slice(&icmp_body);

    Packet::new(TestBuffer::from_raw_data(&buf)).unwrap()
}
