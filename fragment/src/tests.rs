// SPDX-License-Identifier: Apache-2.0

//! End-to-end behavior of the fragmenter stage.

#![allow(clippy::unwrap_used, clippy::cast_possible_truncation)]

use crate::clock::TestClock;
use crate::{Fragmenter, FragmenterConfig, PmtudIngest};
use net::buffer::{TestBuffer, TestBufferAllocator};
use net::checksum::Checksum;
use net::headers::TryIpv4;
use net::packet::Packet;
use net::packet::test_utils::{
    addr_v4, build_test_ipv4_packet, build_test_ipv4_packet_from, build_test_ipv4_packet_padded,
    build_test_ipv4_packet_with_flags, build_test_non_ipv4_packet, build_test_ptb_packet,
    build_test_ptb_packet_bad_checksum,
};
use pipeline::NetworkFunction;
use pretty_assertions::assert_eq;

type TestFragmenter = Fragmenter<TestBufferAllocator, TestClock>;

fn forward_stage(mtu: u16) -> (TestFragmenter, TestClock) {
    let clock = TestClock::new();
    let config = FragmenterConfig::new(mtu);
    let (mut fragmenter, ingest) =
        Fragmenter::new(&config, TestBufferAllocator, clock.clone()).unwrap();
    assert!(ingest.is_none());
    fragmenter.use_deterministic_ids();
    (fragmenter, clock)
}

fn pmtud_stage(
    mtu: u16,
    local_addresses: &[&str],
) -> (TestFragmenter, PmtudIngest<TestClock>, TestClock) {
    let clock = TestClock::new();
    let mut config = FragmenterConfig::new(mtu);
    config.pmtud = true;
    config.pmtu_local_addresses = local_addresses.iter().map(|a| addr_v4(a)).collect();
    let (mut fragmenter, ingest) =
        Fragmenter::new(&config, TestBufferAllocator, clock.clone()).unwrap();
    fragmenter.use_deterministic_ids();
    (fragmenter, ingest.unwrap(), clock)
}

/// Every emitted fragment must be a self-consistent IPv4 frame.
fn assert_well_formed(fragment: &Packet<TestBuffer>) {
    let wire_len = usize::from(fragment.total_len());
    assert!(wire_len >= 14 + 20);
    let ipv4 = fragment.try_ipv4().unwrap();
    assert!(ipv4.header_len() >= 20);
    assert_eq!(usize::from(ipv4.total_len()), wire_len - 14);
    ipv4.validate_checksum(&()).unwrap();
}

#[test]
fn simple_split() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 1400);

    let fragments: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert_eq!(fragments.len(), 3);
    let expected = [(480_usize, 0_u16, true), (480, 60, true), (440, 120, false)];
    for (fragment, (payload, offset, more)) in fragments.iter().zip(expected) {
        assert_well_formed(fragment);
        let ipv4 = fragment.try_ipv4().unwrap();
        assert_eq!(fragment.ip_payload().unwrap().len(), payload);
        assert_eq!(ipv4.fragment_offset().value(), offset);
        assert_eq!(ipv4.more_fragments(), more);
        assert_eq!(ipv4.identification(), 0x4243);
    }
    assert_eq!(fragmenter.counters().out_frag.get(), 3);
    assert_eq!(fragmenter.counters().out_frag_not.get(), 0);
}

#[test]
fn fragment_payload_bytes_are_contiguous_slices() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 1400);
    let original: Vec<u8> = input.ip_payload().unwrap().to_vec();

    let fragments: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    let mut cursor = 0;
    for fragment in &fragments {
        let payload = fragment.ip_payload().unwrap();
        assert_eq!(payload, &original[cursor..cursor + payload.len()]);
        assert_eq!(
            usize::from(fragment.try_ipv4().unwrap().fragment_offset().value()) * 8,
            cursor
        );
        cursor += payload.len();
    }
    assert_eq!(cursor, original.len());
}

#[test]
fn minimum_mtu_split() {
    let (mut fragmenter, _clock) = forward_stage(68);
    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 200);

    let fragments: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    // (68 + 14) - 34 = 48 payload bytes per full fragment
    assert_eq!(fragments.len(), 5);
    let mut offsets = Vec::new();
    for (n, fragment) in fragments.iter().enumerate() {
        assert_well_formed(fragment);
        let payload = fragment.ip_payload().unwrap();
        assert!(payload.len() <= 48);
        let last = n == fragments.len() - 1;
        if !last {
            assert_eq!(payload.len() % 8, 0);
            assert!(fragment.try_ipv4().unwrap().more_fragments());
        } else {
            assert!(!fragment.try_ipv4().unwrap().more_fragments());
        }
        offsets.push(fragment.try_ipv4().unwrap().fragment_offset().value());
    }
    assert_eq!(offsets, vec![0, 6, 12, 18, 24]);
}

#[test]
fn fits_the_mtu_and_passes_through() {
    let (mut fragmenter, _clock) = forward_stage(1500);
    // a 1000-byte frame on the wire
    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 1000 - 34);

    let out: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].total_len(), 1000);
    assert_eq!(out[0].get_meta().mtu, Some(1500));
    assert_eq!(fragmenter.counters().out_frag_not.get(), 1);
    assert_eq!(fragmenter.counters().out_frag.get(), 0);
}

#[test]
fn dont_fragment_oversize_is_dropped_without_pmtud() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let input = build_test_ipv4_packet_with_flags(addr_v4("203.0.113.7"), 1000, true, false);

    let out: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert!(out.is_empty());
    assert_eq!(fragmenter.counters().out_frag.get(), 0);
    assert_eq!(fragmenter.counters().out_frag_not.get(), 0);
}

#[test]
fn dont_fragment_is_overridden_by_learned_path_mtu() {
    let (mut fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);
    let ptb = build_test_ptb_packet(
        addr_v4("10.0.0.1"),
        addr_v4("10.0.0.1"),
        addr_v4("203.0.113.7"),
        1400,
    );
    assert_eq!(ingest.process(std::iter::once(ptb)).count(), 0);

    let input = build_test_ipv4_packet_with_flags(addr_v4("203.0.113.7"), 1480, true, false);
    let fragments: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    // the learned MTU authorizes cutting a DF-marked datagram
    assert_eq!(fragments.len(), 2);
    for fragment in &fragments {
        assert_well_formed(fragment);
        assert!(fragment.try_ipv4().unwrap().dont_fragment());
    }
}

#[test]
fn more_fragments_bit_is_inherited_by_the_final_fragment() {
    let (mut fragmenter, _clock) = forward_stage(500);
    // refragmenting a middle fragment of some larger datagram: MF stays set on every piece
    let input = build_test_ipv4_packet_with_flags(addr_v4("203.0.113.7"), 960, false, true);

    let fragments: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert_eq!(fragments.len(), 2);
    assert!(fragments[0].try_ipv4().unwrap().more_fragments());
    assert!(fragments[1].try_ipv4().unwrap().more_fragments());
}

#[test]
fn non_ipv4_frames_pass_through() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let input = build_test_non_ipv4_packet(1800);

    let out: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert_eq!(out.len(), 1);
    assert_eq!(fragmenter.counters().out_frag_not.get(), 1);
}

#[test]
fn source_address_is_not_policed() {
    // classification is purely length-based: a datagram with a multicast source still
    // transits, and still fragments
    let (mut fragmenter, _clock) = forward_stage(500);
    let small = build_test_ipv4_packet_from(addr_v4("224.0.0.5"), addr_v4("203.0.113.7"), 100);
    let big = build_test_ipv4_packet_from(addr_v4("224.0.0.5"), addr_v4("203.0.113.7"), 1400);

    let out: Vec<_> = fragmenter.process(vec![small, big].into_iter()).collect();

    assert_eq!(out.len(), 4);
    assert_eq!(fragmenter.counters().out_frag_not.get(), 1);
    assert_eq!(fragmenter.counters().out_frag.get(), 3);
    for fragment in &out[1..] {
        assert_well_formed(fragment);
        assert_eq!(fragment.try_ipv4().unwrap().source(), addr_v4("224.0.0.5"));
    }
}

#[test]
fn length_mismatch_is_dropped_silently() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let input = build_test_ipv4_packet_padded(addr_v4("203.0.113.7"), 1000, 6);

    let out: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert!(out.is_empty());
    assert_eq!(fragmenter.counters().out_frag.get(), 0);
    assert_eq!(fragmenter.counters().out_frag_not.get(), 0);
}

#[test]
fn consecutive_datagrams_use_consecutive_identifications() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let inputs = vec![
        build_test_ipv4_packet(addr_v4("203.0.113.7"), 1400),
        build_test_ipv4_packet(addr_v4("203.0.113.8"), 1400),
    ];

    let fragments: Vec<_> = fragmenter.process(inputs.into_iter()).collect();

    assert_eq!(fragments.len(), 6);
    for fragment in &fragments[..3] {
        assert_eq!(fragment.try_ipv4().unwrap().identification(), 0x4243);
    }
    for fragment in &fragments[3..] {
        assert_eq!(fragment.try_ipv4().unwrap().identification(), 0x4244);
    }
}

#[test]
fn relative_order_is_preserved_across_inputs() {
    let (mut fragmenter, _clock) = forward_stage(500);
    let inputs = vec![
        build_test_ipv4_packet(addr_v4("203.0.113.7"), 1400),
        build_test_ipv4_packet(addr_v4("203.0.113.8"), 100),
    ];

    let out: Vec<_> = fragmenter.process(inputs.into_iter()).collect();

    assert_eq!(out.len(), 4);
    for fragment in &out[..3] {
        assert_eq!(
            fragment.try_ipv4().unwrap().destination(),
            addr_v4("203.0.113.7")
        );
    }
    assert_eq!(
        out[3].try_ipv4().unwrap().destination(),
        addr_v4("203.0.113.8")
    );
}

#[test]
fn learned_path_mtu_is_applied() {
    let (mut fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let ptb = build_test_ptb_packet(
        addr_v4("10.0.0.1"),
        addr_v4("10.0.0.1"),
        addr_v4("203.0.113.7"),
        1400,
    );
    let north: Vec<_> = ingest.process(std::iter::once(ptb)).collect();
    assert!(north.is_empty());
    assert_eq!(ingest.counters().ptb_received.get(), 1);
    assert_eq!(ingest.counters().ptb_valid.get(), 1);
    assert_eq!(ingest.cache().lookup(addr_v4("203.0.113.7")).unwrap().mtu, 1400);

    // a 1514-byte frame toward the clamped destination now gets cut to 1400
    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 1480);
    let fragments: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

    assert_eq!(fragments.len(), 2);
    for fragment in &fragments {
        assert_well_formed(fragment);
        assert!(usize::from(fragment.total_len()) <= 1400 + 14);
    }
    assert_eq!(fragments[0].ip_payload().unwrap().len(), 1376);
    assert_eq!(fragments[1].ip_payload().unwrap().len(), 104);

    // a destination with no cache entry still uses the configured MTU
    let other = build_test_ipv4_packet(addr_v4("198.51.100.50"), 1480);
    let out: Vec<_> = fragmenter.process(std::iter::once(other)).collect();
    assert_eq!(out.len(), 1);
}

#[test]
fn learned_entries_expire() {
    let (mut fragmenter, mut ingest, clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let ptb = build_test_ptb_packet(
        addr_v4("10.0.0.1"),
        addr_v4("10.0.0.1"),
        addr_v4("203.0.113.7"),
        1400,
    );
    assert_eq!(ingest.process(std::iter::once(ptb)).count(), 0);

    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 1480);
    assert_eq!(fragmenter.process(std::iter::once(input)).count(), 2);

    clock.advance_seconds(u64::from(crate::DEFAULT_PMTU_TIMEOUT_SECS) + 1);

    // the next pass sweeps the stale entry; the same datagram now fits the configured MTU
    let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), 1480);
    let out: Vec<_> = fragmenter.process(std::iter::once(input)).collect();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].total_len(), 1514);
    assert!(ingest.cache().is_empty());
}

#[test]
fn ptb_for_another_host_is_forwarded_untouched() {
    let (_fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let ptb = build_test_ptb_packet(
        addr_v4("10.9.9.9"),
        addr_v4("10.0.0.1"),
        addr_v4("203.0.113.7"),
        1400,
    );
    let north: Vec<_> = ingest.process(std::iter::once(ptb)).collect();

    assert_eq!(north.len(), 1);
    assert_eq!(north[0].total_len(), 14 + 20 + 8 + 28);
    assert_eq!(ingest.counters().ptb_received.get(), 1);
    assert_eq!(ingest.counters().ptb_valid.get(), 0);
    assert_eq!(ingest.counters().ptb_invalid.get(), 0);
    assert!(ingest.cache().is_empty());
}

#[test]
fn ptb_with_bad_checksum_is_consumed_and_counted() {
    let (_fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let ptb = build_test_ptb_packet_bad_checksum(
        addr_v4("10.0.0.1"),
        addr_v4("10.0.0.1"),
        addr_v4("203.0.113.7"),
        1400,
    );
    assert_eq!(ingest.process(std::iter::once(ptb)).count(), 0);

    assert_eq!(ingest.counters().ptb_received.get(), 1);
    assert_eq!(ingest.counters().ptb_invalid_csum.get(), 1);
    assert_eq!(ingest.counters().ptb_valid.get(), 0);
    assert!(ingest.cache().is_empty());
}

#[test]
fn ptb_quoting_a_foreign_source_is_invalid() {
    let (_fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let ptb = build_test_ptb_packet(
        addr_v4("10.0.0.1"),
        addr_v4("172.16.5.5"), // quoted flow does not originate from us
        addr_v4("203.0.113.7"),
        1400,
    );
    assert_eq!(ingest.process(std::iter::once(ptb)).count(), 0);

    assert_eq!(ingest.counters().ptb_invalid.get(), 1);
    assert_eq!(ingest.counters().ptb_valid.get(), 0);
    assert!(ingest.cache().is_empty());
}

#[test]
fn ptb_advertising_a_tiny_mtu_is_invalid() {
    let (_fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let ptb = build_test_ptb_packet(
        addr_v4("10.0.0.1"),
        addr_v4("10.0.0.1"),
        addr_v4("203.0.113.7"),
        60, // below the RFC 791 floor
    );
    assert_eq!(ingest.process(std::iter::once(ptb)).count(), 0);

    assert_eq!(ingest.counters().ptb_invalid.get(), 1);
    assert!(ingest.cache().is_empty());
}

#[test]
fn empty_local_address_list_accepts_any_destination() {
    let (_fragmenter, mut ingest, _clock) = pmtud_stage(1500, &[]);

    let ptb = build_test_ptb_packet(
        addr_v4("10.9.9.9"),
        addr_v4("172.16.5.5"),
        addr_v4("203.0.113.7"),
        1400,
    );
    assert_eq!(ingest.process(std::iter::once(ptb)).count(), 0);

    assert_eq!(ingest.counters().ptb_valid.get(), 1);
    assert_eq!(ingest.cache().lookup(addr_v4("203.0.113.7")).unwrap().mtu, 1400);
}

#[test]
fn non_ptb_return_traffic_flows_upstream() {
    let (_fragmenter, mut ingest, _clock) = pmtud_stage(1500, &["10.0.0.1"]);

    let packet = build_test_ipv4_packet(addr_v4("10.0.0.1"), 100);
    let north: Vec<_> = ingest.process(std::iter::once(packet)).collect();

    assert_eq!(north.len(), 1);
    assert_eq!(ingest.counters().ptb_received.get(), 0);
}

#[test]
fn alarms_can_be_disabled() {
    let clock = TestClock::new();
    let mut config = FragmenterConfig::new(1500);
    config.use_alarms = false;
    let (fragmenter, _) =
        Fragmenter::new(&config, TestBufferAllocator, clock).unwrap();
    assert!(fragmenter.alarm().is_none());
}

#[test]
fn invalid_config_fails_construction() {
    let clock = TestClock::new();
    let config = FragmenterConfig::new(60);
    assert!(Fragmenter::new(&config, TestBufferAllocator, clock).is_err());
}

#[test]
fn payload_is_conserved_for_arbitrary_sizes_and_mtus() {
    bolero::check!()
        .with_type()
        .for_each(|(payload_len, mtu): &(u16, u16)| {
            let payload_len = payload_len % 1797;
            let mtu = 68 + (mtu % 2433);
            let (mut fragmenter, _clock) = forward_stage(mtu);
            let input = build_test_ipv4_packet(addr_v4("203.0.113.7"), payload_len);

            let out: Vec<_> = fragmenter.process(std::iter::once(input)).collect();

            let total: usize = out
                .iter()
                .map(|p| p.ip_payload().map_or(0, <[u8]>::len))
                .sum();
            assert_eq!(total, usize::from(payload_len));

            if out.len() == 1 && fragmenter.counters().out_frag.get() == 0 {
                // passthrough
                assert_eq!(out[0].total_len(), 34 + payload_len);
                return;
            }
            let mut expected_offset = 0;
            for (n, fragment) in out.iter().enumerate() {
                assert_well_formed(fragment);
                let ipv4 = fragment.try_ipv4().unwrap();
                assert!(usize::from(fragment.total_len()) <= usize::from(mtu) + 14);
                assert_eq!(usize::from(ipv4.fragment_offset().value()) * 8, expected_offset);
                let last = n == out.len() - 1;
                if !last {
                    assert_eq!(fragment.ip_payload().unwrap().len() % 8, 0);
                }
                assert_eq!(ipv4.more_fragments(), !last);
                expected_offset += fragment.ip_payload().unwrap().len();
            }
        });
}
