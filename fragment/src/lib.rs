// SPDX-License-Identifier: Apache-2.0

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

//! IPv4 fragmentation with path-MTU discovery for the dataplane.
//!
//! This crate implements a pair of [`pipeline::NetworkFunction`]s forming one stage:
//!
//! - [`Fragmenter`] sits on the forward path. IPv4 datagrams that fit the effective
//!   egress MTU (and all non-IPv4 frames) pass through unchanged; oversize datagrams are
//!   replaced by RFC 791 fragments cut at 8-byte granularity, with fresh identifications
//!   and recomputed header checksums.
//! - [`PmtudIngest`] sits on the return path (present only when discovery is enabled).
//!   ICMP "fragmentation needed" messages addressed to us update the shared
//!   per-destination [`cache::PmtuCache`]; everything else flows through upstream.
//!
//! # Example
//!
//! ```
//! # use net::buffer::TestBufferAllocator;
//! # use net::packet::test_utils::{addr_v4, build_test_ipv4_packet};
//! # use pipeline::NetworkFunction;
//! use fragplane_fragment::clock::SystemClock;
//! use fragplane_fragment::{Fragmenter, FragmenterConfig};
//!
//! let config = FragmenterConfig::new(500);
//! let (mut fragmenter, _ingest) =
//!     Fragmenter::new(&config, TestBufferAllocator, SystemClock::new()).unwrap();
//!
//! let packets = vec![build_test_ipv4_packet(addr_v4("203.0.113.7"), 1400)].into_iter();
//! let fragments: Vec<_> = fragmenter.process(packets).collect();
//! assert_eq!(fragments.len(), 3);
//! ```
//!
//! # Limitations
//!
//! - IPv4 only; IPv6 path-MTU discovery is a different protocol and a different stage.
//! - Dropping an over-MTU datagram with DF set does not (yet) originate an ICMP
//!   "fragmentation needed" reply toward the sender.
//! - Reassembly is out of scope; fragments are cut, never joined.

pub mod alarm;
pub mod cache;
pub mod clock;
mod config;
pub mod counters;
mod frag_id;
mod fragmenter;
mod pmtud;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, DEFAULT_PMTU_TIMEOUT_SECS, FragmenterConfig, MIN_MTU};
pub use frag_id::FragmentIdSequence;
pub use fragmenter::Fragmenter;
pub use pmtud::PmtudIngest;
