// SPDX-License-Identifier: Apache-2.0

#![deny(unsafe_code, clippy::all, clippy::pedantic, clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::missing_errors_doc)]

//! Packet types for the fragmenter dataplane.
//!
//! This crate provides the wire-format building blocks the pipeline operates
//! on: Ethernet, IPv4 and `ICMPv4` header types backed by [`etherparse`]
//! encodings, the abstract [`buffer`] traits through which the host's packet
//! buffers and allocator are reached, and the high-level [`packet::Packet`]
//! structure which pairs parsed headers with the buffer they came from.

pub mod buffer;
pub mod checksum;
pub mod eth;
pub mod headers;
pub mod icmp4;
pub mod ipv4;
pub mod packet;
pub mod parse;
