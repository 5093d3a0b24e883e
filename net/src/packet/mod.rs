// SPDX-License-Identifier: Apache-2.0

//! High-level packet structure

mod meta;
#[cfg(any(test, feature = "test_buffer"))]
pub mod test_utils;

use crate::buffer::PacketBufferMut;
use crate::eth::{Eth, EthError};
use crate::headers::{
    AbstractHeaders, AbstractHeadersMut, Headers, TryEth, TryHeaders, TryHeadersMut, TryIcmp4,
    TryIpv4,
};
use crate::parse::{DeParse, DeParseError, Parse, ParseError};
use std::cmp::Ordering;
use std::num::NonZero;
use tracing::error;

#[allow(unused_imports)] // re-export
pub use meta::*;

/// A parsed packet: its [`Headers`], the buffer they were parsed from, and the metadata
/// stages attach along the way.
#[derive(Debug)]
pub struct Packet<Buf: PacketBufferMut> {
    headers: Headers,
    /// The total number of bytes _originally_ consumed when parsing this packet.
    /// Mutations to the headers can cause the re-serialized size of the packet to grow or shrink.
    consumed: NonZero<u16>,
    mbuf: Option<Buf>,
    // packet metadata added by stages to drive other stages down the pipeline
    meta: PacketMeta,
}

/// Error returned when a buffer cannot be parsed as a packet.
#[derive(Debug, thiserror::Error)]
#[error("invalid packet")]
pub struct InvalidPacket<Buf: PacketBufferMut> {
    #[allow(unused)]
    mbuf: Buf,
    #[source]
    error: ParseError<EthError>,
}

impl<Buf: PacketBufferMut> Packet<Buf> {
    /// Create a new packet from a buffer
    ///
    /// # Errors
    ///
    /// If the supplied buffer fails to parse, this method will return an [`InvalidPacket`] error.
    pub fn new(mbuf: Buf) -> Result<Packet<Buf>, InvalidPacket<Buf>> {
        let (headers, consumed) = match Headers::parse(mbuf.as_ref()) {
            Ok((headers, consumed)) => (headers, consumed),
            Err(error) => {
                return Err(InvalidPacket { mbuf, error });
            }
        };
        Ok(Packet {
            headers,
            consumed,
            meta: PacketMeta::default(),
            mbuf: Some(mbuf),
        })
    }

    /// Take ownership of the memory buffer of a Packet
    pub fn take_buf(&mut self) -> Option<Buf> {
        self.mbuf.take()
    }

    /// Reserialize the packet into a buffer (consuming self).
    ///
    /// # Panics
    ///
    /// This method should never panic barring programmer error.
    #[allow(clippy::expect_used)]
    pub fn reserialize(mut self) -> Buf {
        // set the verdict to delivered, since this is terminal.
        self.done(DoneReason::Delivered);

        let needed = self.headers.size();
        let mut mbuf = self.take_buf().expect("Packet without buffer");
        let mut mbuf = match needed.cmp(&self.consumed) {
            Ordering::Equal => mbuf,
            Ordering::Less => {
                let trim = self.consumed.get() - needed.get();
                match mbuf.trim_from_start(trim) {
                    Ok(_) => {}
                    Err(e) => unreachable!("configuration error: {e:?}"),
                }
                mbuf
            }
            Ordering::Greater => {
                let prepend = needed.get() - self.consumed.get();
                match mbuf.prepend(prepend) {
                    Ok(_) => {}
                    Err(e) => unreachable!("configuration error: {e:?}"),
                }
                mbuf
            }
        };
        match self.headers.deparse(mbuf.as_mut()) {
            Ok(_) => mbuf,
            Err(DeParseError::Length(fatal)) => unreachable!("{fatal:?}"),
            Err(DeParseError::Invalid(())) => unreachable!("invalid write operation"),
            Err(DeParseError::BufferTooLong(len)) => {
                unreachable!("buffer too long: {len}")
            }
        }
    }

    /// Explicitly mark a packet as done, indicating the reason. Broadly, there are 2 types of
    /// reasons:
    ///  - The packet is to be dropped due to the indicated reason.
    ///  - The packet has been processed and is marked as done to prevent later stages from
    ///    processing it.
    pub fn done(&mut self, reason: DoneReason) {
        if self.meta.done.is_none() {
            self.meta.done = Some(reason);
        }
    }

    /// This behaves like method `done()` but overwrites the reason or verdict. This is useful
    /// when a stage is allowed, by design, to override the decisions taken by prior stages.
    pub fn done_force(&mut self, reason: DoneReason) {
        self.meta.done = Some(reason);
    }

    /// Remove the done marking for a packet
    pub fn done_clear(&mut self) {
        self.meta.done.take();
    }

    /// Tell if a packet has been marked as done.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.meta.done.is_some()
    }

    /// Get the reason why a packet has been marked as done.
    #[must_use]
    pub fn get_done(&self) -> Option<DoneReason> {
        self.meta.done
    }

    /// Wraps a packet in an `Option` depending on the metadata:
    /// If [`Packet`] is to be dropped, returns `None`. Else, `Some`.
    #[must_use]
    pub fn enforce(self) -> Option<Self> {
        match self.get_done() {
            Some(DoneReason::Delivered) | None => Some(self),
            Some(_) => None,
        }
    }

    /// Get a reference to the headers of this `Packet`
    #[must_use]
    pub fn get_headers(&self) -> &Headers {
        &self.headers
    }

    /// Get the consumed value of this `Packet`: the number of header bytes originally parsed.
    #[must_use]
    pub fn get_consumed(&self) -> NonZero<u16> {
        self.consumed
    }

    /// Get a reference to the buffer of this `Packet`
    #[must_use]
    pub fn get_buf(&self) -> &Option<Buf> {
        &self.mbuf
    }

    /// Get an immutable reference to the metadata of this `Packet`
    #[must_use]
    pub fn get_meta(&self) -> &PacketMeta {
        &self.meta
    }

    /// Get a mutable reference to the metadata of this `Packet`
    #[must_use]
    pub fn get_meta_mut(&mut self) -> &mut PacketMeta {
        &mut self.meta
    }

    /// The total length of the packet on the wire, in bytes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // buffer length checked at parse
    pub fn total_len(&self) -> u16 {
        self.mbuf.as_ref().map_or(0, |buf| buf.as_ref().len() as u16)
    }

    /// The IPv4 payload of this packet: the bytes between the L2+L3 headers and the end of
    /// the IP datagram (`14 + total_length`), regardless of how far parsing descended.
    ///
    /// Returns `None` if the packet is not IPv4 or the buffer does not hold the whole
    /// datagram.
    #[must_use]
    pub fn ip_payload(&self) -> Option<&[u8]> {
        let eth = self.headers.try_eth()?;
        let net = self.headers.try_ipv4()?;
        let start = usize::from(eth.size().get()) + net.header_len();
        let end = usize::from(Eth::HEADER_LEN.get()) + usize::from(net.total_len());
        let buf = self.mbuf.as_ref()?.as_ref();
        if start > end || end > buf.len() {
            return None;
        }
        Some(&buf[start..end])
    }

    /// The bytes following the ICMP header, up to the end of the IP datagram.
    ///
    /// This is the span the ICMP checksum is computed over (together with the ICMP header
    /// itself). Returns `None` if the packet is not a whole `ICMPv4`-over-IPv4 datagram.
    #[must_use]
    pub fn icmp4_payload(&self) -> Option<&[u8]> {
        let icmp = self.headers.try_icmp4()?;
        let payload = self.ip_payload()?;
        payload.get(usize::from(icmp.size().get())..)
    }
}

impl<Buf: PacketBufferMut> TryHeaders for Packet<Buf> {
    fn headers(&self) -> &impl AbstractHeaders {
        &self.headers
    }
}

impl<Buf: PacketBufferMut> TryHeadersMut for Packet<Buf> {
    fn headers_mut(&mut self) -> &mut impl AbstractHeadersMut {
        &mut self.headers
    }
}

impl<Buf: PacketBufferMut> Drop for Packet<Buf> {
    fn drop(&mut self) {
        if self.meta.done.is_none() {
            error!("Dropped packet without specifying reason");
            // This should be a panic!(). Leaving it as just a log
            // until related features adopt this, if adopted.
        }
    }
}
