// SPDX-License-Identifier: Apache-2.0

//! Definition of [`Headers`] and related methods and types.

use crate::eth::{Eth, EthError};
use crate::icmp4::Icmp4;
use crate::ipv4::Ipv4;
use crate::parse::{
    DeParse, DeParseError, IllegalBufferLength, Parse, ParseError, ParsePayload, Reader, Writer,
};
use core::fmt::Debug;
use std::num::NonZero;

mod embedded;
pub use embedded::*;

/// The parsed headers of a packet.
///
/// Parsing starts at the Ethernet header and descends only as far as this
/// pipeline needs: into IPv4 for frames with the IPv4 ethertype, and into
/// ICMP (plus the quoted packet of an error message) for first-fragment
/// ICMP datagrams. Anything else is left to the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    pub eth: Eth,
    pub net: Option<Ipv4>,
    pub transport: Option<Icmp4>,
    pub embedded_ip: Option<EmbeddedHeaders>,
}

impl Headers {
    /// Create a new (otherwise empty) [`Headers`] from an [`Eth`] header.
    #[must_use]
    pub fn new(eth: Eth) -> Self {
        Self {
            eth,
            net: None,
            transport: None,
            embedded_ip: None,
        }
    }
}

/// Header variants which may appear below the Ethernet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Header {
    Ipv4(Ipv4),
    Icmp4(Icmp4),
    Embedded(EmbeddedHeaders),
}

impl Header {
    fn parse_payload(&self, cursor: &mut Reader) -> Option<Header> {
        match self {
            Header::Ipv4(ipv4) => ipv4.parse_payload(cursor).map(Header::from),
            Header::Icmp4(icmp4) => icmp4.parse_payload(cursor).map(Header::Embedded),
            Header::Embedded(_) => None, // the quote is terminal
        }
    }
}

impl Parse for Headers {
    type Error = EthError;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>> {
        let mut cursor =
            Reader::new(buf).map_err(|IllegalBufferLength(len)| ParseError::BufferTooLong(len))?;
        let (eth, _) = cursor.parse::<Eth>()?;
        let mut this = Headers::new(eth);
        let mut pending = this.eth.parse_payload(&mut cursor).map(Header::from);
        while let Some(header) = pending {
            pending = header.parse_payload(&mut cursor);
            match header {
                Header::Ipv4(ipv4) => {
                    this.net = Some(ipv4);
                }
                Header::Icmp4(icmp4) => {
                    this.transport = Some(icmp4);
                }
                Header::Embedded(embedded) => {
                    this.embedded_ip = Some(embedded);
                }
            }
        }
        #[allow(clippy::cast_possible_truncation)] // bounded on cursor creation
        let consumed = NonZero::new((cursor.inner.len() - usize::from(cursor.remaining)) as u16)
            .unwrap_or_else(|| unreachable!());
        Ok((this, consumed))
    }
}

impl DeParse for Headers {
    type Error = ();

    fn size(&self) -> NonZero<u16> {
        let mut size = self.eth.size().get();
        size += self.net.as_ref().map_or(0, |net| net.size().get());
        size += self
            .transport
            .as_ref()
            .map_or(0, |transport| transport.size().get());
        size += self
            .embedded_ip
            .as_ref()
            .map_or(0, |embedded| embedded.size().get());
        NonZero::new(size).unwrap_or_else(|| unreachable!())
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>> {
        let mut cursor = Writer::new(buf)
            .map_err(|IllegalBufferLength(len)| DeParseError::BufferTooLong(len))?;
        cursor.write(&self.eth)?;
        if let Some(ref net) = self.net {
            cursor.write(net)?;
        }
        if let Some(ref transport) = self.transport {
            cursor.write(transport)?;
        }
        if let Some(ref embedded) = self.embedded_ip {
            cursor.write(embedded)?;
        }
        #[allow(clippy::cast_possible_truncation)] // bounded on cursor creation
        Ok(
            NonZero::new((cursor.inner.len() - usize::from(cursor.remaining)) as u16)
                .unwrap_or_else(|| unreachable!()),
        )
    }
}

/// Trait for objects which may contain an [`Eth`] header.
pub trait TryEth {
    /// Get the ethernet header, if any.
    fn try_eth(&self) -> Option<&Eth>;
}

/// Trait for objects which may contain a (mutable) [`Eth`] header.
pub trait TryEthMut {
    /// Get a mutable reference to the ethernet header, if any.
    fn try_eth_mut(&mut self) -> Option<&mut Eth>;
}

/// Trait for objects which may contain an [`Ipv4`] header.
pub trait TryIpv4 {
    /// Get the IPv4 header, if any.
    fn try_ipv4(&self) -> Option<&Ipv4>;
}

/// Trait for objects which may contain a (mutable) [`Ipv4`] header.
pub trait TryIpv4Mut {
    /// Get a mutable reference to the IPv4 header, if any.
    fn try_ipv4_mut(&mut self) -> Option<&mut Ipv4>;
}

/// Trait for objects which may contain an [`Icmp4`] header.
pub trait TryIcmp4 {
    /// Get the `ICMPv4` header, if any.
    fn try_icmp4(&self) -> Option<&Icmp4>;
}

/// Trait for objects which may contain a (mutable) [`Icmp4`] header.
pub trait TryIcmp4Mut {
    /// Get a mutable reference to the `ICMPv4` header, if any.
    fn try_icmp4_mut(&mut self) -> Option<&mut Icmp4>;
}

impl TryEth for Headers {
    fn try_eth(&self) -> Option<&Eth> {
        Some(&self.eth)
    }
}

impl TryEthMut for Headers {
    fn try_eth_mut(&mut self) -> Option<&mut Eth> {
        Some(&mut self.eth)
    }
}

impl TryIpv4 for Headers {
    fn try_ipv4(&self) -> Option<&Ipv4> {
        self.net.as_ref()
    }
}

impl TryIpv4Mut for Headers {
    fn try_ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        self.net.as_mut()
    }
}

impl TryIcmp4 for Headers {
    fn try_icmp4(&self) -> Option<&Icmp4> {
        self.transport.as_ref()
    }
}

impl TryIcmp4Mut for Headers {
    fn try_icmp4_mut(&mut self) -> Option<&mut Icmp4> {
        self.transport.as_mut()
    }
}

impl TryEmbeddedIpv4 for Headers {
    fn try_embedded_ipv4(&self) -> Option<&Ipv4> {
        self.embedded_ip.as_ref().map(EmbeddedHeaders::quoted_ipv4)
    }
}

impl TryEmbeddedIpv4Mut for Headers {
    fn try_embedded_ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        self.embedded_ip
            .as_mut()
            .map(EmbeddedHeaders::quoted_ipv4_mut)
    }
}

/// Trait alias for the full set of (immutable) header accessors.
pub trait AbstractHeaders:
    Debug + TryEth + TryIpv4 + TryIcmp4 + TryEmbeddedIpv4 + DeParse
{
}
impl<T> AbstractHeaders for T where
    T: Debug + TryEth + TryIpv4 + TryIcmp4 + TryEmbeddedIpv4 + DeParse
{
}

/// Trait alias for the full set of mutable header accessors.
pub trait AbstractHeadersMut:
    AbstractHeaders + TryEthMut + TryIpv4Mut + TryIcmp4Mut + TryEmbeddedIpv4Mut
{
}
impl<T> AbstractHeadersMut for T where
    T: AbstractHeaders + TryEthMut + TryIpv4Mut + TryIcmp4Mut + TryEmbeddedIpv4Mut
{
}

/// Trait for objects which carry a set of parsed headers.
pub trait TryHeaders {
    /// Access the headers.
    fn headers(&self) -> &impl AbstractHeaders;
}

/// Trait for objects which carry a set of parsed (mutable) headers.
pub trait TryHeadersMut {
    /// Access the headers mutably.
    fn headers_mut(&mut self) -> &mut impl AbstractHeadersMut;
}

impl<T> TryEth for T
where
    T: TryHeaders,
{
    fn try_eth(&self) -> Option<&Eth> {
        self.headers().try_eth()
    }
}

impl<T> TryEthMut for T
where
    T: TryHeadersMut,
{
    fn try_eth_mut(&mut self) -> Option<&mut Eth> {
        self.headers_mut().try_eth_mut()
    }
}

impl<T> TryIpv4 for T
where
    T: TryHeaders,
{
    fn try_ipv4(&self) -> Option<&Ipv4> {
        self.headers().try_ipv4()
    }
}

impl<T> TryIpv4Mut for T
where
    T: TryHeadersMut,
{
    fn try_ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        self.headers_mut().try_ipv4_mut()
    }
}

impl<T> TryIcmp4 for T
where
    T: TryHeaders,
{
    fn try_icmp4(&self) -> Option<&Icmp4> {
        self.headers().try_icmp4()
    }
}

impl<T> TryIcmp4Mut for T
where
    T: TryHeadersMut,
{
    fn try_icmp4_mut(&mut self) -> Option<&mut Icmp4> {
        self.headers_mut().try_icmp4_mut()
    }
}

impl<T> TryEmbeddedIpv4 for T
where
    T: TryHeaders,
{
    fn try_embedded_ipv4(&self) -> Option<&Ipv4> {
        self.headers().try_embedded_ipv4()
    }
}

impl<T> TryEmbeddedIpv4Mut for T
where
    T: TryHeadersMut,
{
    fn try_embedded_ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        self.headers_mut().try_embedded_ipv4_mut()
    }
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::headers::{Headers, TryEth, TryIcmp4, TryIpv4};
    use crate::parse::{DeParse, Parse};
    use etherparse::icmpv4::DestUnreachableHeader;
    use etherparse::{
        EtherType, Ethernet2Header, Icmpv4Header, Icmpv4Type, IpNumber, Ipv4Header,
    };
    use pretty_assertions::assert_eq;

    fn eth_header(ether_type: EtherType) -> Ethernet2Header {
        Ethernet2Header {
            destination: [0x02, 0, 0, 0, 0, 2],
            source: [0x02, 0, 0, 0, 0, 1],
            ether_type,
        }
    }

    fn ipv4_header(payload_len: u16, protocol: IpNumber) -> Ipv4Header {
        let mut header = Ipv4Header::new(
            payload_len,
            64,
            protocol,
            [192, 0, 2, 1],
            [198, 51, 100, 1],
        )
        .unwrap();
        header.header_checksum = header.calc_header_checksum();
        header
    }

    #[test]
    fn parse_plain_ipv4_frame() {
        let mut buf = Vec::new();
        eth_header(EtherType::IPV4).write(&mut buf).unwrap();
        ipv4_header(100, IpNumber::UDP).write(&mut buf).unwrap();
        buf.extend_from_slice(&[0u8; 100]);

        let (headers, consumed) = Headers::parse(&buf).unwrap();
        assert!(headers.try_eth().is_some());
        assert!(headers.try_ipv4().is_some());
        assert!(headers.try_icmp4().is_none());
        assert_eq!(consumed.get(), 14 + 20);
    }

    #[test]
    fn parse_stops_at_unhandled_ethertype() {
        let mut buf = Vec::new();
        eth_header(EtherType::IPV6).write(&mut buf).unwrap();
        buf.extend_from_slice(&[0u8; 60]);

        let (headers, consumed) = Headers::parse(&buf).unwrap();
        assert!(headers.net.is_none());
        assert_eq!(consumed.get(), 14);
    }

    #[test]
    fn parse_descends_into_icmp_error_quote() {
        let mut quoted = ipv4_header(1400, IpNumber::UDP);
        quoted.header_checksum = quoted.calc_header_checksum();
        let mut icmp_body = Vec::new();
        quoted.write(&mut icmp_body).unwrap();
        icmp_body.extend_from_slice(&[0xAA; 8]);

        let icmp_type = Icmpv4Type::DestinationUnreachable(
            DestUnreachableHeader::FragmentationNeeded { next_hop_mtu: 1400 },
        );
        let icmp = Icmpv4Header {
            checksum: icmp_type.calc_checksum(&icmp_body),
            icmp_type,
        };

        let mut buf = Vec::new();
        eth_header(EtherType::IPV4).write(&mut buf).unwrap();
        #[allow(clippy::cast_possible_truncation)]
        let payload_len = (icmp.header_len() + icmp_body.len()) as u16;
        ipv4_header(payload_len, IpNumber::ICMP)
            .write(&mut buf)
            .unwrap();
        icmp.write(&mut buf).unwrap();
        buf.extend_from_slice(&icmp_body);

        let (headers, consumed) = Headers::parse(&buf).unwrap();
        assert!(headers.try_icmp4().is_some());
        let quote = headers.embedded_ip.as_ref().unwrap().quoted_ipv4();
        assert_eq!(quote.destination().octets(), [198, 51, 100, 1]);
        // eth + outer ipv4 + icmp + quoted ipv4 header
        assert_eq!(consumed.get(), 14 + 20 + 8 + 20);

        // the parsed headers write back to the same bytes
        let mut out = vec![0u8; usize::from(consumed.get())];
        let written = headers.deparse(&mut out).unwrap();
        assert_eq!(written, consumed);
        assert_eq!(&out[..], &buf[..usize::from(consumed.get())]);
    }

    #[test]
    fn non_first_fragment_payload_is_opaque() {
        let mut ipv4 = ipv4_header(64, IpNumber::ICMP);
        ipv4.fragment_offset = etherparse::IpFragOffset::try_new(8).unwrap();
        ipv4.header_checksum = ipv4.calc_header_checksum();

        let mut buf = Vec::new();
        eth_header(EtherType::IPV4).write(&mut buf).unwrap();
        ipv4.write(&mut buf).unwrap();
        buf.extend_from_slice(&[0u8; 64]);

        let (headers, consumed) = Headers::parse(&buf).unwrap();
        assert!(headers.try_ipv4().is_some());
        assert!(headers.try_icmp4().is_none());
        assert_eq!(consumed.get(), 14 + 20);
    }
}
