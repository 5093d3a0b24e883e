// SPDX-License-Identifier: Apache-2.0

//! Headers of the original packet quoted inside an ICMP error message.

use crate::ipv4::{Ipv4, Ipv4Error};
use crate::parse::{DeParse, DeParseError, Parse, ParseError};
use std::num::NonZero;

// The quoted packet inside an ICMP error message. RFC 792 stipulates the error carries the
// original IP header plus at least 64 bits of its payload; the quote may be truncated beyond
// that. Only the quoted IPv4 header is of interest here; a quote too short to hold one fails
// to parse and the error message simply carries no usable quote.
/// The headers of the original datagram quoted inside an ICMP error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedHeaders {
    net: Ipv4,
}

impl EmbeddedHeaders {
    /// Get the quoted IPv4 header.
    #[must_use]
    pub fn quoted_ipv4(&self) -> &Ipv4 {
        &self.net
    }

    /// Get a mutable reference to the quoted IPv4 header.
    #[must_use]
    pub fn quoted_ipv4_mut(&mut self) -> &mut Ipv4 {
        &mut self.net
    }
}

impl From<Ipv4> for EmbeddedHeaders {
    fn from(net: Ipv4) -> Self {
        Self { net }
    }
}

impl Parse for EmbeddedHeaders {
    type Error = Ipv4Error;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>> {
        let (net, consumed) = Ipv4::parse(buf)?;
        Ok((Self { net }, consumed))
    }
}

impl DeParse for EmbeddedHeaders {
    type Error = ();

    fn size(&self) -> NonZero<u16> {
        self.net.size()
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>> {
        self.net.deparse(buf)
    }
}

/// Trait for types which may contain a quoted IPv4 header.
pub trait TryEmbeddedIpv4 {
    /// Get the quoted IPv4 header, if any.
    fn try_embedded_ipv4(&self) -> Option<&Ipv4>;
}

/// Trait for types which may contain a (mutable) quoted IPv4 header.
pub trait TryEmbeddedIpv4Mut {
    /// Get a mutable reference to the quoted IPv4 header, if any.
    fn try_embedded_ipv4_mut(&mut self) -> Option<&mut Ipv4>;
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::headers::EmbeddedHeaders;
    use crate::parse::{DeParse, Parse};
    use etherparse::{IpNumber, Ipv4Header};

    fn quoted_header_bytes() -> Vec<u8> {
        let mut header = Ipv4Header::new(
            1400, // payload length of the original datagram
            64,
            IpNumber::UDP,
            [192, 0, 2, 1],
            [203, 0, 113, 7],
        )
        .unwrap();
        header.header_checksum = header.calc_header_checksum();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn parse_quoted_header() {
        let mut buf = quoted_header_bytes();
        // the quote carries the first 8 bytes of the original payload
        buf.extend_from_slice(&[0xAA; 8]);

        let (embedded, consumed) = EmbeddedHeaders::parse(&buf).unwrap();
        assert_eq!(consumed.get(), 20);
        assert_eq!(
            embedded.quoted_ipv4().destination().octets(),
            [203, 0, 113, 7]
        );

        let mut out = vec![0u8; 20];
        let written = embedded.deparse(&mut out).unwrap();
        assert_eq!(written.get(), 20);
        assert_eq!(&out[..], &buf[..20]);
    }

    #[test]
    fn truncated_quote_fails_to_parse() {
        let buf = quoted_header_bytes();
        assert!(EmbeddedHeaders::parse(&buf[..12]).is_err());
    }
}
