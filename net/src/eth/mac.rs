// SPDX-License-Identifier: Apache-2.0

//! Mac address type and logic.

use std::fmt::Display;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides a
/// small collection of methods and type safety.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Mac {
    /// The broadcast `Mac`
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    ///
    /// `ZERO` is illegal as a source or destination `Mac` in most contexts.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Returns `Ok(())` iff the [`Mac`] is a legal source `Mac`.
    ///
    /// # Errors
    ///
    /// Multicast and zero are not legal [`SourceMac`].
    pub fn valid_src(&self) -> Result<(), SourceMacAddressError> {
        if self.is_zero() {
            Err(SourceMacAddressError::ZeroSource(*self))
        } else if self.is_multicast() {
            Err(SourceMacAddressError::MulticastSource(*self))
        } else {
            Ok(())
        }
    }

    /// Returns `Ok(())` iff the [`Mac`] is a legal destination [`Mac`].
    ///
    /// # Errors
    ///
    /// Zero is not a legal destination [`Mac`].
    pub fn valid_dst(&self) -> Result<(), DestinationMacAddressError> {
        if self.is_zero() {
            Err(DestinationMacAddressError::ZeroDestination(*self))
        } else {
            Ok(())
        }
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<02x}:{:<02x}:{:<02x}:{:<02x}:{:<02x}:{:<02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// A [`Mac`] which is legal as a source in an ethernet header.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct SourceMac(Mac);

impl SourceMac {
    /// Map a [`Mac`] to a [`SourceMac`].
    ///
    /// # Errors
    ///
    /// Returns a [`SourceMacAddressError`] if the [`Mac`] is not a legal source.
    pub fn new(mac: Mac) -> Result<SourceMac, SourceMacAddressError> {
        mac.valid_src().map(|()| SourceMac(mac))
    }

    /// Get the inner (wrapped) [`Mac`]
    #[must_use]
    pub fn inner(&self) -> Mac {
        self.0
    }
}

impl Display for SourceMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner().fmt(f)
    }
}

/// A [`Mac`] which is legal as a destination in an ethernet header.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct DestinationMac(Mac);

impl DestinationMac {
    /// Map a [`Mac`] to a [`DestinationMac`].
    ///
    /// # Errors
    ///
    /// Returns a [`DestinationMacAddressError`] if the [`Mac`] is not a legal destination.
    pub fn new(mac: Mac) -> Result<DestinationMac, DestinationMacAddressError> {
        mac.valid_dst().map(|()| DestinationMac(mac))
    }

    /// Get the inner (wrapped) [`Mac`]
    #[must_use]
    pub fn inner(&self) -> Mac {
        self.0
    }
}

impl Display for DestinationMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner().fmt(f)
    }
}

/// Errors which can occur when qualifying a [`Mac`] as a [`SourceMac`]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SourceMacAddressError {
    /// Multicast macs are not legal source macs
    #[error("invalid source mac address: multicast macs are illegal as source macs (got {0})")]
    MulticastSource(Mac),
    /// Zero is not a legal source mac
    #[error("invalid source mac address: zero mac is illegal as source mac")]
    ZeroSource(Mac),
}

/// Errors which can occur when qualifying a [`Mac`] as a [`DestinationMac`]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DestinationMacAddressError {
    /// Zero is not a legal destination mac
    #[error("invalid destination mac address: zero mac is illegal as destination (got {0})")]
    ZeroDestination(Mac),
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::eth::mac::{DestinationMac, Mac, SourceMac};
    use bolero::{Driver, TypeGenerator};

    impl TypeGenerator for Mac {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            Some(Mac(driver.produce()?))
        }
    }

    impl TypeGenerator for SourceMac {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let mut raw: [u8; 6] = driver.produce()?;
            // clear the multicast bit and ensure the mac is non-zero
            raw[0] &= 0xFE;
            raw[5] |= 0x01;
            Some(SourceMac(Mac(raw)))
        }
    }

    impl TypeGenerator for DestinationMac {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let mut raw: [u8; 6] = driver.produce()?;
            raw[5] |= 0x01; // ensure the mac is non-zero
            Some(DestinationMac(Mac(raw)))
        }
    }
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::eth::mac::{Mac, SourceMac, SourceMacAddressError};

    #[test]
    fn generated_source_macs_are_valid() {
        bolero::check!().with_type().for_each(|mac: &SourceMac| {
            assert!(mac.inner().valid_src().is_ok());
        });
    }

    #[test]
    fn source_mac_rejects_multicast() {
        let mac = Mac([0x01, 0, 0x5E, 0, 0, 1]);
        assert_eq!(
            SourceMac::new(mac),
            Err(SourceMacAddressError::MulticastSource(mac))
        );
    }

    #[test]
    fn source_mac_rejects_zero() {
        assert_eq!(
            SourceMac::new(Mac::ZERO),
            Err(SourceMacAddressError::ZeroSource(Mac::ZERO))
        );
    }
}
