// SPDX-License-Identifier: Apache-2.0

//! Ethertype newtype

use etherparse::EtherType;
use std::fmt::{Display, Formatter};

/// An [EtherType] wrapper.
///
/// [EtherType]: https://en.wikipedia.org/wiki/EtherType
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthType(pub(crate) EtherType);

impl EthType {
    /// The [`EthType`] for IPv4 (0x0800).
    pub const IPV4: EthType = EthType(EtherType::IPV4);

    /// Map a raw 16-bit value (host byte order) to an [`EthType`].
    #[must_use]
    pub const fn new(raw: u16) -> EthType {
        EthType(EtherType(raw))
    }

    /// Get the raw 16-bit value of this [`EthType`].
    #[must_use]
    pub const fn raw(&self) -> u16 {
        self.0.0
    }
}

impl From<u16> for EthType {
    fn from(raw: u16) -> Self {
        EthType::new(raw)
    }
}

impl From<EthType> for u16 {
    fn from(value: EthType) -> Self {
        value.raw()
    }
}

impl Display for EthType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.0.0)
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::eth::ethtype::EthType;
    use bolero::{Driver, TypeGenerator};

    impl TypeGenerator for EthType {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            Some(EthType::new(driver.produce()?))
        }
    }
}
