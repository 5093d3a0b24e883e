// SPDX-License-Identifier: Apache-2.0

//! Fragmenter stage configuration.

use serde::Deserialize;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// The smallest egress MTU the stage will operate with.
///
/// RFC 791 obliges every host to accept a 68-byte datagram: a maximal 60-byte header plus
/// the minimum 8-byte fragment. Below that, fragmentation cannot make progress.
pub const MIN_MTU: u16 = 68;

/// Default lifetime of a learned path-MTU entry, per RFC 1981 §5.3 guidance.
pub const DEFAULT_PMTU_TIMEOUT_SECS: u32 = 600;

/// Configuration for the fragmenter stage.
///
/// Deserialization rejects unknown keys; semantic constraints are enforced by
/// [`FragmenterConfig::validate`], which runs at stage construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmenterConfig {
    /// Egress L3 MTU in bytes (excludes the 14-byte Ethernet framing).
    pub mtu: u16,
    /// Enable path-MTU discovery: learn per-destination MTUs from inbound ICMP
    /// "fragmentation needed" messages.
    #[serde(default)]
    pub pmtud: bool,
    /// Lifetime of a learned path-MTU entry, in seconds.
    #[serde(default = "default_pmtu_timeout")]
    pub pmtu_timeout: u32,
    /// Addresses considered ours when accepting "fragmentation needed" messages.
    /// An empty list accepts any destination.
    #[serde(default)]
    pub pmtu_local_addresses: Vec<Ipv4Addr>,
    /// Register the outgoing-fragments-per-second alarm.
    #[serde(default = "default_use_alarms")]
    pub use_alarms: bool,
}

fn default_pmtu_timeout() -> u32 {
    DEFAULT_PMTU_TIMEOUT_SECS
}

fn default_use_alarms() -> bool {
    true
}

/// Errors raised when a [`FragmenterConfig`] fails validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configured MTU is below [`MIN_MTU`].
    #[error("mtu {0} is below the minimum of {MIN_MTU}")]
    MtuTooSmall(u16),
    /// The PMTU timeout must be at least one second.
    #[error("pmtu_timeout must be at least 1 second")]
    ZeroPmtuTimeout,
    /// The same local address was listed twice.
    #[error("duplicate local address: {0}")]
    DuplicateLocalAddress(Ipv4Addr),
    /// Local addresses are host addresses; multicast cannot be one.
    #[error("local address {0} is not unicast")]
    MulticastLocalAddress(Ipv4Addr),
}

impl FragmenterConfig {
    /// A config with the given MTU and defaults everywhere else.
    #[must_use]
    pub fn new(mtu: u16) -> Self {
        Self {
            mtu,
            pmtud: false,
            pmtu_timeout: DEFAULT_PMTU_TIMEOUT_SECS,
            pmtu_local_addresses: Vec::new(),
            use_alarms: true,
        }
    }

    /// Check the semantic constraints of this configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mtu < MIN_MTU {
            return Err(ConfigError::MtuTooSmall(self.mtu));
        }
        if self.pmtu_timeout == 0 {
            return Err(ConfigError::ZeroPmtuTimeout);
        }
        let mut seen = HashSet::with_capacity(self.pmtu_local_addresses.len());
        for addr in &self.pmtu_local_addresses {
            if addr.is_multicast() {
                return Err(ConfigError::MulticastLocalAddress(*addr));
            }
            if !seen.insert(addr) {
                return Err(ConfigError::DuplicateLocalAddress(*addr));
            }
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::config::{ConfigError, DEFAULT_PMTU_TIMEOUT_SECS, FragmenterConfig};
    use std::net::Ipv4Addr;

    #[test]
    fn defaults_from_yaml() {
        let config: FragmenterConfig = serde_yaml_ng::from_str("mtu: 1500").unwrap();
        assert_eq!(config.mtu, 1500);
        assert!(!config.pmtud);
        assert_eq!(config.pmtu_timeout, DEFAULT_PMTU_TIMEOUT_SECS);
        assert!(config.pmtu_local_addresses.is_empty());
        assert!(config.use_alarms);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed = serde_yaml_ng::from_str::<FragmenterConfig>("mtu: 1500\nmtuu: 9000");
        assert!(parsed.is_err());
    }

    #[test]
    fn full_config_from_yaml() {
        let config: FragmenterConfig = serde_yaml_ng::from_str(
            r"
mtu: 1420
pmtud: true
pmtu_timeout: 60
pmtu_local_addresses:
  - 10.0.0.1
  - 10.0.0.2
use_alarms: false
",
        )
        .unwrap();
        assert!(config.pmtud);
        assert_eq!(config.pmtu_timeout, 60);
        assert_eq!(
            config.pmtu_local_addresses,
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
        assert!(!config.use_alarms);
        config.validate().unwrap();
    }

    #[test]
    fn undersized_mtu_is_rejected() {
        let config = FragmenterConfig::new(67);
        assert_eq!(config.validate(), Err(ConfigError::MtuTooSmall(67)));
        FragmenterConfig::new(68).validate().unwrap();
    }

    #[test]
    fn duplicate_local_addresses_are_rejected() {
        let mut config = FragmenterConfig::new(1500);
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        config.pmtu_local_addresses = vec![addr, addr];
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateLocalAddress(addr))
        );
    }

    #[test]
    fn multicast_local_addresses_are_rejected() {
        let mut config = FragmenterConfig::new(1500);
        let addr = Ipv4Addr::new(224, 0, 0, 1);
        config.pmtu_local_addresses = vec![addr];
        assert_eq!(
            config.validate(),
            Err(ConfigError::MulticastLocalAddress(addr))
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = FragmenterConfig::new(1500);
        config.pmtu_timeout = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPmtuTimeout));
    }
}
