use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Backbone Router role of the local node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackboneRouterState {
    /// Backbone Router functionality is off
    Disabled,
    /// Enabled, but another node is the Primary
    Secondary,
    /// This node is the Primary Backbone Router
    Primary,
}

impl BackboneRouterState {
    /// Returns whether registration resources should be active in this state
    pub fn is_active(self) -> bool {
        !matches!(self, BackboneRouterState::Disabled)
    }

    /// Short role label used in log lines
    pub fn label(self) -> &'static str {
        match self {
            BackboneRouterState::Disabled => "Disabled",
            BackboneRouterState::Secondary => "SBBR",
            BackboneRouterState::Primary => "PBBR",
        }
    }
}

/// IPv6 interface identifier (the low 64 bits of an address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct InterfaceIdentifier(pub [u8; 8]);

impl InterfaceIdentifier {
    /// Extracts the interface identifier of an address
    pub fn of(address: &Ipv6Addr) -> Self {
        let mut iid = [0u8; 8];
        iid.copy_from_slice(&address.octets()[8..]);
        InterfaceIdentifier(iid)
    }

    /// Builds the locator IID `0000:00ff:fe00:RRRR`
    pub fn from_locator(locator: u16) -> Self {
        let [hi, lo] = locator.to_be_bytes();
        InterfaceIdentifier([0, 0, 0, 0xff, 0xfe, 0, hi, lo])
    }

    /// Returns whether all bytes are zero
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0u8; 8]
    }

    /// Returns whether this IID has the `0000:00ff:fe00:xxxx` locator shape
    pub fn is_locator(&self) -> bool {
        self.0[..6] == [0, 0, 0, 0xff, 0xfe, 0]
    }

    /// Returns whether this is a routing locator (a locator that is not an ALOC)
    pub fn is_routing_locator(&self) -> bool {
        self.is_locator() && self.locator() < super::ALOC16_MASK
    }

    /// Returns the 16-bit locator carried in the last two bytes
    pub fn locator(&self) -> u16 {
        u16::from_be_bytes([self.0[6], self.0[7]])
    }
}

impl fmt::Display for InterfaceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// An IPv6 prefix such as a Domain Prefix or a mesh-local prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Prefix {
    address: Ipv6Addr,
    length: u8,
}

impl Ipv6Prefix {
    /// Creates a prefix, masking off host bits
    pub fn new(address: Ipv6Addr, length: u8) -> Result<Self> {
        if length > 128 {
            return Err(Error::config(format!("prefix length {} exceeds 128", length)));
        }
        let mask = if length == 0 { 0 } else { u128::MAX << (128 - u32::from(length)) };
        let masked = Ipv6Addr::from(u128::from(address) & mask);
        Ok(Ipv6Prefix { address: masked, length })
    }

    /// Prefix address with host bits cleared
    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    /// Prefix length in bits
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Returns whether `address` falls within this prefix
    pub fn contains(&self, address: &Ipv6Addr) -> bool {
        if self.length == 0 {
            return true;
        }
        let shift = 128 - u32::from(self.length);
        (u128::from(*address) >> shift) == (u128::from(self.address) >> shift)
    }

    /// The first 64 bits of the prefix
    pub fn network_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.address.octets()[..8]);
        bytes
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| Error::config(format!("missing prefix length in {:?}", s)))?;
        let address = addr
            .parse::<Ipv6Addr>()
            .map_err(|e| Error::config(format!("invalid prefix address {:?}: {}", addr, e)))?;
        let length = len
            .parse::<u8>()
            .map_err(|e| Error::config(format!("invalid prefix length {:?}: {}", len, e)))?;
        Ipv6Prefix::new(address, length)
    }
}

/// Returns whether `address` is multicast with a scope larger than realm-local
pub fn is_multicast_larger_than_realm_local(address: &Ipv6Addr) -> bool {
    let octets = address.octets();
    octets[0] == 0xff && (octets[1] & 0x0f) > 0x03
}

/// Derives the `ff32:40:<prefix>::3` Backbone Routers multicast address
///
/// With the mesh-local prefix this is the All-Network-BBRs address, with the
/// Domain Prefix the All-Domain-BBRs address.
pub fn backbone_routers_multicast(prefix: &Ipv6Prefix) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets[0] = 0xff;
    octets[1] = 0x32;
    octets[3] = 64;
    octets[4..12].copy_from_slice(&prefix.network_bytes());
    octets[15] = 3;
    Ipv6Addr::from(octets)
}

/// Primary Backbone Router configuration published in network data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackboneRouterConfig {
    /// RLOC16 of the Primary Backbone Router
    pub server16: u16,
    /// BBR sequence number
    pub sequence_number: u8,
    /// Reregistration delay in seconds
    pub reregistration_delay: u16,
    /// Default MLR timeout in seconds
    pub mlr_timeout: u32,
}

/// Backbone link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackboneConfig {
    /// UDP port of the backbone TMF agent
    pub port: u16,
    /// Hop limit for backbone multicast notifications
    pub hop_limit: u8,
    /// Backbone interface index, 0 lets the system choose
    pub interface_index: u32,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        BackboneConfig {
            port: super::BACKBONE_UDP_PORT,
            hop_limit: super::DEFAULT_BACKBONE_HOP_LIMIT,
            interface_index: 0,
        }
    }
}

/// Configuration for the Backbone Router manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Interval of the multicast listener expiry sweep
    #[serde(serialize_with = "super::serde::serialize_duration_ms")]
    #[serde(deserialize_with = "super::serde::deserialize_duration_ms")]
    pub timer_interval: Duration,
    /// MLR timeout in seconds used when network data carries no BBR config
    pub default_mlr_timeout: u32,
    /// Lower clamp for requested MLR timeouts, in seconds
    pub mlr_timeout_min: u32,
    /// Upper clamp for requested MLR timeouts, in seconds
    pub mlr_timeout_max: u32,
    /// Backbone link settings
    pub backbone: BackboneConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            timer_interval: super::TIMER_INTERVAL,
            default_mlr_timeout: super::DEFAULT_MLR_TIMEOUT,
            mlr_timeout_min: super::MLR_TIMEOUT_MIN,
            mlr_timeout_max: super::MLR_TIMEOUT_MAX,
            backbone: BackboneConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Parses and validates a TOML configuration document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ManagerConfig =
            toml::from_str(s).map_err(|e| Error::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges
    pub fn validate(&self) -> Result<()> {
        if self.timer_interval.is_zero() {
            return Err(Error::config("timer_interval must be non-zero"));
        }
        if self.mlr_timeout_min > self.mlr_timeout_max {
            return Err(Error::config(format!(
                "mlr_timeout_min {} exceeds mlr_timeout_max {}",
                self.mlr_timeout_min, self.mlr_timeout_max
            )));
        }
        if self.mlr_timeout_max == u32::MAX {
            return Err(Error::config("mlr_timeout_max is reserved for persistent registrations"));
        }
        Ok(())
    }
}
