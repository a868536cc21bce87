//! Core types, constants and errors shared by the Backbone Router core
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod serde;
pub mod types;

use std::time::Duration;

pub use self::error::{Error, Result};
pub use self::types::{
    backbone_routers_multicast,
    is_multicast_larger_than_realm_local,
    BackboneConfig,
    BackboneRouterConfig,
    BackboneRouterState,
    InterfaceIdentifier,
    Ipv6Prefix,
    ManagerConfig,
};

/// Maximum number of addresses in one IPv6 Addresses TLV
pub const IPV6_ADDRESSES_NUM_MAX: usize = 15;

/// Minimum number of addresses in a backbone notification
pub const IPV6_ADDRESSES_NUM_MIN: usize = 1;

/// UDP port of the backbone TMF agent
pub const BACKBONE_UDP_PORT: u16 = 61631;

/// Hop limit of backbone multicast notifications
pub const DEFAULT_BACKBONE_HOP_LIMIT: u8 = 1;

/// Minimum MLR timeout in seconds
pub const MLR_TIMEOUT_MIN: u32 = 300;

/// Maximum MLR timeout in seconds (keeps the expiry in milliseconds within i32)
pub const MLR_TIMEOUT_MAX: u32 = 0x7fff_ffff / 1000;

/// MLR timeout used when no BBR configuration is available
pub const DEFAULT_MLR_TIMEOUT: u32 = 3600;

/// Period of the multicast listener expiry sweep
pub const TIMER_INTERVAL: Duration = Duration::from_millis(1000);

/// Locators at or above this value are anycast locators
pub const ALOC16_MASK: u16 = 0xfc00;
