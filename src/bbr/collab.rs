//! Collaborators the manager is wired to
//!
//! Everything outside the registration logic is reached through these traits
//! so the manager can run against the real stack or against test doubles.

use std::net::Ipv6Addr;
use std::time::Instant;

use crate::core::{BackboneRouterConfig, BackboneRouterState, Ipv6Prefix, Result};
use crate::protocol::{Message, MessageInfo};

/// Resources the manager serves on the mesh transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// `a/mr`
    MulticastListenerRegistration,
    /// `a/dr`
    DuaRegistration,
}

impl Resource {
    /// Both resources, in registration order
    pub const ALL: [Resource; 2] = [Resource::MulticastListenerRegistration, Resource::DuaRegistration];

    /// Uri-Path of the resource
    pub fn uri_path(self) -> &'static str {
        match self {
            Resource::MulticastListenerRegistration => crate::protocol::uri_path::MLR,
            Resource::DuaRegistration => crate::protocol::uri_path::DUA_REGISTRATION_REQUEST,
        }
    }

    /// Resolves a Uri-Path to a resource
    pub fn from_uri_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.uri_path() == path)
    }
}

/// TMF agent on the mesh interface
pub trait MeshTransport: Send {
    /// Starts serving a resource
    fn add_resource(&mut self, resource: Resource);

    /// Stops serving a resource
    fn remove_resource(&mut self, resource: Resource);

    /// Hands a message to the transport
    fn send(&mut self, message: Message, info: &MessageInfo) -> Result<()>;
}

/// TMF agent on the backbone interface
pub trait BackboneTransport: Send {
    /// Opens the backbone endpoint
    fn start(&mut self) -> Result<()>;

    /// Closes the backbone endpoint
    fn stop(&mut self) -> Result<()>;

    /// Hands a message to the backbone
    fn send(&mut self, message: Message, info: &MessageInfo) -> Result<()>;
}

/// Local Backbone Router role source
pub trait LocalBackboneRouter: Send {
    /// Current role
    fn state(&self) -> BackboneRouterState;

    /// Returns whether this node is the Primary
    fn is_primary(&self) -> bool {
        self.state() == BackboneRouterState::Primary
    }

    /// RLOC16 of this node
    fn rloc16(&self) -> u16;

    /// All-Network-BBRs multicast address on the backbone
    fn all_network_backbone_routers(&self) -> Ipv6Addr;
}

/// Leader network data and commissioning data
pub trait NetworkData: Send {
    /// Session id of the active commissioner, if any
    fn commissioner_session_id(&self) -> Option<u16>;

    /// Primary Backbone Router configuration, if published
    fn backbone_router_config(&self) -> Option<BackboneRouterConfig>;

    /// Configured Domain Prefix, if any
    fn domain_prefix(&self) -> Option<Ipv6Prefix>;

    /// Returns whether `address` is a Domain Unicast Address
    fn is_domain_unicast(&self, address: &Ipv6Addr) -> bool {
        self.domain_prefix()
            .map_or(false, |prefix| prefix.contains(address))
    }
}

/// EID-to-RLOC resolution within the mesh
pub trait AddressResolver: Send {
    /// Resolves from the cache only, without sending address queries
    fn resolve(&self, address: &Ipv6Addr) -> Option<u16>;
}

/// Monotonic time source
pub trait Clock: Send {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Everything the manager needs besides its own configuration
pub struct Collaborators {
    /// Role source
    pub local: Box<dyn LocalBackboneRouter>,
    /// Network data
    pub network_data: Box<dyn NetworkData>,
    /// Mesh address resolution
    pub resolver: Box<dyn AddressResolver>,
    /// Mesh TMF agent
    pub mesh: Box<dyn MeshTransport>,
    /// Backbone TMF agent
    pub backbone: Box<dyn BackboneTransport>,
    /// Time source
    pub clock: Box<dyn Clock>,
    /// Multicast listener registrations
    pub multicast_listeners: Box<dyn crate::bbr::tables::MulticastListenersTable>,
    /// DUA proxy registrations
    pub nd_proxy: Box<dyn crate::bbr::tables::NdProxyTable>,
}
