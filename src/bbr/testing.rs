//! Scripted collaborators for exercising the manager in unit tests

use std::collections::{HashMap, HashSet};
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::BytesMut;

use super::collab::{
    AddressResolver, BackboneTransport, Clock, Collaborators, LocalBackboneRouter, MeshTransport, NetworkData, Resource,
};
use super::manager::Manager;
use super::tables::{InMemoryListenersTable, InMemoryNdProxyTable, ListenerError, MulticastListenersTable};
use crate::core::{
    backbone_routers_multicast, BackboneRouterConfig, BackboneRouterState, Error, InterfaceIdentifier, Ipv6Prefix,
    ManagerConfig, Result,
};
use crate::protocol::tlv::{self, TlvType};
use crate::protocol::{uri_path, Message, MessageInfo};

pub const SESSION_ID: u16 = 0x1234;
pub const LOCAL_RLOC16: u16 = 0x0400;
pub const PEER_RLOC16: u16 = 0x2c00;
pub const MESH_LOCAL_PREFIX: &str = "fdde:ad00:beef::/64";
pub const DOMAIN_PREFIX: &str = "fd00:7d03:7d03:7d03::/64";
pub const DOMAIN_DUA: &str = "fd00:7d03:7d03:7d03:1:2:3:4";

/// Everything the fakes observe or are scripted with
#[derive(Debug)]
pub struct World {
    pub state: BackboneRouterState,
    pub commissioner_session_id: Option<u16>,
    pub bbr_config: Option<BackboneRouterConfig>,
    pub domain_prefix: Option<Ipv6Prefix>,
    pub resolved: HashMap<Ipv6Addr, u16>,
    pub resources: HashSet<Resource>,
    pub mesh_sent: Vec<(Message, MessageInfo)>,
    pub mesh_send_fails: bool,
    pub backbone_sent: Vec<(Message, MessageInfo)>,
    pub backbone_running: bool,
    pub backbone_starts: usize,
    pub backbone_start_fails: bool,
    pub rejected: HashMap<Ipv6Addr, ListenerError>,
    pub now: Instant,
}

pub type SharedWorld = Arc<Mutex<World>>;

fn lock(world: &SharedWorld) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct FakeLocal(SharedWorld);

impl LocalBackboneRouter for FakeLocal {
    fn state(&self) -> BackboneRouterState {
        lock(&self.0).state
    }

    fn rloc16(&self) -> u16 {
        LOCAL_RLOC16
    }

    fn all_network_backbone_routers(&self) -> Ipv6Addr {
        backbone_routers_multicast(&MESH_LOCAL_PREFIX.parse().unwrap())
    }
}

struct FakeNetworkData(SharedWorld);

impl NetworkData for FakeNetworkData {
    fn commissioner_session_id(&self) -> Option<u16> {
        lock(&self.0).commissioner_session_id
    }

    fn backbone_router_config(&self) -> Option<BackboneRouterConfig> {
        lock(&self.0).bbr_config
    }

    fn domain_prefix(&self) -> Option<Ipv6Prefix> {
        lock(&self.0).domain_prefix
    }
}

struct FakeResolver(SharedWorld);

impl AddressResolver for FakeResolver {
    fn resolve(&self, address: &Ipv6Addr) -> Option<u16> {
        lock(&self.0).resolved.get(address).copied()
    }
}

struct FakeMesh(SharedWorld);

impl MeshTransport for FakeMesh {
    fn add_resource(&mut self, resource: Resource) {
        lock(&self.0).resources.insert(resource);
    }

    fn remove_resource(&mut self, resource: Resource) {
        lock(&self.0).resources.remove(&resource);
    }

    fn send(&mut self, message: Message, info: &MessageInfo) -> Result<()> {
        let mut world = lock(&self.0);
        if world.mesh_send_fails {
            return Err(Error::no_bufs("no message buffers"));
        }
        world.mesh_sent.push((message, info.clone()));
        Ok(())
    }
}

struct FakeBackbone(SharedWorld);

impl BackboneTransport for FakeBackbone {
    fn start(&mut self) -> Result<()> {
        let mut world = lock(&self.0);
        if world.backbone_start_fails {
            return Err(Error::transport("backbone interface down"));
        }
        world.backbone_running = true;
        world.backbone_starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        lock(&self.0).backbone_running = false;
        Ok(())
    }

    fn send(&mut self, message: Message, info: &MessageInfo) -> Result<()> {
        lock(&self.0).backbone_sent.push((message, info.clone()));
        Ok(())
    }
}

struct FakeClock(SharedWorld);

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        lock(&self.0).now
    }
}

/// Real listener table that refuses addresses scripted in `World::rejected`
struct ScriptedListeners {
    inner: InMemoryListenersTable,
    world: SharedWorld,
}

impl MulticastListenersTable for ScriptedListeners {
    fn add(&mut self, address: Ipv6Addr, expire_at: Instant) -> std::result::Result<(), ListenerError> {
        if let Some(e) = lock(&self.world).rejected.get(&address) {
            return Err(e.clone());
        }
        self.inner.add(address, expire_at)
    }

    fn remove(&mut self, address: &Ipv6Addr) {
        self.inner.remove(address)
    }

    fn expire(&mut self, now: Instant) {
        self.inner.expire(now)
    }

    fn clear(&mut self) {
        self.inner.clear()
    }

    fn expiry(&self, address: &Ipv6Addr) -> Option<Instant> {
        self.inner.expiry(address)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// A manager wired to fakes sharing one `World`
pub struct Harness {
    pub manager: Manager,
    world: SharedWorld,
}

impl Harness {
    /// Builds a manager in `state` and delivers the initial role change
    pub fn new(state: BackboneRouterState) -> Self {
        let world = Self::world_for(state);
        let mut manager = Manager::new(ManagerConfig::default(), Self::collaborators(&world)).unwrap();
        manager.handle_state_changed();
        Harness { manager, world }
    }

    pub fn world_for(state: BackboneRouterState) -> SharedWorld {
        Arc::new(Mutex::new(World {
            state,
            commissioner_session_id: Some(SESSION_ID),
            bbr_config: Some(BackboneRouterConfig {
                server16: LOCAL_RLOC16,
                sequence_number: 1,
                reregistration_delay: 5,
                mlr_timeout: 3600,
            }),
            domain_prefix: Some(DOMAIN_PREFIX.parse().unwrap()),
            resolved: HashMap::new(),
            resources: HashSet::new(),
            mesh_sent: Vec::new(),
            mesh_send_fails: false,
            backbone_sent: Vec::new(),
            backbone_running: false,
            backbone_starts: 0,
            backbone_start_fails: false,
            rejected: HashMap::new(),
            now: Instant::now(),
        }))
    }

    pub fn collaborators(world: &SharedWorld) -> Collaborators {
        Collaborators {
            local: Box::new(FakeLocal(world.clone())),
            network_data: Box::new(FakeNetworkData(world.clone())),
            resolver: Box::new(FakeResolver(world.clone())),
            mesh: Box::new(FakeMesh(world.clone())),
            backbone: Box::new(FakeBackbone(world.clone())),
            clock: Box::new(FakeClock(world.clone())),
            multicast_listeners: Box::new(ScriptedListeners {
                inner: InMemoryListenersTable::default(),
                world: world.clone(),
            }),
            nd_proxy: Box::new(InMemoryNdProxyTable::default()),
        }
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        lock(&self.world)
    }

    /// Delivers a request from the default mesh peer
    pub fn request(&mut self, message: &Message) -> bool {
        self.request_from(message, &rloc_info(PEER_RLOC16))
    }

    pub fn request_from(&mut self, message: &Message, info: &MessageInfo) -> bool {
        self.manager.handle_request(message, info)
    }

    pub fn set_state(&mut self, state: BackboneRouterState) {
        self.world().state = state;
        self.manager.handle_state_changed();
    }

    pub fn advance(&mut self, by: Duration) {
        self.world().now += by;
    }

    pub fn take_mesh_sent(&mut self) -> Vec<(Message, MessageInfo)> {
        std::mem::take(&mut self.world().mesh_sent)
    }

    pub fn take_backbone_sent(&mut self) -> Vec<(Message, MessageInfo)> {
        std::mem::take(&mut self.world().backbone_sent)
    }
}

/// Message info for a request sourced from a mesh node's RLOC
pub fn rloc_info(rloc16: u16) -> MessageInfo {
    let prefix: Ipv6Prefix = MESH_LOCAL_PREFIX.parse().unwrap();
    let mut octets = [0u8; 16];
    octets[..8].copy_from_slice(&prefix.network_bytes());
    octets[8..].copy_from_slice(&InterfaceIdentifier::from_locator(rloc16).0);
    MessageInfo::new(Ipv6Addr::from(octets), 61631)
}

pub fn mlr_request(session_id: Option<u16>, timeout: Option<u32>, addresses: &[Ipv6Addr]) -> Message {
    let mut payload = BytesMut::new();
    if let Some(session_id) = session_id {
        tlv::append_u16(&mut payload, TlvType::CommissionerSessionId, session_id);
    }
    if let Some(timeout) = timeout {
        tlv::append_u32(&mut payload, TlvType::Timeout, timeout);
    }
    tlv::append_addresses(&mut payload, addresses);
    Message::confirmable_post(uri_path::MLR).with_payload(payload)
}

pub fn dua_request(
    target: Option<Ipv6Addr>,
    mesh_local_iid: Option<InterfaceIdentifier>,
    last_transaction_time: Option<u32>,
) -> Message {
    let mut payload = BytesMut::new();
    if let Some(target) = target {
        tlv::append(&mut payload, TlvType::Target, &target.octets());
    }
    if let Some(iid) = mesh_local_iid {
        tlv::append(&mut payload, TlvType::MeshLocalEid, &iid.0);
    }
    if let Some(ltt) = last_transaction_time {
        tlv::append_u32(&mut payload, TlvType::LastTransactionTime, ltt);
    }
    Message::confirmable_post(uri_path::DUA_REGISTRATION_REQUEST).with_payload(payload)
}

pub fn response_status(response: &Message) -> u8 {
    tlv::find_u8(&response.payload, TlvType::Status).unwrap()
}

pub fn response_addresses(response: &Message) -> Vec<Ipv6Addr> {
    tlv::find(&response.payload, TlvType::Ipv6Addresses)
        .map(|value| tlv::addresses(value).collect())
        .unwrap_or_default()
}
