use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::collab::{
    AddressResolver, BackboneTransport, Clock, Collaborators, LocalBackboneRouter, MeshTransport, NetworkData, Resource,
};
use super::tables::{MulticastListenersTable, NdProxyTable};
use crate::core::{BackboneRouterState, InterfaceIdentifier, ManagerConfig, Result};
use crate::protocol::{Code, DuaStatus, Message, MessageInfo, MlrStatus};

/// One-shot periodic timer driven by the owner of the manager
#[derive(Debug, Clone, Copy)]
pub struct ExpiryTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl ExpiryTimer {
    /// Creates a stopped timer
    pub fn new(interval: Duration) -> Self {
        ExpiryTimer {
            interval,
            deadline: None,
        }
    }

    /// Arms the timer one interval after `now`
    pub fn start(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Disarms the timer
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Returns whether the timer is armed
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the timer fires next
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Whether the registration resources are currently served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Disabled,
    Active,
}

impl From<BackboneRouterState> for Lifecycle {
    fn from(state: BackboneRouterState) -> Self {
        if state.is_active() {
            Lifecycle::Active
        } else {
            Lifecycle::Disabled
        }
    }
}

/// Reply forced onto the next matching DUA.req, for certification testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedDuaReply {
    /// Respond with this DUA status
    Status(DuaStatus),
    /// Respond with an empty ACK carrying this CoAP code
    CoapCode(Code),
}

impl ForcedDuaReply {
    /// Interprets a raw value: CoAP response codes first, then DUA statuses
    pub fn from_raw(value: u8) -> Option<Self> {
        if value >= Code::RESPONSE_MIN {
            Some(ForcedDuaReply::CoapCode(Code(value)))
        } else {
            DuaStatus::from_byte(value).map(ForcedDuaReply::Status)
        }
    }
}

/// Pending DUA override with its optional ML-IID filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DuaResponseOverride {
    pub(super) mesh_local_iid: Option<InterfaceIdentifier>,
    pub(super) reply: ForcedDuaReply,
}

/// Backbone Router manager
///
/// Serves MLR and DUA registrations while the node is an enabled Backbone
/// Router. Every entry point runs to completion; the owner serializes calls.
pub struct Manager {
    pub(super) config: ManagerConfig,
    pub(super) local: Box<dyn LocalBackboneRouter>,
    pub(super) network_data: Box<dyn NetworkData>,
    pub(super) resolver: Box<dyn AddressResolver>,
    pub(super) mesh: Box<dyn MeshTransport>,
    pub(super) backbone: Box<dyn BackboneTransport>,
    pub(super) clock: Box<dyn Clock>,
    pub(super) multicast_listeners: Box<dyn MulticastListenersTable>,
    pub(super) nd_proxy: Box<dyn NdProxyTable>,
    pub(super) mlr_response_override: Option<MlrStatus>,
    pub(super) dua_response_override: Option<DuaResponseOverride>,
    timer: ExpiryTimer,
    lifecycle: Lifecycle,
}

impl Manager {
    /// Creates a manager; nothing is served until the first role change
    pub fn new(config: ManagerConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        Ok(Manager {
            timer: ExpiryTimer::new(config.timer_interval),
            config,
            local: collaborators.local,
            network_data: collaborators.network_data,
            resolver: collaborators.resolver,
            mesh: collaborators.mesh,
            backbone: collaborators.backbone,
            clock: collaborators.clock,
            multicast_listeners: collaborators.multicast_listeners,
            nd_proxy: collaborators.nd_proxy,
            mlr_response_override: None,
            dua_response_override: None,
            lifecycle: Lifecycle::Disabled,
        })
    }

    /// Manager configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current Backbone Router role
    pub fn state(&self) -> BackboneRouterState {
        self.local.state()
    }

    /// Returns whether the registration resources are served
    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Proxied Domain Unicast Addresses
    pub fn nd_proxy_table(&self) -> &dyn NdProxyTable {
        self.nd_proxy.as_ref()
    }

    /// Registered multicast listeners
    pub fn multicast_listeners(&self) -> &dyn MulticastListenersTable {
        self.multicast_listeners.as_ref()
    }

    /// Next expiry sweep, if the timer is running
    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Reacts to a Backbone Router state change notification
    pub fn handle_state_changed(&mut self) {
        let state = self.local.state();

        match (self.lifecycle, Lifecycle::from(state)) {
            (Lifecycle::Disabled, Lifecycle::Active) => self.activate(),
            (Lifecycle::Active, Lifecycle::Disabled) => self.deactivate(),
            _ => debug!(role = state.label(), "role changed, resources unchanged"),
        }
    }

    fn activate(&mut self) {
        for resource in Resource::ALL {
            self.mesh.add_resource(resource);
        }
        if !self.timer.is_running() {
            self.timer.start(self.clock.now());
        }
        self.lifecycle = Lifecycle::Active;

        match self.backbone.start() {
            Ok(()) => info!("started backbone TMF agent"),
            Err(e) => error!(error = %e, "failed to start backbone TMF agent"),
        }
    }

    fn deactivate(&mut self) {
        for resource in Resource::ALL {
            self.mesh.remove_resource(resource);
        }
        self.timer.stop();
        self.multicast_listeners.clear();
        self.lifecycle = Lifecycle::Disabled;

        match self.backbone.stop() {
            Ok(()) => info!("stopped backbone TMF agent"),
            Err(e) => warn!(error = %e, "failed to stop backbone TMF agent"),
        }
    }

    /// Expiry sweep; reschedules itself at the fixed interval
    pub fn handle_timer(&mut self) {
        if !self.timer.is_running() {
            return;
        }

        let now = self.clock.now();
        self.multicast_listeners.expire(now);
        self.timer.start(now);
    }

    /// Dispatches an inbound mesh request by Uri-Path
    ///
    /// Returns `false` when no served resource matches.
    pub fn handle_request(&mut self, message: &Message, info: &MessageInfo) -> bool {
        if !self.is_active() {
            return false;
        }

        let resource = message.uri_path.as_deref().and_then(Resource::from_uri_path);
        match resource {
            Some(Resource::MulticastListenerRegistration) => self.handle_multicast_listener_registration(message, info),
            Some(Resource::DuaRegistration) => self.handle_dua_registration(message, info),
            None => return false,
        }
        true
    }

    /// Forces the status of the next MLR.rsp
    pub fn config_next_multicast_listener_registration_response(&mut self, status: MlrStatus) {
        self.mlr_response_override = Some(status);
    }

    /// Forces the reply to the next DUA.req from `mesh_local_iid`, or from anyone
    pub fn config_next_dua_registration_response(
        &mut self,
        mesh_local_iid: Option<InterfaceIdentifier>,
        reply: ForcedDuaReply,
    ) {
        self.dua_response_override = Some(DuaResponseOverride { mesh_local_iid, reply });
    }
}
