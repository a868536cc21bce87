//! Multicast Listener Registration (`a/mr`) and the backbone notification
//! (`b/bmr`) it triggers.

use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use super::manager::Manager;
use crate::core::{IPV6_ADDRESSES_NUM_MAX, IPV6_ADDRESSES_NUM_MIN};
use crate::protocol::policy;
use crate::protocol::tlv::{self, TlvType, IPV6_ADDRESS_SIZE};
use crate::protocol::{uri_path, Code, Message, MessageInfo, MlrStatus};

/// Fixed-capacity list of addresses from one request
#[derive(Debug, Clone, Copy)]
pub struct AddressList {
    addresses: [Ipv6Addr; IPV6_ADDRESSES_NUM_MAX],
    len: usize,
}

impl Default for AddressList {
    fn default() -> Self {
        AddressList {
            addresses: [Ipv6Addr::UNSPECIFIED; IPV6_ADDRESSES_NUM_MAX],
            len: 0,
        }
    }
}

impl AddressList {
    /// Appends an address; the batch limit is checked before processing starts
    pub fn push(&mut self, address: Ipv6Addr) {
        debug_assert!(self.len < IPV6_ADDRESSES_NUM_MAX);
        if let Some(slot) = self.addresses.get_mut(self.len) {
            *slot = address;
            self.len += 1;
        }
    }

    /// Addresses in insertion order
    pub fn as_slice(&self) -> &[Ipv6Addr] {
        &self.addresses[..self.len]
    }

    /// Number of addresses
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Aggregated result of registering a batch of listeners
#[derive(Debug, Clone, Copy)]
pub struct MlrOutcome {
    /// First failure status seen, `Success` if none
    pub status: MlrStatus,
    /// Rejected addresses in request order
    pub failed: AddressList,
    /// Admitted addresses in request order
    pub succeeded: AddressList,
}

impl Default for MlrOutcome {
    fn default() -> Self {
        MlrOutcome {
            status: MlrStatus::Success,
            failed: AddressList::default(),
            succeeded: AddressList::default(),
        }
    }
}

impl MlrOutcome {
    fn fail(&mut self, address: Ipv6Addr, status: MlrStatus) {
        if self.status == MlrStatus::Success {
            self.status = status;
        }
        self.failed.push(address);
    }
}

/// How a request that failed validation is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition<S> {
    /// Discard without a response
    Drop(&'static str),
    /// Answer with a status and no addresses
    Respond(S),
}

/// A request that passed validation
#[derive(Debug, Clone, Copy)]
struct MlrAdmission<'a> {
    addresses: &'a [u8],
    timeout: u32,
}

impl Manager {
    pub(super) fn handle_multicast_listener_registration(&mut self, message: &Message, info: &MessageInfo) {
        let admission = match self.validate_mlr(message) {
            Ok(admission) => admission,
            Err(Disposition::Drop(reason)) => {
                debug!(reason, peer = %info.peer_addr, "dropped MLR.req");
                return;
            }
            Err(Disposition::Respond(status)) => {
                self.send_mlr_response(message, info, status, &[]);
                return;
            }
        };

        let outcome = self.register_listeners(&admission);
        self.send_mlr_response(message, info, outcome.status, outcome.failed.as_slice());

        if !outcome.succeeded.is_empty() {
            self.send_backbone_mlr(outcome.succeeded.as_slice(), admission.timeout);
        }
    }

    fn validate_mlr<'a>(&mut self, message: &'a Message) -> Result<MlrAdmission<'a>, Disposition<MlrStatus>> {
        if !message.is_confirmable_post_request() {
            return Err(Disposition::Drop("not a confirmable POST"));
        }

        if let Some(status) = self.mlr_response_override.take() {
            info!(?status, "answering MLR.req with configured status");
            return Err(Disposition::Respond(status));
        }

        if !self.local.is_primary() {
            return Err(Disposition::Respond(MlrStatus::BbrNotPrimary));
        }

        let payload: &'a [u8] = &message.payload;

        let has_session_id = match tlv::find_u16(payload, TlvType::CommissionerSessionId) {
            Some(session_id) => {
                if self.network_data.commissioner_session_id() != Some(session_id) {
                    return Err(Disposition::Respond(MlrStatus::GeneralFailure));
                }
                true
            }
            None => false,
        };

        let requested_timeout = if has_session_id {
            tlv::find_u32(payload, TlvType::Timeout)
        } else {
            None
        };

        let addresses = tlv::find(payload, TlvType::Ipv6Addresses)
            .ok_or(Disposition::<MlrStatus>::Drop("missing IPv6 Addresses TLV"))?;
        if addresses.len() % IPV6_ADDRESS_SIZE != 0 || addresses.len() / IPV6_ADDRESS_SIZE > IPV6_ADDRESSES_NUM_MAX {
            return Err(Disposition::Respond(MlrStatus::GeneralFailure));
        }

        let timeout = match requested_timeout {
            None => self.default_mlr_timeout(),
            Some(requested) => {
                let normalized =
                    policy::normalize_mlr_timeout(requested, self.config.mlr_timeout_min, self.config.mlr_timeout_max)
                        .map_err(Disposition::Respond)?;
                if normalized.was_clamped() {
                    info!(
                        from = normalized.requested,
                        to = normalized.effective,
                        "MLR timeout normalized"
                    );
                }
                normalized.effective
            }
        };

        Ok(MlrAdmission { addresses, timeout })
    }

    fn default_mlr_timeout(&self) -> u32 {
        self.network_data
            .backbone_router_config()
            .map_or(self.config.default_mlr_timeout, |config| config.mlr_timeout)
    }

    fn register_listeners(&mut self, admission: &MlrAdmission<'_>) -> MlrOutcome {
        let timeout = admission.timeout;
        let expire_at = self.clock.now() + Duration::from_secs(u64::from(timeout));
        let listeners = &mut self.multicast_listeners;

        tlv::addresses(admission.addresses).fold(MlrOutcome::default(), |mut outcome, address| {
            if timeout == 0 {
                listeners.remove(&address);
                return outcome;
            }

            match listeners.add(address, expire_at) {
                Ok(()) => outcome.succeeded.push(address),
                Err(e) => {
                    debug!(%address, error = %e, "rejected multicast listener");
                    outcome.fail(address, policy::mlr_status_for(&e));
                }
            }
            outcome
        })
    }

    fn send_mlr_response(&mut self, request: &Message, info: &MessageInfo, status: MlrStatus, failed: &[Ipv6Addr]) {
        let mut payload = BytesMut::new();
        tlv::append_u8(&mut payload, TlvType::Status, status.to_byte());
        if !failed.is_empty() {
            tlv::append_addresses(&mut payload, failed);
        }

        let response = Message::response_to(request, Code::CHANGED).with_payload(payload);
        match self.mesh.send(response, info) {
            Ok(()) => info!(?status, failed = failed.len(), "sent MLR.rsp"),
            Err(e) => warn!(?status, error = %e, "failed to send MLR.rsp"),
        }
    }

    fn send_backbone_mlr(&mut self, addresses: &[Ipv6Addr], timeout: u32) {
        debug_assert!((IPV6_ADDRESSES_NUM_MIN..=IPV6_ADDRESSES_NUM_MAX).contains(&addresses.len()));

        let mut payload = BytesMut::new();
        tlv::append_addresses(&mut payload, addresses);
        tlv::append_u32(&mut payload, TlvType::Timeout, timeout);
        let notification = Message::non_confirmable_post(uri_path::BACKBONE_MLR).with_payload(payload);

        let info = MessageInfo {
            peer_addr: self.local.all_network_backbone_routers(),
            peer_port: self.config.backbone.port,
            hop_limit: self.config.backbone.hop_limit,
            is_host_interface: true,
        };

        match self.backbone.send(notification, &info) {
            Ok(()) => info!(count = addresses.len(), timeout, "sent BMLR.ntf"),
            Err(e) => warn!(error = %e, "failed to send BMLR.ntf"),
        }
    }
}
