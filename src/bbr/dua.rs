//! Domain Unicast Address registration (`a/dr`)

use std::net::Ipv6Addr;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use super::manager::{ForcedDuaReply, Manager};
use crate::core::InterfaceIdentifier;
use crate::protocol::policy;
use crate::protocol::tlv::{self, TlvType};
use crate::protocol::{Code, DuaStatus, Message, MessageInfo};

/// What to send back for a DUA.req
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DuaReply {
    Status { target: Ipv6Addr, status: DuaStatus },
    EmptyAck(Code),
}

impl Manager {
    pub(super) fn handle_dua_registration(&mut self, message: &Message, info: &MessageInfo) {
        match self.process_dua(message, info) {
            Ok(reply) => self.send_dua_response(message, info, reply),
            Err(reason) => debug!(reason, peer = %info.peer_addr, "dropped DUA.req"),
        }
    }

    fn process_dua(&mut self, message: &Message, info: &MessageInfo) -> Result<DuaReply, &'static str> {
        let source = InterfaceIdentifier::of(&info.peer_addr);
        if !source.is_routing_locator() {
            return Err("source is not a routing locator");
        }

        if !message.is_confirmable_post_request() {
            return Err("not a confirmable POST");
        }

        let target = tlv::find_address(&message.payload, TlvType::Target).ok_or("missing Target TLV")?;
        let mesh_local_iid =
            tlv::find_iid(&message.payload, TlvType::MeshLocalEid).ok_or("missing ML-EID TLV")?;

        if let Some(reply) = self.take_dua_override(&mesh_local_iid) {
            info!(?reply, %target, "answering DUA.req with configured reply");
            return Ok(match reply {
                ForcedDuaReply::Status(status) => DuaReply::Status { target, status },
                ForcedDuaReply::CoapCode(code) => DuaReply::EmptyAck(code),
            });
        }

        let status = if !self.local.is_primary() {
            DuaStatus::NotPrimary
        } else if !self.network_data.is_domain_unicast(&target) {
            DuaStatus::Invalid
        } else {
            let last_transaction_time = tlv::find_u32(&message.payload, TlvType::LastTransactionTime);
            let result = self.nd_proxy.register(
                InterfaceIdentifier::of(&target),
                mesh_local_iid,
                source.locator(),
                last_transaction_time,
            );
            if let Err(e) = &result {
                debug!(%target, error = %e, "ND proxy registration failed");
            }
            policy::dua_status_for(&result)
        };

        info!(
            role = self.local.state().label(),
            %target,
            ?status,
            "DUA.req from {:04x}",
            source.locator()
        );

        Ok(DuaReply::Status { target, status })
    }

    fn take_dua_override(&mut self, mesh_local_iid: &InterfaceIdentifier) -> Option<ForcedDuaReply> {
        let matches = self.dua_response_override.as_ref().map_or(false, |pending| {
            pending
                .mesh_local_iid
                .map_or(true, |filter| filter.is_unspecified() || filter == *mesh_local_iid)
        });

        if matches {
            self.dua_response_override.take().map(|pending| pending.reply)
        } else {
            None
        }
    }

    fn send_dua_response(&mut self, request: &Message, info: &MessageInfo, reply: DuaReply) {
        let response = match reply {
            DuaReply::Status { target, status } => {
                let mut payload = BytesMut::new();
                tlv::append_u8(&mut payload, TlvType::Status, status.to_byte());
                tlv::append(&mut payload, TlvType::Target, &target.octets());
                Message::response_to(request, Code::CHANGED).with_payload(payload)
            }
            DuaReply::EmptyAck(code) => Message::empty_ack(request, code),
        };

        if let Err(e) = self.mesh.send(response, info) {
            warn!(?reply, error = %e, "failed to send DUA.rsp");
        }
    }
}
