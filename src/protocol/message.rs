use std::fmt;
use std::net::Ipv6Addr;

use bytes::{Bytes, BytesMut};
use rand::Rng;

/// Maximum token length allowed by CoAP
pub const MAX_TOKEN_LENGTH: usize = 8;

/// Token length used for locally originated requests
pub const DEFAULT_TOKEN_LENGTH: usize = 2;

/// CoAP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Confirmable, expects an acknowledgment
    Confirmable = 0,
    /// Non-confirmable, fire-and-forget
    NonConfirmable = 1,
    /// Acknowledgment of a confirmable message
    Acknowledgment = 2,
    /// Reset
    Reset = 3,
}

impl MessageType {
    /// Decodes the two-bit type field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgment,
            _ => MessageType::Reset,
        }
    }
}

/// CoAP code in `class.detail` form packed into one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(pub u8);

impl Code {
    /// Empty message
    pub const EMPTY: Code = Code(0x00);
    /// GET request
    pub const GET: Code = Code(0x01);
    /// POST request
    pub const POST: Code = Code(0x02);
    /// 2.04 Changed
    pub const CHANGED: Code = Code(0x44);
    /// 4.00 Bad Request
    pub const BAD_REQUEST: Code = Code(0x80);
    /// 4.04 Not Found
    pub const NOT_FOUND: Code = Code(0x84);
    /// Smallest response code (2.00)
    pub const RESPONSE_MIN: u8 = 0x40;

    /// Response class, the top three bits
    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    /// Detail, the low five bits
    pub fn detail(self) -> u8 {
        self.0 & 0x1f
    }

    /// Returns whether this is a request method code
    pub fn is_request(self) -> bool {
        self.class() == 0 && self.0 != 0
    }

    /// Returns whether this is a response code
    pub fn is_response(self) -> bool {
        self.0 >= Self::RESPONSE_MIN
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

/// Resource paths served or targeted by the Backbone Router
pub mod uri_path {
    /// Multicast Listener Registration
    pub const MLR: &str = "a/mr";
    /// DUA registration request
    pub const DUA_REGISTRATION_REQUEST: &str = "a/dr";
    /// Backbone Multicast Listener Registration notification
    pub const BACKBONE_MLR: &str = "b/bmr";
}

/// A TMF message: CoAP header fields plus a TLV payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type
    pub kind: MessageType,
    /// Method or response code
    pub code: Code,
    /// Message id used for deduplication and acknowledgment matching
    pub message_id: u16,
    /// Request/response matching token
    pub token: Bytes,
    /// Uri-Path segments joined with `/`
    pub uri_path: Option<String>,
    /// TLV payload
    pub payload: Bytes,
}

impl Message {
    /// Creates a request with a random message id and token
    pub fn new_request(kind: MessageType, code: Code, uri_path: &str) -> Self {
        let mut rng = rand::thread_rng();
        let mut token = [0u8; DEFAULT_TOKEN_LENGTH];
        rng.fill(&mut token);

        Message {
            kind,
            code,
            message_id: rng.gen(),
            token: Bytes::copy_from_slice(&token),
            uri_path: Some(uri_path.to_string()),
            payload: Bytes::new(),
        }
    }

    /// Creates a confirmable POST request
    pub fn confirmable_post(uri_path: &str) -> Self {
        Self::new_request(MessageType::Confirmable, Code::POST, uri_path)
    }

    /// Creates a non-confirmable POST request
    pub fn non_confirmable_post(uri_path: &str) -> Self {
        Self::new_request(MessageType::NonConfirmable, Code::POST, uri_path)
    }

    /// Creates a response with the default response header for `request`
    ///
    /// A confirmable request gets a piggybacked acknowledgment, anything else
    /// a non-confirmable response. Message id and token are echoed.
    pub fn response_to(request: &Message, code: Code) -> Self {
        let kind = if request.kind == MessageType::Confirmable {
            MessageType::Acknowledgment
        } else {
            MessageType::NonConfirmable
        };

        Message {
            kind,
            code,
            message_id: request.message_id,
            token: request.token.clone(),
            uri_path: None,
            payload: Bytes::new(),
        }
    }

    /// Creates an empty acknowledgment carrying only a response code
    pub fn empty_ack(request: &Message, code: Code) -> Self {
        Message {
            kind: MessageType::Acknowledgment,
            code,
            message_id: request.message_id,
            token: request.token.clone(),
            uri_path: None,
            payload: Bytes::new(),
        }
    }

    /// Replaces the payload
    pub fn with_payload(mut self, payload: BytesMut) -> Self {
        self.payload = payload.freeze();
        self
    }

    /// Returns whether this is a confirmable POST request
    pub fn is_confirmable_post_request(&self) -> bool {
        self.kind == MessageType::Confirmable && self.code == Code::POST
    }
}

/// Addressing metadata for a message on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Remote address
    pub peer_addr: Ipv6Addr,
    /// Remote UDP port
    pub peer_port: u16,
    /// Hop limit, 0 uses the socket default
    pub hop_limit: u8,
    /// Send via the host (backbone) interface instead of the mesh
    pub is_host_interface: bool,
}

impl MessageInfo {
    /// Creates message info for a peer with default hop limit on the mesh
    pub fn new(peer_addr: Ipv6Addr, peer_port: u16) -> Self {
        MessageInfo {
            peer_addr,
            peer_port,
            hop_limit: 0,
            is_host_interface: false,
        }
    }
}

/// Status values carried in MLR.rsp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MlrStatus {
    /// All addresses registered
    Success = 0,
    /// At least one address was not a valid multicast address
    Invalid = 2,
    /// Persistent registration is not supported
    NoPersistent = 3,
    /// Listener table is full
    NoResources = 4,
    /// This node is not the Primary Backbone Router
    BbrNotPrimary = 5,
    /// Any other failure
    GeneralFailure = 6,
}

impl MlrStatus {
    /// Wire value
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Decodes a wire value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(MlrStatus::Success),
            2 => Some(MlrStatus::Invalid),
            3 => Some(MlrStatus::NoPersistent),
            4 => Some(MlrStatus::NoResources),
            5 => Some(MlrStatus::BbrNotPrimary),
            6 => Some(MlrStatus::GeneralFailure),
            _ => None,
        }
    }
}

/// Status values carried in DUA.rsp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DuaStatus {
    /// Registered
    Success = 0,
    /// Registration must be repeated
    ReRegister = 1,
    /// Target is not a Domain Unicast Address
    Invalid = 2,
    /// Target is already registered by another device
    Duplicate = 3,
    /// Proxy table is full
    NoResources = 4,
    /// This node is not the Primary Backbone Router
    NotPrimary = 5,
    /// Any other failure
    GeneralFailure = 6,
}

impl DuaStatus {
    /// Wire value
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Decodes a wire value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(DuaStatus::Success),
            1 => Some(DuaStatus::ReRegister),
            2 => Some(DuaStatus::Invalid),
            3 => Some(DuaStatus::Duplicate),
            4 => Some(DuaStatus::NoResources),
            5 => Some(DuaStatus::NotPrimary),
            6 => Some(DuaStatus::GeneralFailure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let request = Message::confirmable_post(uri_path::MLR);
        assert!(request.is_confirmable_post_request());
        assert_eq!(request.token.len(), DEFAULT_TOKEN_LENGTH);
        assert_eq!(request.uri_path.as_deref(), Some("a/mr"));

        let ntf = Message::non_confirmable_post(uri_path::BACKBONE_MLR);
        assert!(!ntf.is_confirmable_post_request());
        assert_eq!(ntf.kind, MessageType::NonConfirmable);
    }

    #[test]
    fn test_default_response_header() {
        let request = Message::confirmable_post(uri_path::DUA_REGISTRATION_REQUEST);
        let response = Message::response_to(&request, Code::CHANGED);

        assert_eq!(response.kind, MessageType::Acknowledgment);
        assert_eq!(response.message_id, request.message_id);
        assert_eq!(response.token, request.token);
        assert_eq!(response.uri_path, None);
        assert_eq!(response.code.to_string(), "2.04");
    }

    #[test]
    fn test_code_classes() {
        assert!(Code::POST.is_request());
        assert!(!Code::EMPTY.is_request());
        assert!(Code::CHANGED.is_response());
        assert!(Code::NOT_FOUND.is_response());
        assert_eq!(Code::NOT_FOUND.to_string(), "4.04");
    }

    #[test]
    fn test_status_bytes() {
        assert_eq!(MlrStatus::NoPersistent.to_byte(), 3);
        assert_eq!(MlrStatus::from_byte(5), Some(MlrStatus::BbrNotPrimary));
        // 1 is unassigned for MLR
        assert_eq!(MlrStatus::from_byte(1), None);
        assert_eq!(DuaStatus::from_byte(3), Some(DuaStatus::Duplicate));
        assert_eq!(DuaStatus::NotPrimary.to_byte(), 5);
        assert_eq!(DuaStatus::from_byte(7), None);
    }
}
