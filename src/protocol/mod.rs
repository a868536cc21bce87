//! Protocol implementation module
//!
//! This module defines the TMF message model, the CoAP datagram codec, Thread
//! TLV encoding and the pure timeout/status policy of the registration
//! protocols.

pub mod codec;
pub mod message;
pub mod policy;
pub mod tlv;

pub use self::codec::MessageCodec;
pub use self::message::{uri_path, Code, DuaStatus, Message, MessageInfo, MessageType, MlrStatus};
pub use self::tlv::TlvType;
