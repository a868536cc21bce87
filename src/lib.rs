//! Thread Backbone Router registration core
//!
//! Serves Multicast Listener Registration and Domain Unicast Address
//! registration for a Thread Backbone Router: validates requests from the
//! mesh, maintains the listener and ND proxy tables, notifies the backbone
//! link and expires stale listeners.

pub mod bbr;
pub mod core;
pub mod network;
pub mod protocol;
pub mod util;

// Re-export commonly used items
pub use crate::bbr::{Collaborators, Manager};
pub use crate::core::{Error, ManagerConfig, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
