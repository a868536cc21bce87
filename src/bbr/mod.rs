//! Backbone Router registration core
//!
//! The [`Manager`] serves Multicast Listener Registration and DUA registration
//! requests on the mesh while the node is a Backbone Router, notifies the
//! backbone of accepted listeners and expires them over time.

mod collab;
mod dua;
mod forward;
mod manager;
mod mlr;
pub mod tables;

#[cfg(test)]
pub(crate) mod testing;

pub use self::collab::{
    AddressResolver, BackboneTransport, Clock, Collaborators, LocalBackboneRouter, MeshTransport, NetworkData, Resource,
    SystemClock,
};
pub use self::manager::{ExpiryTimer, ForcedDuaReply, Manager};
pub use self::mlr::{AddressList, MlrOutcome};
pub use self::tables::{
    InMemoryListenersTable, InMemoryNdProxyTable, ListenerError, MulticastListenersTable, NdProxyEntry, NdProxyError,
    NdProxyTable,
};
