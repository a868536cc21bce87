//! Registration tables consumed by the manager
//!
//! The manager only relies on the contracts below. The in-memory tables are
//! straightforward reference implementations with a fixed capacity.

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::core::{is_multicast_larger_than_realm_local, InterfaceIdentifier};

/// Default capacity of the multicast listener table
pub const DEFAULT_LISTENERS_CAPACITY: usize = 75;

/// Default capacity of the ND proxy table
pub const DEFAULT_ND_PROXY_CAPACITY: usize = 16;

/// Why a multicast listener could not be admitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("{0} is not a multicast address larger than realm-local scope")]
    InvalidAddress(Ipv6Addr),

    #[error("multicast listener table is full")]
    NoBufs,
}

/// Why a DUA could not be proxied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NdProxyError {
    #[error("target already registered by ML-IID {owner}")]
    Duplicated {
        /// ML-IID of the current registrant
        owner: InterfaceIdentifier,
    },

    #[error("ND proxy table is full")]
    NoBufs,

    #[error("ND proxy registration failed: {0}")]
    Other(String),
}

/// Multicast listeners registered on behalf of mesh nodes
pub trait MulticastListenersTable: Send {
    /// Adds or refreshes a listener
    ///
    /// Must fail rather than succeed for an address it cannot hold.
    fn add(&mut self, address: Ipv6Addr, expire_at: Instant) -> Result<(), ListenerError>;

    /// Removes a listener if present
    fn remove(&mut self, address: &Ipv6Addr);

    /// Drops every listener whose expiry is at or before `now`
    fn expire(&mut self, now: Instant);

    /// Drops every listener
    fn clear(&mut self);

    /// Expiry instant of a listener
    fn expiry(&self, address: &Ipv6Addr) -> Option<Instant>;

    /// Number of listeners
    fn len(&self) -> usize;

    /// Returns whether the table holds no listeners
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A proxied Domain Unicast Address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdProxyEntry {
    /// Mesh-local IID of the registering device
    pub mesh_local_iid: InterfaceIdentifier,
    /// RLOC16 the registration came from
    pub rloc16: u16,
    /// Seconds since the device's last transaction, when reported
    pub last_transaction_time: Option<u32>,
}

/// Domain Unicast Addresses proxied on the backbone
pub trait NdProxyTable: Send {
    /// Registers or refreshes a DUA keyed by its interface identifier
    fn register(
        &mut self,
        target: InterfaceIdentifier,
        mesh_local_iid: InterfaceIdentifier,
        rloc16: u16,
        last_transaction_time: Option<u32>,
    ) -> Result<(), NdProxyError>;

    /// Returns whether a DUA with this IID is proxied
    fn is_registered(&self, target: &InterfaceIdentifier) -> bool;

    /// Looks up a proxied DUA
    fn entry(&self, target: &InterfaceIdentifier) -> Option<NdProxyEntry>;

    /// Number of proxied DUAs
    fn len(&self) -> usize;
}

/// Capacity-bounded in-memory multicast listener table
#[derive(Debug, Clone)]
pub struct InMemoryListenersTable {
    entries: HashMap<Ipv6Addr, Instant>,
    capacity: usize,
}

impl Default for InMemoryListenersTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LISTENERS_CAPACITY)
    }
}

impl InMemoryListenersTable {
    /// Creates a table holding at most `capacity` listeners
    pub fn with_capacity(capacity: usize) -> Self {
        InMemoryListenersTable {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }
}

impl MulticastListenersTable for InMemoryListenersTable {
    fn add(&mut self, address: Ipv6Addr, expire_at: Instant) -> Result<(), ListenerError> {
        if !is_multicast_larger_than_realm_local(&address) {
            return Err(ListenerError::InvalidAddress(address));
        }

        if let Some(existing) = self.entries.get_mut(&address) {
            *existing = expire_at;
            debug!(%address, "refreshed multicast listener");
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(ListenerError::NoBufs);
        }

        self.entries.insert(address, expire_at);
        debug!(%address, "added multicast listener");
        Ok(())
    }

    fn remove(&mut self, address: &Ipv6Addr) {
        if self.entries.remove(address).is_some() {
            debug!(%address, "removed multicast listener");
        }
    }

    fn expire(&mut self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, expire_at| *expire_at > now);
        let expired = before - self.entries.len();
        if expired > 0 {
            debug!(expired, "expired multicast listeners");
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn expiry(&self, address: &Ipv6Addr) -> Option<Instant> {
        self.entries.get(address).copied()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Capacity-bounded in-memory ND proxy table
#[derive(Debug, Clone)]
pub struct InMemoryNdProxyTable {
    entries: HashMap<InterfaceIdentifier, NdProxyEntry>,
    capacity: usize,
}

impl Default for InMemoryNdProxyTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ND_PROXY_CAPACITY)
    }
}

impl InMemoryNdProxyTable {
    /// Creates a table holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        InMemoryNdProxyTable {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }
}

impl NdProxyTable for InMemoryNdProxyTable {
    fn register(
        &mut self,
        target: InterfaceIdentifier,
        mesh_local_iid: InterfaceIdentifier,
        rloc16: u16,
        last_transaction_time: Option<u32>,
    ) -> Result<(), NdProxyError> {
        if let Some(entry) = self.entries.get_mut(&target) {
            if entry.mesh_local_iid != mesh_local_iid {
                return Err(NdProxyError::Duplicated {
                    owner: entry.mesh_local_iid,
                });
            }
            entry.rloc16 = rloc16;
            if last_transaction_time.is_some() {
                entry.last_transaction_time = last_transaction_time;
            }
            debug!(%target, rloc16, "refreshed ND proxy entry");
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(NdProxyError::NoBufs);
        }

        self.entries.insert(
            target,
            NdProxyEntry {
                mesh_local_iid,
                rloc16,
                last_transaction_time,
            },
        );
        debug!(%target, %mesh_local_iid, rloc16, "added ND proxy entry");
        Ok(())
    }

    fn is_registered(&self, target: &InterfaceIdentifier) -> bool {
        self.entries.contains_key(target)
    }

    fn entry(&self, target: &InterfaceIdentifier) -> Option<NdProxyEntry> {
        self.entries.get(target).copied()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
