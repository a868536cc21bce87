//! Transports and the event loop around the manager
//!
//! This module handles the backbone socket, the mesh-side message channel and
//! the task that feeds events into the manager.

pub mod backbone;
mod driver;

pub use self::backbone::UdpBackboneAgent;
pub use self::driver::{Driver, Event};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::bbr::{MeshTransport, Resource};
use crate::core::{Error, Result};
use crate::protocol::{Message, MessageInfo};

/// Resources currently served, shared with whoever routes inbound requests
pub type ServedResources = Arc<Mutex<HashSet<Resource>>>;

/// Mesh transport that hands outbound messages to a channel
///
/// The receiving end is typically the mesh TMF agent's send loop.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<(Message, MessageInfo)>,
    served: ServedResources,
}

impl ChannelTransport {
    /// Creates a transport and the receiver for its outbound messages
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Message, MessageInfo)>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let transport = ChannelTransport {
            outbound,
            served: Arc::new(Mutex::new(HashSet::new())),
        };
        (transport, rx)
    }

    /// Handle to the set of served resources
    pub fn served(&self) -> ServedResources {
        self.served.clone()
    }

    fn with_served<R>(&self, f: impl FnOnce(&mut HashSet<Resource>) -> R) -> R {
        let mut served = self.served.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut served)
    }
}

impl MeshTransport for ChannelTransport {
    fn add_resource(&mut self, resource: Resource) {
        if self.with_served(|served| served.insert(resource)) {
            debug!(path = resource.uri_path(), "serving resource");
        }
    }

    fn remove_resource(&mut self, resource: Resource) {
        if self.with_served(|served| served.remove(&resource)) {
            debug!(path = resource.uri_path(), "stopped serving resource");
        }
    }

    fn send(&mut self, message: Message, info: &MessageInfo) -> Result<()> {
        self.outbound
            .send((message, info.clone()))
            .map_err(|_| Error::transport("mesh channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{uri_path, Code};
    use tokio_test::assert_ok;

    #[test]
    fn test_channel_transport() {
        let (mut transport, mut rx) = ChannelTransport::new();
        let served = transport.served();

        transport.add_resource(Resource::DuaRegistration);
        assert!(served.lock().unwrap().contains(&Resource::DuaRegistration));
        transport.remove_resource(Resource::DuaRegistration);
        assert!(served.lock().unwrap().is_empty());

        let request = Message::confirmable_post(uri_path::MLR);
        let response = Message::response_to(&request, Code::CHANGED);
        let info = MessageInfo::new("fdde:ad00:beef::ff:fe00:2c00".parse().unwrap(), 61631);
        assert_ok!(transport.send(response.clone(), &info));
        assert_eq!(rx.try_recv().unwrap(), (response.clone(), info.clone()));

        drop(rx);
        assert!(transport.send(response, &info).is_err());
    }
}
