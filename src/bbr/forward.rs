use std::net::Ipv6Addr;

use super::manager::Manager;
use crate::core::InterfaceIdentifier;

impl Manager {
    /// Returns whether a packet for `address` should be tunneled to the backbone
    ///
    /// True only on the Primary, for a Domain Unicast Address that is not
    /// proxied here and has no better route inside the mesh.
    pub fn should_forward_dua_to_backbone(&self, address: &Ipv6Addr) -> bool {
        if !self.local.is_primary() || !self.network_data.is_domain_unicast(address) {
            return false;
        }

        if self.nd_proxy.is_registered(&InterfaceIdentifier::of(address)) {
            return false;
        }

        match self.resolver.resolve(address) {
            None => true,
            Some(rloc16) => rloc16 == self.local.rloc16(),
        }
    }
}
