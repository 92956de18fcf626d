use crate::error::BuildError;
use std::net::Ipv4Addr;
use vrm_proto::{access, AccessDetails};
use vrm_shared::{RouterId, VpcId, ZoneNetworkType};

/// Everything the agent needs to locate a router and the network being configured
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouterAddressing {
    pub router_id: RouterId,
    pub router_name: String,
    /// Link-local address used to reach the router
    pub control_ip: Option<Ipv4Addr>,
    /// Router's address inside the guest network being configured
    pub guest_ip: Option<Ipv4Addr>,
    pub public_ip: Option<Ipv4Addr>,
    pub public_mac: Option<String>,
    pub zone_name: String,
    pub zone_type: ZoneNetworkType,
    pub vpc_id: Option<VpcId>,
}

impl RouterAddressing {
    pub fn control_ip(&self) -> Result<Ipv4Addr, BuildError> {
        self.control_ip
            .ok_or_else(|| BuildError::MissingControlInterface {
                router: self.router_name.clone(),
            })
    }

    pub fn guest_ip(&self) -> Result<Ipv4Addr, BuildError> {
        self.guest_ip.ok_or_else(|| BuildError::MissingGuestInterface {
            router: self.router_name.clone(),
        })
    }

    /// Same router, addressed inside another guest network
    pub fn for_guest(&self, guest_ip: Option<Ipv4Addr>) -> Self {
        Self {
            guest_ip,
            ..self.clone()
        }
    }

    pub fn access_details(&self) -> Result<AccessDetails, BuildError> {
        let control_ip = self.control_ip()?;
        let mut details = AccessDetails::new();
        details.set(access::ROUTER_IP, control_ip);
        if let Some(guest_ip) = self.guest_ip {
            details.set(access::ROUTER_GUEST_IP, guest_ip);
        }
        details.set(access::ROUTER_NAME, &self.router_name);
        details.set(access::ZONE_NETWORK_TYPE, self.zone_type);
        Ok(details)
    }
}
