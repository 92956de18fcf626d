use serde::{Deserialize, Serialize};
use std::path::Path;
use vrm_core::{Result, VrmError};
use vrm_shared::{
    FirewallRule, Host, LoadBalancingRule, ManagementServer, Network, Nic, PortForwardingRule,
    PublicIp, RemoteAccessVpn, Router, Site2SiteCustomerGateway, Site2SiteVpnConnection,
    StaticNatRule, UserVm, VpnUser, Zone,
};

/// Static description of a deployment: every record the manager starts from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub management_servers: Vec<ManagementServer>,
    pub hosts: Vec<Host>,
    pub zones: Vec<Zone>,
    pub networks: Vec<Network>,
    pub routers: Vec<Router>,
    /// Links routers and user VMs to their networks
    pub nics: Vec<Nic>,
    pub user_vms: Vec<UserVm>,
    pub public_ips: Vec<PublicIp>,
    pub firewall_rules: Vec<FirewallRule>,
    pub port_forwarding_rules: Vec<PortForwardingRule>,
    pub static_nat_rules: Vec<StaticNatRule>,
    pub load_balancers: Vec<LoadBalancingRule>,
    pub remote_access_vpns: Vec<RemoteAccessVpn>,
    pub vpn_users: Vec<VpnUser>,
    pub customer_gateways: Vec<Site2SiteCustomerGateway>,
    pub vpn_connections: Vec<Site2SiteVpnConnection>,
}

impl Inventory {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| VrmError::Config(format!("invalid inventory: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use vrm_core::{NetworkRepository, RouterRepository};
    use vrm_shared::{RedundantState, VmState};

    const INVENTORY: &str = r#"
management_servers:
  - id: 1
hosts:
  - id: 1
    name: kvm-1
    status: Up
    management_server_id: 1
zones:
  - id: 1
    name: zone-1
    dns1: 8.8.8.8
networks:
  - id: 204
    name: guest-204
    zone_id: 1
    is_redundant: true
    cidr: 10.1.1.0/24
    gateway: 10.1.1.1
    services: [Dhcp, Dns, Firewall, SourceNat]
routers:
  - id: 4
    instance_name: r-4-VM
    host_name: r-4-VM
    state: Running
    is_redundant: true
    redundant_state: Master
    priority: 100
    host_id: 1
    private_ip: 169.254.3.10
    zone_id: 1
nics:
  - id: 10
    vm_id: 4
    network_id: 204
    traffic_type: Guest
    ip4: 10.1.1.2
"#;

    #[test]
    fn test_inventory_seeds_store() {
        let inventory = Inventory::from_yaml(INVENTORY).unwrap();
        assert_eq!(inventory.routers.len(), 1);

        let store = MemoryStore::from_inventory(inventory);
        let router = store.find_router(4).unwrap();
        assert_eq!(router.state, VmState::Running);
        assert_eq!(router.redundant_state, RedundantState::Master);
        assert_eq!(store.router_networks(4), vec![204]);
        assert_eq!(store.list_redundant_networks().len(), 1);
        assert!(store.find_zone(1).unwrap().dns1.is_some());
    }

    #[test]
    fn test_invalid_inventory() {
        let err = Inventory::from_yaml("routers: 12").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_empty_inventory() {
        let inventory = Inventory::from_yaml("{}").unwrap();
        assert!(inventory.networks.is_empty());
    }
}
