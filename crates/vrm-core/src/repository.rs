//! Persistence seams.
//!
//! The router manager never sees storage formats; it reads and writes its
//! records through these repository traits. Row-level locking is expressed as
//! closures run while the implementation holds the row.

use crate::error::Result;
use vrm_shared::{
    FirewallRule, Host, HostId, LoadBalancingRule, ManagementServer, ManagementServerId, Network,
    NetworkId, Nic, PortForwardingRule, PublicIp, RemoteAccessVpn, Router, RouterAlertCheckpoint,
    RouterId, RouterRole, Site2SiteCustomerGateway, Site2SiteVpnConnection, StaticNatRule,
    TrafficDirection, UsageStatsKey, UserStatistics, UserStatsLogEntry, UserVm, VmId, VpcId,
    VpnUser, Zone, ZoneId,
};

pub trait RouterRepository: Send + Sync {
    fn find_router(&self, id: RouterId) -> Option<Router>;

    fn update_router(&self, router: &Router) -> Result<()>;

    /// Routers with `role` serving the guest network, ordered by id
    fn list_by_network_and_role(&self, network_id: NetworkId, role: RouterRole) -> Vec<Router>;

    fn list_by_vpc(&self, vpc_id: VpcId) -> Vec<Router>;

    /// Routers serving isolated networks; `None` lists them on every host
    fn list_isolated_by_host(&self, host_id: Option<HostId>) -> Vec<Router>;

    /// Running routers whose host is owned by the given management server
    fn list_running_by_management_server(&self, msid: ManagementServerId) -> Vec<Router>;

    /// Guest networks served by the router
    fn router_networks(&self, router_id: RouterId) -> Vec<NetworkId>;
}

pub trait HostRepository: Send + Sync {
    fn find_host(&self, id: HostId) -> Option<Host>;

    fn list_management_servers(&self) -> Vec<ManagementServer>;
}

pub trait NetworkRepository: Send + Sync {
    fn find_network(&self, id: NetworkId) -> Option<Network>;

    fn list_redundant_networks(&self) -> Vec<Network>;

    fn find_zone(&self, id: ZoneId) -> Option<Zone>;

    fn list_nics_by_vm(&self, vm_id: VmId) -> Vec<Nic>;

    fn list_user_vms_by_network(&self, network_id: NetworkId) -> Vec<UserVm>;
}

pub trait RuleRepository: Send + Sync {
    fn find_public_ip(&self, id: u64) -> Option<PublicIp>;

    fn list_public_ips_by_network(&self, network_id: NetworkId) -> Vec<PublicIp>;

    fn list_firewall_rules(
        &self,
        network_id: NetworkId,
        direction: TrafficDirection,
    ) -> Vec<FirewallRule>;

    fn list_firewall_rules_by_ip(&self, ip_id: u64) -> Vec<FirewallRule>;

    fn list_port_forwarding_by_ip(&self, ip_id: u64) -> Vec<PortForwardingRule>;

    fn list_static_nat_rules_by_ip(&self, ip_id: u64) -> Vec<StaticNatRule>;

    fn list_load_balancers_by_network(&self, network_id: NetworkId) -> Vec<LoadBalancingRule>;

    fn find_remote_vpn_by_ip(&self, ip_id: u64) -> Option<RemoteAccessVpn>;

    fn list_vpn_users_by_account(&self, account_id: u64) -> Vec<VpnUser>;
}

pub trait VpnConnectionRepository: Send + Sync {
    fn list_connections_by_vpc(&self, vpc_id: VpcId) -> Vec<Site2SiteVpnConnection>;

    fn find_customer_gateway(&self, id: u64) -> Option<Site2SiteCustomerGateway>;

    fn update_connection(&self, conn: &Site2SiteVpnConnection) -> Result<()>;

    /// Run `apply` with the connection row locked; errors if it vanished
    fn with_connection_locked(
        &self,
        id: u64,
        apply: &mut dyn FnMut(&mut Site2SiteVpnConnection),
    ) -> Result<()>;
}

/// Outcome of an update attempted under a row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowUpdate {
    Missing,
    Committed,
    Discarded,
}

pub trait UsageRepository: Send + Sync {
    fn find_stats(&self, key: &UsageStatsKey) -> Option<UserStatistics>;

    fn create_stats_if_missing(&self, key: &UsageStatsKey) -> Result<UserStatistics>;

    /// Lock the row and run `update`; the row is written back only when it returns true
    fn with_stats_locked(
        &self,
        key: &UsageStatsKey,
        update: &mut dyn FnMut(&mut UserStatistics) -> bool,
    ) -> Result<RowUpdate>;

    /// Rows whose aggregate counters lag behind net + current
    fn list_updated_stats(&self) -> Vec<UserStatistics>;

    fn update_stats(&self, stats: &UserStatistics) -> Result<()>;

    fn append_stats_log(&self, entry: UserStatsLogEntry) -> Result<()>;
}

pub trait AlertCheckpointRepository: Send + Sync {
    fn find_checkpoint(&self, router_id: RouterId) -> Option<RouterAlertCheckpoint>;

    fn save_checkpoint(&self, checkpoint: RouterAlertCheckpoint) -> Result<()>;
}
