use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vrm_core::{
    AlertCheckpointRepository, HostRepository, NetworkRepository, Result, RouterRepository,
    RowUpdate, RuleRepository, UsageRepository, VpnConnectionRepository, VrmError,
};
use vrm_shared::{
    FirewallRule, GuestType, Host, HostId, LoadBalancingRule, ManagementServer,
    ManagementServerId, Network, NetworkId, Nic, PortForwardingRule, PublicIp, RemoteAccessVpn,
    Router, RouterAlertCheckpoint, RouterId, RouterRole, Site2SiteCustomerGateway,
    Site2SiteVpnConnection, StaticNatRule, TrafficDirection, TrafficType, UsageStatsKey,
    UserStatistics, UserStatsLogEntry, UserVm, VmId, VmState, VpcId, VpnUser, Zone, ZoneId,
};

use crate::inventory::Inventory;

/// Concurrent in-memory store backing every repository trait.
///
/// Each record kind lives in its own `DashMap`; holding a map entry mutably is
/// the row lock used by the `with_*_locked` operations.
pub struct MemoryStore {
    routers: Arc<DashMap<RouterId, Router>>,
    hosts: Arc<DashMap<HostId, Host>>,
    management_servers: Arc<DashMap<ManagementServerId, ManagementServer>>,
    zones: Arc<DashMap<ZoneId, Zone>>,
    networks: Arc<DashMap<NetworkId, Network>>,
    nics: Arc<DashMap<u64, Nic>>,
    user_vms: Arc<DashMap<VmId, UserVm>>,
    public_ips: Arc<DashMap<u64, PublicIp>>,
    firewall_rules: Arc<DashMap<u64, FirewallRule>>,
    port_forwarding: Arc<DashMap<u64, PortForwardingRule>>,
    static_nat_rules: Arc<DashMap<u64, StaticNatRule>>,
    load_balancers: Arc<DashMap<u64, LoadBalancingRule>>,
    remote_vpns: Arc<DashMap<u64, RemoteAccessVpn>>,
    vpn_users: Arc<DashMap<u64, VpnUser>>,
    connections: Arc<DashMap<u64, Site2SiteVpnConnection>>,
    gateways: Arc<DashMap<u64, Site2SiteCustomerGateway>>,
    stats: Arc<DashMap<UsageStatsKey, UserStatistics>>,
    stats_log: Mutex<Vec<UserStatsLogEntry>>,
    checkpoints: Arc<DashMap<RouterId, RouterAlertCheckpoint>>,
    next_stats_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            routers: Arc::new(DashMap::new()),
            hosts: Arc::new(DashMap::new()),
            management_servers: Arc::new(DashMap::new()),
            zones: Arc::new(DashMap::new()),
            networks: Arc::new(DashMap::new()),
            nics: Arc::new(DashMap::new()),
            user_vms: Arc::new(DashMap::new()),
            public_ips: Arc::new(DashMap::new()),
            firewall_rules: Arc::new(DashMap::new()),
            port_forwarding: Arc::new(DashMap::new()),
            static_nat_rules: Arc::new(DashMap::new()),
            load_balancers: Arc::new(DashMap::new()),
            remote_vpns: Arc::new(DashMap::new()),
            vpn_users: Arc::new(DashMap::new()),
            connections: Arc::new(DashMap::new()),
            gateways: Arc::new(DashMap::new()),
            stats: Arc::new(DashMap::new()),
            stats_log: Mutex::new(Vec::new()),
            checkpoints: Arc::new(DashMap::new()),
            next_stats_id: AtomicU64::new(1),
        }
    }

    /// Build a store seeded with every record of an inventory
    pub fn from_inventory(inventory: Inventory) -> Self {
        let store = Self::new();
        inventory
            .management_servers
            .into_iter()
            .for_each(|ms| store.insert_management_server(ms));
        inventory.hosts.into_iter().for_each(|h| store.insert_host(h));
        inventory.zones.into_iter().for_each(|z| store.insert_zone(z));
        inventory
            .networks
            .into_iter()
            .for_each(|n| store.insert_network(n));
        inventory
            .routers
            .into_iter()
            .for_each(|r| store.insert_router(r));
        inventory.nics.into_iter().for_each(|n| store.insert_nic(n));
        inventory
            .user_vms
            .into_iter()
            .for_each(|vm| store.insert_user_vm(vm));
        inventory
            .public_ips
            .into_iter()
            .for_each(|ip| store.insert_public_ip(ip));
        inventory
            .firewall_rules
            .into_iter()
            .for_each(|r| store.insert_firewall_rule(r));
        inventory
            .port_forwarding_rules
            .into_iter()
            .for_each(|r| store.insert_port_forwarding_rule(r));
        inventory
            .static_nat_rules
            .into_iter()
            .for_each(|r| store.insert_static_nat_rule(r));
        inventory
            .load_balancers
            .into_iter()
            .for_each(|r| store.insert_load_balancer(r));
        inventory
            .remote_access_vpns
            .into_iter()
            .for_each(|v| store.insert_remote_vpn(v));
        inventory
            .vpn_users
            .into_iter()
            .for_each(|u| store.insert_vpn_user(u));
        inventory
            .customer_gateways
            .into_iter()
            .for_each(|g| store.insert_customer_gateway(g));
        inventory
            .vpn_connections
            .into_iter()
            .for_each(|c| store.insert_connection(c));
        store
    }

    pub fn insert_router(&self, router: Router) {
        self.routers.insert(router.id, router);
    }

    pub fn insert_host(&self, host: Host) {
        self.hosts.insert(host.id, host);
    }

    pub fn insert_management_server(&self, ms: ManagementServer) {
        self.management_servers.insert(ms.id, ms);
    }

    pub fn insert_zone(&self, zone: Zone) {
        self.zones.insert(zone.id, zone);
    }

    pub fn insert_network(&self, network: Network) {
        self.networks.insert(network.id, network);
    }

    pub fn insert_nic(&self, nic: Nic) {
        self.nics.insert(nic.id, nic);
    }

    pub fn insert_user_vm(&self, vm: UserVm) {
        self.user_vms.insert(vm.id, vm);
    }

    pub fn insert_public_ip(&self, ip: PublicIp) {
        self.public_ips.insert(ip.id, ip);
    }

    pub fn insert_firewall_rule(&self, rule: FirewallRule) {
        self.firewall_rules.insert(rule.id, rule);
    }

    pub fn insert_port_forwarding_rule(&self, rule: PortForwardingRule) {
        self.port_forwarding.insert(rule.id, rule);
    }

    pub fn insert_static_nat_rule(&self, rule: StaticNatRule) {
        self.static_nat_rules.insert(rule.id, rule);
    }

    pub fn insert_load_balancer(&self, rule: LoadBalancingRule) {
        self.load_balancers.insert(rule.id, rule);
    }

    pub fn insert_remote_vpn(&self, vpn: RemoteAccessVpn) {
        self.remote_vpns.insert(vpn.id, vpn);
    }

    pub fn insert_vpn_user(&self, user: VpnUser) {
        self.vpn_users.insert(user.id, user);
    }

    pub fn insert_customer_gateway(&self, gateway: Site2SiteCustomerGateway) {
        self.gateways.insert(gateway.id, gateway);
    }

    pub fn insert_connection(&self, conn: Site2SiteVpnConnection) {
        self.connections.insert(conn.id, conn);
    }

    /// Seed a statistics row, keeping its id
    pub fn insert_stats(&self, stats: UserStatistics) {
        self.next_stats_id.fetch_max(stats.id + 1, Ordering::SeqCst);
        self.stats.insert(stats.key.clone(), stats);
    }

    /// Update a router row in place; no-op when it does not exist
    pub fn modify_router(&self, id: RouterId, apply: impl FnOnce(&mut Router)) {
        if let Some(mut entry) = self.routers.get_mut(&id) {
            apply(entry.value_mut());
        }
    }

    pub fn set_router_state(&self, id: RouterId, state: VmState) {
        self.modify_router(id, |router| router.state = state);
    }

    pub fn find_connection(&self, id: u64) -> Option<Site2SiteVpnConnection> {
        self.connections.get(&id).map(|entry| entry.clone())
    }

    /// Every usage log entry written so far, oldest first
    pub fn stats_log(&self) -> Vec<UserStatsLogEntry> {
        self.stats_log.lock().clone()
    }

    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    fn guest_network_ids(&self, vm_id: VmId) -> Vec<NetworkId> {
        let mut nics: Vec<Nic> = self
            .nics
            .iter()
            .filter(|entry| entry.vm_id == vm_id && entry.traffic_type == TrafficType::Guest)
            .map(|entry| entry.clone())
            .collect();
        nics.sort_by_key(|nic| nic.id);
        let mut ids: Vec<NetworkId> = Vec::with_capacity(nics.len());
        for nic in nics {
            if !ids.contains(&nic.network_id) {
                ids.push(nic.network_id);
            }
        }
        ids
    }

    fn sorted_routers(&self, keep: impl Fn(&Router) -> bool) -> Vec<Router> {
        let mut routers: Vec<Router> = self
            .routers
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.clone())
            .collect();
        routers.sort_by_key(|router| router.id);
        routers
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterRepository for MemoryStore {
    fn find_router(&self, id: RouterId) -> Option<Router> {
        self.routers.get(&id).map(|entry| entry.clone())
    }

    fn update_router(&self, router: &Router) -> Result<()> {
        match self.routers.get_mut(&router.id) {
            Some(mut entry) => {
                *entry = router.clone();
                Ok(())
            }
            None => Err(VrmError::not_found("router", router.id)),
        }
    }

    fn list_by_network_and_role(&self, network_id: NetworkId, role: RouterRole) -> Vec<Router> {
        self.sorted_routers(|router| {
            router.role == role && self.guest_network_ids(router.id).contains(&network_id)
        })
    }

    fn list_by_vpc(&self, vpc_id: VpcId) -> Vec<Router> {
        self.sorted_routers(|router| router.vpc_id == Some(vpc_id))
    }

    fn list_isolated_by_host(&self, host_id: Option<HostId>) -> Vec<Router> {
        self.sorted_routers(|router| {
            if host_id.is_some() && router.host_id != host_id {
                return false;
            }
            self.guest_network_ids(router.id).iter().any(|id| {
                self.networks
                    .get(id)
                    .map(|network| network.guest_type == GuestType::Isolated)
                    .unwrap_or(false)
            })
        })
    }

    fn list_running_by_management_server(&self, msid: ManagementServerId) -> Vec<Router> {
        self.sorted_routers(|router| {
            router.is_running()
                && router
                    .host_id
                    .and_then(|host_id| self.hosts.get(&host_id).map(|h| h.management_server_id))
                    .flatten()
                    == Some(msid)
        })
    }

    fn router_networks(&self, router_id: RouterId) -> Vec<NetworkId> {
        self.guest_network_ids(router_id)
    }
}

impl HostRepository for MemoryStore {
    fn find_host(&self, id: HostId) -> Option<Host> {
        self.hosts.get(&id).map(|entry| entry.clone())
    }

    fn list_management_servers(&self) -> Vec<ManagementServer> {
        let mut servers: Vec<ManagementServer> = self
            .management_servers
            .iter()
            .map(|entry| entry.clone())
            .collect();
        servers.sort_by_key(|ms| ms.id);
        servers
    }
}

impl NetworkRepository for MemoryStore {
    fn find_network(&self, id: NetworkId) -> Option<Network> {
        self.networks.get(&id).map(|entry| entry.clone())
    }

    fn list_redundant_networks(&self) -> Vec<Network> {
        let mut networks: Vec<Network> = self
            .networks
            .iter()
            .filter(|entry| entry.is_redundant)
            .map(|entry| entry.clone())
            .collect();
        networks.sort_by_key(|network| network.id);
        networks
    }

    fn find_zone(&self, id: ZoneId) -> Option<Zone> {
        self.zones.get(&id).map(|entry| entry.clone())
    }

    fn list_nics_by_vm(&self, vm_id: VmId) -> Vec<Nic> {
        let mut nics: Vec<Nic> = self
            .nics
            .iter()
            .filter(|entry| entry.vm_id == vm_id)
            .map(|entry| entry.clone())
            .collect();
        nics.sort_by_key(|nic| nic.id);
        nics
    }

    fn list_user_vms_by_network(&self, network_id: NetworkId) -> Vec<UserVm> {
        let mut vms: Vec<UserVm> = self
            .nics
            .iter()
            .filter(|entry| entry.network_id == network_id)
            .filter_map(|entry| self.user_vms.get(&entry.vm_id).map(|vm| vm.clone()))
            .collect();
        vms.sort_by_key(|vm| vm.id);
        vms.dedup_by_key(|vm| vm.id);
        vms
    }
}

fn sorted<T: Clone>(map: &DashMap<u64, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut rows: Vec<(u64, T)> = map
        .iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect();
    rows.sort_by_key(|(id, _)| *id);
    rows.into_iter().map(|(_, row)| row).collect()
}

impl RuleRepository for MemoryStore {
    fn find_public_ip(&self, id: u64) -> Option<PublicIp> {
        self.public_ips.get(&id).map(|entry| entry.clone())
    }

    fn list_public_ips_by_network(&self, network_id: NetworkId) -> Vec<PublicIp> {
        sorted(&self.public_ips, |ip| ip.network_id == Some(network_id))
    }

    fn list_firewall_rules(
        &self,
        network_id: NetworkId,
        direction: TrafficDirection,
    ) -> Vec<FirewallRule> {
        sorted(&self.firewall_rules, |rule| {
            rule.network_id == network_id && rule.direction == direction
        })
    }

    fn list_firewall_rules_by_ip(&self, ip_id: u64) -> Vec<FirewallRule> {
        sorted(&self.firewall_rules, |rule| rule.source_ip_id == Some(ip_id))
    }

    fn list_port_forwarding_by_ip(&self, ip_id: u64) -> Vec<PortForwardingRule> {
        sorted(&self.port_forwarding, |rule| rule.source_ip_id == ip_id)
    }

    fn list_static_nat_rules_by_ip(&self, ip_id: u64) -> Vec<StaticNatRule> {
        sorted(&self.static_nat_rules, |rule| rule.source_ip_id == ip_id)
    }

    fn list_load_balancers_by_network(&self, network_id: NetworkId) -> Vec<LoadBalancingRule> {
        sorted(&self.load_balancers, |rule| rule.network_id == network_id)
    }

    fn find_remote_vpn_by_ip(&self, ip_id: u64) -> Option<RemoteAccessVpn> {
        sorted(&self.remote_vpns, |vpn| vpn.server_ip_id == ip_id)
            .into_iter()
            .next()
    }

    fn list_vpn_users_by_account(&self, account_id: u64) -> Vec<VpnUser> {
        sorted(&self.vpn_users, |user| user.account_id == account_id)
    }
}

impl VpnConnectionRepository for MemoryStore {
    fn list_connections_by_vpc(&self, vpc_id: VpcId) -> Vec<Site2SiteVpnConnection> {
        sorted(&self.connections, |conn| conn.vpc_id == vpc_id)
    }

    fn find_customer_gateway(&self, id: u64) -> Option<Site2SiteCustomerGateway> {
        self.gateways.get(&id).map(|entry| entry.clone())
    }

    fn update_connection(&self, conn: &Site2SiteVpnConnection) -> Result<()> {
        match self.connections.get_mut(&conn.id) {
            Some(mut entry) => {
                *entry = conn.clone();
                Ok(())
            }
            None => Err(VrmError::not_found("site-to-site vpn connection", conn.id)),
        }
    }

    fn with_connection_locked(
        &self,
        id: u64,
        apply: &mut dyn FnMut(&mut Site2SiteVpnConnection),
    ) -> Result<()> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| VrmError::not_found("site-to-site vpn connection", id))?;
        apply(entry.value_mut());
        Ok(())
    }
}

impl UsageRepository for MemoryStore {
    fn find_stats(&self, key: &UsageStatsKey) -> Option<UserStatistics> {
        self.stats.get(key).map(|entry| entry.clone())
    }

    fn create_stats_if_missing(&self, key: &UsageStatsKey) -> Result<UserStatistics> {
        let entry = self.stats.entry(key.clone()).or_insert_with(|| {
            let id = self.next_stats_id.fetch_add(1, Ordering::SeqCst);
            UserStatistics::new(id, key.clone())
        });
        Ok(entry.clone())
    }

    fn with_stats_locked(
        &self,
        key: &UsageStatsKey,
        update: &mut dyn FnMut(&mut UserStatistics) -> bool,
    ) -> Result<RowUpdate> {
        let Some(mut entry) = self.stats.get_mut(key) else {
            return Ok(RowUpdate::Missing);
        };
        let mut working = entry.clone();
        if update(&mut working) {
            *entry = working;
            Ok(RowUpdate::Committed)
        } else {
            Ok(RowUpdate::Discarded)
        }
    }

    fn list_updated_stats(&self) -> Vec<UserStatistics> {
        let mut rows: Vec<UserStatistics> = self
            .stats
            .iter()
            .filter(|entry| entry.has_pending_delta())
            .map(|entry| entry.clone())
            .collect();
        rows.sort_by_key(|stats| stats.id);
        rows
    }

    fn update_stats(&self, stats: &UserStatistics) -> Result<()> {
        match self.stats.get_mut(&stats.key) {
            Some(mut entry) => {
                *entry = stats.clone();
                Ok(())
            }
            None => Err(VrmError::not_found("user statistics", stats.id)),
        }
    }

    fn append_stats_log(&self, entry: UserStatsLogEntry) -> Result<()> {
        self.stats_log.lock().push(entry);
        Ok(())
    }
}

impl AlertCheckpointRepository for MemoryStore {
    fn find_checkpoint(&self, router_id: RouterId) -> Option<RouterAlertCheckpoint> {
        self.checkpoints.get(&router_id).map(|entry| entry.clone())
    }

    fn save_checkpoint(&self, checkpoint: RouterAlertCheckpoint) -> Result<()> {
        self.checkpoints.insert(checkpoint.router_id, checkpoint);
        Ok(())
    }
}
