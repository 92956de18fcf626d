use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

pub type RouterId = u64;
pub type HostId = u64;
pub type NetworkId = u64;
pub type ZoneId = u64;
pub type PodId = u64;
pub type AccountId = u64;
pub type VpcId = u64;
pub type VmId = u64;
pub type ManagementServerId = u64;

/// Virtual machine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VmState {
    Starting,
    Running,
    Stopping,
    #[default]
    Stopped,
    Destroyed,
    Migrating,
    Error,
}

/// Redundancy state reported by a redundant router's keepalived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RedundantState {
    Master,
    Backup,
    #[default]
    Unknown,
}

impl std::fmt::Display for RedundantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => write!(f, "MASTER"),
            Self::Backup => write!(f, "BACKUP"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RouterRole {
    #[default]
    VirtualRouter,
    InternalLbVm,
}

/// A system VM acting as the virtual router of one or more guest networks
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Router {
    pub id: RouterId,
    pub instance_name: String,
    pub host_name: String,
    pub role: RouterRole,
    pub state: VmState,
    pub is_redundant: bool,
    pub redundant_state: RedundantState,
    pub priority: u32,
    pub is_priority_bumped: bool,
    pub stop_pending: bool,
    pub host_id: Option<HostId>,
    /// Control-plane (link local) address
    pub private_ip: Option<Ipv4Addr>,
    pub public_ip: Option<Ipv4Addr>,
    pub public_mac: Option<String>,
    pub template_version: Option<String>,
    pub scripts_version: Option<String>,
    pub account_id: AccountId,
    pub domain_id: u64,
    pub zone_id: ZoneId,
    pub pod_id: Option<PodId>,
    pub cluster_id: Option<u64>,
    pub vpc_id: Option<VpcId>,
}

impl Router {
    pub fn new(id: RouterId, instance_name: impl Into<String>, zone_id: ZoneId) -> Self {
        let instance_name = instance_name.into();
        Self {
            id,
            host_name: instance_name.clone(),
            instance_name,
            zone_id,
            ..Default::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == VmState::Running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HostStatus {
    Up,
    #[default]
    Down,
    Disconnected,
    Alert,
}

/// Hypervisor host running router VMs, owned by one management server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub status: HostStatus,
    pub management_server_id: Option<ManagementServerId>,
}

impl Host {
    pub fn is_up(&self) -> bool {
        self.status == HostStatus::Up
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ManagementServerState {
    #[default]
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementServer {
    pub id: ManagementServerId,
    pub state: ManagementServerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZoneNetworkType {
    Basic,
    #[default]
    Advanced,
}

impl std::fmt::Display for ZoneNetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "Basic"),
            Self::Advanced => write!(f, "Advanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub network_type: ZoneNetworkType,
    pub dns1: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GuestType {
    #[default]
    Isolated,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrafficType {
    #[default]
    Guest,
    Public,
    Control,
    Management,
}

/// Services a network offering delegates to the virtual router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkService {
    Dhcp,
    Dns,
    UserData,
    SourceNat,
    StaticNat,
    PortForwarding,
    Firewall,
    Lb,
    Vpn,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub id: NetworkId,
    pub name: String,
    pub zone_id: ZoneId,
    pub account_id: AccountId,
    pub domain_id: u64,
    pub guest_type: GuestType,
    pub traffic_type: TrafficType,
    pub is_redundant: bool,
    pub vpc_id: Option<VpcId>,
    pub cidr: Option<String>,
    pub gateway: Option<Ipv4Addr>,
    pub network_domain: Option<String>,
    pub services: BTreeSet<NetworkService>,
    /// Offering's default egress policy: true allows all, false denies all
    pub egress_default_allow: bool,
    /// Secondary (isolated) VLAN of a private VLAN network
    pub private_vlan: Option<String>,
    pub broadcast_uri: Option<String>,
}

impl Network {
    pub fn supports(&self, service: NetworkService) -> bool {
        self.services.contains(&service)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Nic {
    pub id: u64,
    pub vm_id: VmId,
    pub network_id: NetworkId,
    pub traffic_type: TrafficType,
    pub ip4: Option<Ipv4Addr>,
    pub mac: Option<String>,
    pub netmask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub broadcast_uri: Option<String>,
    pub is_default: bool,
}

/// Tenant VM served by a router's DHCP and metadata services
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserVm {
    pub id: VmId,
    pub uuid: String,
    pub instance_name: String,
    pub host_name: String,
    pub state: VmState,
    pub service_offering: String,
    pub user_data: Option<String>,
    pub public_key: Option<String>,
}
