use crate::model::{AccountId, NetworkId, VpcId};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub type IpId = u64;
pub type RuleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IpState {
    Allocating,
    #[default]
    Allocated,
    Releasing,
    Free,
}

/// Public IP address associated with a guest network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicIp {
    pub id: IpId,
    pub address: Ipv4Addr,
    pub account_id: AccountId,
    pub network_id: Option<NetworkId>,
    pub vlan_tag: String,
    /// Database id of the VLAN range, 0 when untagged
    pub vlan_db_id: u64,
    pub vlan_gateway: Ipv4Addr,
    pub vlan_netmask: Ipv4Addr,
    pub mac: Option<String>,
    pub is_source_nat: bool,
    pub is_one_to_one_nat: bool,
    /// Static NAT target when `is_one_to_one_nat` is set
    pub vm_ip: Option<Ipv4Addr>,
    pub state: IpState,
}

/// Lifecycle of a network rule on the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuleState {
    Staged,
    #[default]
    Add,
    Active,
    Revoke,
}

impl RuleState {
    pub fn is_revoked(&self) -> bool {
        *self == RuleState::Revoke
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrafficDirection {
    #[default]
    Ingress,
    Egress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FirewallRuleType {
    #[default]
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallRule {
    pub id: RuleId,
    pub network_id: NetworkId,
    /// Public IP the rule guards; always `None` for egress rules
    pub source_ip_id: Option<IpId>,
    pub protocol: String,
    pub port_start: Option<u16>,
    pub port_end: Option<u16>,
    pub icmp_type: Option<i32>,
    pub icmp_code: Option<i32>,
    pub source_cidrs: Vec<String>,
    pub direction: TrafficDirection,
    pub rule_type: FirewallRuleType,
    pub state: RuleState,
}

impl FirewallRule {
    /// System egress rule opening the whole network CIDR
    pub fn default_egress(network_id: NetworkId, cidr: Option<String>) -> Self {
        Self {
            network_id,
            protocol: "all".to_string(),
            source_cidrs: cidr.into_iter().collect(),
            direction: TrafficDirection::Egress,
            rule_type: FirewallRuleType::System,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortForwardingRule {
    pub id: RuleId,
    pub network_id: NetworkId,
    pub source_ip_id: IpId,
    pub protocol: String,
    pub source_port_start: u16,
    pub source_port_end: u16,
    pub dest_ip: Ipv4Addr,
    pub dest_port_start: u16,
    pub dest_port_end: u16,
    pub state: RuleState,
}

/// One-to-one NAT between a public IP and a guest VM address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticNat {
    pub source_ip_id: IpId,
    pub network_id: NetworkId,
    pub dest_ip: Ipv4Addr,
    pub revoked: bool,
}

/// Port-scoped rule on top of a static NAT address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticNatRule {
    pub id: RuleId,
    pub network_id: NetworkId,
    pub source_ip_id: IpId,
    pub protocol: String,
    pub port_start: Option<u16>,
    pub port_end: Option<u16>,
    pub dest_ip: Ipv4Addr,
    pub state: RuleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LbAlgorithm {
    #[default]
    RoundRobin,
    LeastConn,
    Source,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbDestination {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancingRule {
    pub id: RuleId,
    pub uuid: String,
    pub network_id: NetworkId,
    pub source_ip_id: IpId,
    pub protocol: String,
    pub source_port: u16,
    pub dest_port: u16,
    pub algorithm: LbAlgorithm,
    pub destinations: Vec<LbDestination>,
    pub stickiness: Option<String>,
    pub state: RuleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RemoteAccessVpnState {
    #[default]
    Added,
    Running,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAccessVpn {
    pub id: u64,
    pub server_ip_id: IpId,
    pub account_id: AccountId,
    pub network_id: Option<NetworkId>,
    pub vpc_id: Option<VpcId>,
    pub local_ip: Ipv4Addr,
    pub ip_range: String,
    pub preshared_key: String,
    pub state: RemoteAccessVpnState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnUser {
    pub id: u64,
    pub account_id: AccountId,
    pub username: String,
    pub password: String,
    pub state: RuleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Site2SiteVpnState {
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl std::fmt::Display for Site2SiteVpnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site2SiteCustomerGateway {
    pub id: u64,
    pub name: String,
    pub gateway_ip: Ipv4Addr,
}

/// Site-to-site VPN connection terminated on a VPC's router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site2SiteVpnConnection {
    pub id: u64,
    pub vpc_id: VpcId,
    pub customer_gateway_id: u64,
    pub state: Site2SiteVpnState,
}
