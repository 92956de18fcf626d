// Transfer objects embedded in command bodies
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use vrm_shared::{LbAlgorithm, TrafficDirection, TrafficType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRuleTo {
    pub id: u64,
    pub src_ip: Option<Ipv4Addr>,
    pub protocol: String,
    pub port_start: Option<u16>,
    pub port_end: Option<u16>,
    pub icmp_type: Option<i32>,
    pub icmp_code: Option<i32>,
    pub source_cidrs: Vec<String>,
    pub direction: TrafficDirection,
    pub revoked: bool,
    pub already_added: bool,
    /// Offering default egress policy, only set on egress rules
    pub default_egress_allow: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortForwardingRuleTo {
    pub id: u64,
    pub src_ip: Ipv4Addr,
    pub protocol: String,
    pub src_port_start: u16,
    pub src_port_end: u16,
    pub dst_ip: Ipv4Addr,
    pub dst_port_start: u16,
    pub dst_port_end: u16,
    pub revoked: bool,
    pub already_added: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticNatRuleTo {
    pub id: u64,
    pub src_ip: Ipv4Addr,
    pub protocol: Option<String>,
    pub src_port_start: Option<u16>,
    pub src_port_end: Option<u16>,
    pub dst_ip: Ipv4Addr,
    pub revoked: bool,
    pub already_added: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbDestinationTo {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerTo {
    pub uuid: String,
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub protocol: String,
    pub algorithm: LbAlgorithm,
    pub revoked: bool,
    pub already_added: bool,
    pub destinations: Vec<LbDestinationTo>,
    pub stickiness: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAddressTo {
    pub account_id: u64,
    pub public_ip: Ipv4Addr,
    pub add: bool,
    /// First address of the interface, creates the primary binding
    pub first_ip: bool,
    pub source_nat: bool,
    pub one_to_one_nat: bool,
    pub vlan_id: String,
    pub vlan_gateway: Ipv4Addr,
    pub vlan_netmask: Ipv4Addr,
    pub vif_mac: Option<String>,
    pub traffic_type: TrafficType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsernamePassword {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAliasTo {
    pub router_ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub alias_count: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DhcpRangeTo {
    pub router_ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub start_ip: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmDataEntry {
    pub folder: String,
    pub file: String,
    pub contents: String,
}

impl VmDataEntry {
    pub fn new(folder: &str, file: &str, contents: impl Into<String>) -> Self {
        Self {
            folder: folder.to_string(),
            file: file.to_string(),
            contents: contents.into(),
        }
    }
}
