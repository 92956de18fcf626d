use crate::to::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Access-detail keys understood by the agent
pub mod access {
    pub const ROUTER_IP: &str = "router.ip";
    pub const ROUTER_GUEST_IP: &str = "router.guest.ip";
    pub const ROUTER_NAME: &str = "router.name";
    pub const ZONE_NETWORK_TYPE: &str = "zone.network.type";
    pub const FIREWALL_EGRESS_DEFAULT: &str = "firewall.egress.default";
}

/// Routing metadata attached to a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDetails(BTreeMap<String, String>);

impl AccessDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationAction {
    Start,
    Finish,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PvlanOp {
    Add,
    Delete,
}

/// Protocol messages, one variant per agent command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandBody {
    CheckRouter,
    CheckS2SVpnConnections {
        vpn_ips: Vec<Ipv4Addr>,
    },
    GetRouterAlerts {
        previous_alert_timestamp: String,
    },
    GetDomRVersion,
    BumpUpPriority,
    NetworkUsage {
        private_ip: Ipv4Addr,
        domr_name: String,
        for_vpc: bool,
        gateway_ip: Option<Ipv4Addr>,
    },
    SetFirewallRules {
        rules: Vec<FirewallRuleTo>,
    },
    SetPortForwardingRules {
        rules: Vec<PortForwardingRuleTo>,
    },
    SetPortForwardingRulesVpc {
        rules: Vec<PortForwardingRuleTo>,
    },
    SetStaticNatRules {
        rules: Vec<StaticNatRuleTo>,
        vpc_id: Option<u64>,
    },
    LoadBalancerConfig {
        load_balancers: Vec<LoadBalancerTo>,
        public_ip: Option<Ipv4Addr>,
        guest_ip: Option<Ipv4Addr>,
        private_ip: Option<Ipv4Addr>,
        vpc_id: Option<u64>,
    },
    IpAssoc {
        ips: Vec<IpAddressTo>,
    },
    VpnUsersCfg {
        add: Vec<UsernamePassword>,
        remove: Vec<UsernamePassword>,
    },
    RemoteAccessVpnCfg {
        create: bool,
        vpn_server_ip: Ipv4Addr,
        local_ip: Ipv4Addr,
        ip_range: String,
        preshared_key: String,
        local_cidr: Option<String>,
        vpc: bool,
    },
    DhcpEntry {
        vm_mac: String,
        vm_ip: Ipv4Addr,
        vm_name: String,
        default_router: Option<Ipv4Addr>,
        default_dns: Option<Ipv4Addr>,
        is_default: bool,
    },
    CreateIpAlias {
        router_ip: Ipv4Addr,
        aliases: Vec<IpAliasTo>,
    },
    DeleteIpAlias {
        router_ip: Ipv4Addr,
        revoked: Vec<IpAliasTo>,
        active: Vec<IpAliasTo>,
    },
    DnsMasqConfig {
        dhcp_ranges: Vec<DhcpRangeTo>,
    },
    VmData {
        vm_ip: Ipv4Addr,
        vm_name: String,
        entries: Vec<VmDataEntry>,
    },
    AggregationControl {
        action: AggregationAction,
        router_name: String,
        router_ip: Ipv4Addr,
        guest_ip: Option<Ipv4Addr>,
    },
    PvlanSetup {
        op: PvlanOp,
        network_tag: Option<String>,
        private_vlan: String,
        dhcp_name: String,
        dhcp_mac: String,
        dhcp_ip: Ipv4Addr,
    },
}

impl CommandBody {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckRouter => "CheckRouter",
            Self::CheckS2SVpnConnections { .. } => "CheckS2SVpnConnections",
            Self::GetRouterAlerts { .. } => "GetRouterAlerts",
            Self::GetDomRVersion => "GetDomRVersion",
            Self::BumpUpPriority => "BumpUpPriority",
            Self::NetworkUsage { .. } => "NetworkUsage",
            Self::SetFirewallRules { .. } => "SetFirewallRules",
            Self::SetPortForwardingRules { .. } => "SetPortForwardingRules",
            Self::SetPortForwardingRulesVpc { .. } => "SetPortForwardingRulesVpc",
            Self::SetStaticNatRules { .. } => "SetStaticNatRules",
            Self::LoadBalancerConfig { .. } => "LoadBalancerConfig",
            Self::IpAssoc { .. } => "IpAssoc",
            Self::VpnUsersCfg { .. } => "VpnUsersCfg",
            Self::RemoteAccessVpnCfg { .. } => "RemoteAccessVpnCfg",
            Self::DhcpEntry { .. } => "DhcpEntry",
            Self::CreateIpAlias { .. } => "CreateIpAlias",
            Self::DeleteIpAlias { .. } => "DeleteIpAlias",
            Self::DnsMasqConfig { .. } => "DnsMasqConfig",
            Self::VmData { .. } => "VmData",
            Self::AggregationControl { .. } => "AggregationControl",
            Self::PvlanSetup { .. } => "PvlanSetup",
        }
    }
}

/// A single agent command with its routing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub access: AccessDetails,
    /// Seconds the agent may spend executing, agent default when unset
    pub wait_secs: Option<u64>,
    pub body: CommandBody,
}

impl Command {
    pub fn new(body: CommandBody) -> Self {
        Self {
            access: AccessDetails::new(),
            wait_secs: None,
            body,
        }
    }

    pub fn with_access(mut self, access: AccessDetails) -> Self {
        self.access = access;
        self
    }

    pub fn with_wait(mut self, secs: u64) -> Self {
        self.wait_secs = Some(secs);
        self
    }

    pub fn name(&self) -> &'static str {
        self.body.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_details() {
        let mut details = AccessDetails::new();
        details.set(access::ROUTER_IP, Ipv4Addr::new(169, 254, 1, 10));
        details.set(access::ROUTER_NAME, "r-4-VM");
        assert_eq!(details.get(access::ROUTER_IP), Some("169.254.1.10"));
        assert_eq!(details.get(access::ROUTER_NAME), Some("r-4-VM"));
        assert_eq!(details.get(access::ROUTER_GUEST_IP), None);
        assert_eq!(details.len(), 2);
    }

    #[test]
    fn test_command_name() {
        let cmd = Command::new(CommandBody::AggregationControl {
            action: AggregationAction::Start,
            router_name: "r-4-VM".to_string(),
            router_ip: Ipv4Addr::new(169, 254, 1, 10),
            guest_ip: None,
        });
        assert_eq!(cmd.name(), "AggregationControl");
        assert_eq!(Command::new(CommandBody::CheckRouter).name(), "CheckRouter");
    }

    #[test]
    fn test_command_body_is_tagged() {
        let cmd = Command::new(CommandBody::GetRouterAlerts {
            previous_alert_timestamp: "1970-01-01 00:00:00".to_string(),
        })
        .with_wait(30);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["body"]["type"], "GetRouterAlerts");
        assert_eq!(json["wait_secs"], 30);
    }
}
