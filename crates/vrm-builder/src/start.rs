//! Start sequence of a router: a version probe followed by one
//! Start/Finish bracket per guest network, each wrapping the complete
//! re-application of that network's state.

use crate::addressing::RouterAddressing;
use crate::aggregation::aggregation_command;
use crate::error::BuildError;
use crate::ip_assoc::{add_ip_assoc, ips_to_apply};
use crate::rules::{
    add_firewall_rules, add_load_balancer_config, add_port_forwarding_rules, add_static_nat_rules,
    add_static_nats, static_nats_of,
};
use crate::services::{add_dhcp_entry, add_remote_access_vpn, add_vm_data};
use crate::VERSION_COMMAND_NAME;
use std::net::Ipv4Addr;
use vrm_proto::{AggregationAction, Command, CommandBody, Commands, OnError};
use vrm_shared::{
    FirewallRule, GuestType, IpState, LoadBalancingRule, Network, NetworkService, Nic,
    PortForwardingRule, PublicIp, RemoteAccessVpn, RemoteAccessVpnState, StaticNatRule, UserVm,
    VmState, VpnUser,
};

/// Guest VM attached to the network, with its nic in that network
#[derive(Debug, Clone, PartialEq)]
pub struct GuestVmEntry {
    pub vm: UserVm,
    pub nic: Nic,
}

/// Persisted state of one guest network, as needed to reprogram its router
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    pub network: Network,
    pub addressing: RouterAddressing,
    pub public_ips: Vec<PublicIp>,
    pub egress_rules: Vec<FirewallRule>,
    pub ingress_rules: Vec<FirewallRule>,
    pub port_forwarding: Vec<PortForwardingRule>,
    pub static_nat_rules: Vec<StaticNatRule>,
    pub load_balancers: Vec<LoadBalancingRule>,
    pub remote_vpn: Option<RemoteAccessVpn>,
    pub vpn_users: Vec<VpnUser>,
    pub guests: Vec<GuestVmEntry>,
    pub default_dns: Option<Ipv4Addr>,
}

impl NetworkSnapshot {
    /// Egress rules to program; an allow-all offering without rules gets a system rule
    pub fn effective_egress_rules(&self) -> Vec<FirewallRule> {
        if self.egress_rules.is_empty() && self.network.egress_default_allow {
            vec![FirewallRule::default_egress(
                self.network.id,
                self.network.cidr.clone(),
            )]
        } else {
            self.egress_rules.clone()
        }
    }
}

/// Complete start batch and the networks it opened brackets for
#[derive(Debug, Clone)]
pub struct StartSequence {
    pub commands: Commands,
    pub bracketed: Vec<RouterAddressing>,
}

fn guest_is_active(vm: &UserVm) -> bool {
    matches!(
        vm.state,
        VmState::Starting | VmState::Running | VmState::Migrating | VmState::Stopping
    )
}

/// Append everything a router must know about one network, in apply order
pub fn add_network_reapply(cmds: &mut Commands, snap: &NetworkSnapshot) -> Result<(), BuildError> {
    let network = &snap.network;
    let addr = &snap.addressing;
    let ips = ips_to_apply(&snap.public_ips, &[IpState::Free, IpState::Allocating]);

    if network.supports(NetworkService::Firewall) && network.guest_type == GuestType::Isolated {
        add_firewall_rules(
            cmds,
            addr,
            &snap.effective_egress_rules(),
            &ips,
            network.egress_default_allow,
        )?;
    }

    if !ips.is_empty() {
        add_ip_assoc(cmds, addr, &ips)?;
    }

    if network.supports(NetworkService::StaticNat) {
        add_static_nats(cmds, addr, &static_nats_of(&ips), &ips)?;
    }

    if network.supports(NetworkService::Firewall) {
        add_firewall_rules(cmds, addr, &snap.ingress_rules, &ips, network.egress_default_allow)?;
    }

    if network.supports(NetworkService::PortForwarding) {
        add_port_forwarding_rules(cmds, addr, &snap.port_forwarding, &ips)?;
    }

    if network.supports(NetworkService::StaticNat) {
        add_static_nat_rules(cmds, addr, &snap.static_nat_rules, &ips)?;
    }

    if network.supports(NetworkService::Vpn) {
        if let Some(vpn) = snap
            .remote_vpn
            .as_ref()
            .filter(|vpn| vpn.state == RemoteAccessVpnState::Running)
        {
            let server_ip = ips
                .iter()
                .find(|ip| ip.id == vpn.server_ip_id)
                .map(|ip| ip.address)
                .ok_or(BuildError::UnknownSourceIp {
                    rule_id: vpn.id,
                    ip_id: vpn.server_ip_id,
                })?;
            add_remote_access_vpn(
                cmds,
                addr,
                vpn,
                server_ip,
                &snap.vpn_users,
                true,
                network.cidr.clone(),
            )?;
        }
    }

    if network.supports(NetworkService::Lb) {
        add_load_balancer_config(cmds, addr, &snap.load_balancers, &ips)?;
    }

    for guest in snap.guests.iter().filter(|g| guest_is_active(&g.vm)) {
        if network.supports(NetworkService::Dhcp) {
            add_dhcp_entry(cmds, addr, &guest.vm, &guest.nic, snap.default_dns)?;
        }
        if network.supports(NetworkService::UserData) {
            add_vm_data(cmds, addr, &guest.vm, &guest.nic)?;
        }
    }
    Ok(())
}

/// Build the whole start batch, or nothing at all
pub fn build_start_sequence(
    router: &RouterAddressing,
    networks: &[NetworkSnapshot],
) -> Result<StartSequence, BuildError> {
    let mut commands = Commands::new(OnError::Stop);
    let mut bracketed = Vec::with_capacity(networks.len());

    commands.push_named(
        VERSION_COMMAND_NAME,
        Command::new(CommandBody::GetDomRVersion).with_access(router.access_details()?),
    );

    for snap in networks {
        let mut bracket = Commands::new(OnError::Stop);
        bracket.push(aggregation_command(&snap.addressing, AggregationAction::Start)?);
        add_network_reapply(&mut bracket, snap)?;
        bracket.push(aggregation_command(&snap.addressing, AggregationAction::Finish)?);
        commands.extend(bracket);
        bracketed.push(snap.addressing.clone());
    }

    Ok(StartSequence {
        commands,
        bracketed,
    })
}
