use crate::addressing::RouterAddressing;
use crate::error::BuildError;
use std::net::Ipv4Addr;
use vrm_proto::{
    access, Command, CommandBody, Commands, FirewallRuleTo, LbDestinationTo, LoadBalancerTo,
    PortForwardingRuleTo, StaticNatRuleTo,
};
use vrm_shared::{
    FirewallRule, FirewallRuleType, IpId, IpState, LoadBalancingRule, PortForwardingRule,
    PublicIp, RuleId, RuleState, StaticNat, StaticNatRule, TrafficDirection,
};

fn address_of(ips: &[PublicIp], rule_id: RuleId, ip_id: IpId) -> Result<Ipv4Addr, BuildError> {
    ips.iter()
        .find(|ip| ip.id == ip_id)
        .map(|ip| ip.address)
        .ok_or(BuildError::UnknownSourceIp { rule_id, ip_id })
}

/// Append a `SetFirewallRules` for ingress or egress rules.
///
/// Egress rules carry the offering's default policy. The egress-default access
/// detail is `System` when the list starts with a synthesised system rule.
pub fn add_firewall_rules(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    rules: &[FirewallRule],
    ips: &[PublicIp],
    egress_default_allow: bool,
) -> Result<(), BuildError> {
    if rules.is_empty() {
        return Ok(());
    }
    let mut details = addr.access_details()?;

    let tos = rules
        .iter()
        .map(|rule| {
            let (src_ip, default_egress_allow) = match rule.direction {
                TrafficDirection::Egress => (None, Some(egress_default_allow)),
                TrafficDirection::Ingress => {
                    let src_ip = match rule.source_ip_id {
                        Some(ip_id) => Some(address_of(ips, rule.id, ip_id)?),
                        None => None,
                    };
                    (src_ip, None)
                }
            };
            Ok(FirewallRuleTo {
                id: rule.id,
                src_ip,
                protocol: rule.protocol.clone(),
                port_start: rule.port_start,
                port_end: rule.port_end,
                icmp_type: rule.icmp_type,
                icmp_code: rule.icmp_code,
                source_cidrs: rule.source_cidrs.clone(),
                direction: rule.direction,
                revoked: rule.state.is_revoked(),
                already_added: rule.state == RuleState::Active,
                default_egress_allow,
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    let system_egress = rules[0].rule_type == FirewallRuleType::System
        && rules[0].direction == TrafficDirection::Egress;
    if system_egress {
        details.set(access::FIREWALL_EGRESS_DEFAULT, "System");
    } else {
        details.set(access::FIREWALL_EGRESS_DEFAULT, egress_default_allow);
    }

    cmds.push(Command::new(CommandBody::SetFirewallRules { rules: tos }).with_access(details));
    Ok(())
}

/// Append port forwarding rules, using the VPC flavour for VPC routers
pub fn add_port_forwarding_rules(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    rules: &[PortForwardingRule],
    ips: &[PublicIp],
) -> Result<(), BuildError> {
    if rules.is_empty() {
        return Ok(());
    }
    let details = addr.access_details()?;

    let tos = rules
        .iter()
        .map(|rule| {
            Ok(PortForwardingRuleTo {
                id: rule.id,
                src_ip: address_of(ips, rule.id, rule.source_ip_id)?,
                protocol: rule.protocol.clone(),
                src_port_start: rule.source_port_start,
                src_port_end: rule.source_port_end,
                dst_ip: rule.dest_ip,
                dst_port_start: rule.dest_port_start,
                dst_port_end: rule.dest_port_end,
                revoked: rule.state.is_revoked(),
                already_added: rule.state == RuleState::Active,
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    let body = if addr.vpc_id.is_some() {
        CommandBody::SetPortForwardingRulesVpc { rules: tos }
    } else {
        CommandBody::SetPortForwardingRules { rules: tos }
    };
    cmds.push(Command::new(body).with_access(details));
    Ok(())
}

/// One-to-one NAT mappings carried by the network's public addresses
pub fn static_nats_of(ips: &[PublicIp]) -> Vec<StaticNat> {
    ips.iter()
        .filter(|ip| ip.is_one_to_one_nat)
        .filter_map(|ip| {
            ip.vm_ip.map(|dest_ip| StaticNat {
                source_ip_id: ip.id,
                network_id: ip.network_id.unwrap_or_default(),
                dest_ip,
                revoked: ip.state == IpState::Releasing,
            })
        })
        .collect()
}

/// Append whole-address static NAT mappings
pub fn add_static_nats(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    nats: &[StaticNat],
    ips: &[PublicIp],
) -> Result<(), BuildError> {
    if nats.is_empty() {
        return Ok(());
    }
    let details = addr.access_details()?;

    let tos = nats
        .iter()
        .map(|nat| {
            Ok(StaticNatRuleTo {
                id: 0,
                src_ip: address_of(ips, 0, nat.source_ip_id)?,
                protocol: None,
                src_port_start: None,
                src_port_end: None,
                dst_ip: nat.dest_ip,
                revoked: nat.revoked,
                already_added: false,
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    cmds.push(
        Command::new(CommandBody::SetStaticNatRules {
            rules: tos,
            vpc_id: addr.vpc_id,
        })
        .with_access(details),
    );
    Ok(())
}

/// Append port-scoped rules on static NAT addresses
pub fn add_static_nat_rules(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    rules: &[StaticNatRule],
    ips: &[PublicIp],
) -> Result<(), BuildError> {
    if rules.is_empty() {
        return Ok(());
    }
    let details = addr.access_details()?;

    let tos = rules
        .iter()
        .map(|rule| {
            Ok(StaticNatRuleTo {
                id: rule.id,
                src_ip: address_of(ips, rule.id, rule.source_ip_id)?,
                protocol: Some(rule.protocol.clone()),
                src_port_start: rule.port_start,
                src_port_end: rule.port_end,
                dst_ip: rule.dest_ip,
                revoked: rule.state.is_revoked(),
                already_added: rule.state == RuleState::Active,
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    cmds.push(
        Command::new(CommandBody::SetStaticNatRules {
            rules: tos,
            vpc_id: addr.vpc_id,
        })
        .with_access(details),
    );
    Ok(())
}

/// Append the full load balancer configuration of the network
pub fn add_load_balancer_config(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    rules: &[LoadBalancingRule],
    ips: &[PublicIp],
) -> Result<(), BuildError> {
    if rules.is_empty() {
        return Ok(());
    }
    let details = addr.access_details()?;

    let load_balancers = rules
        .iter()
        .map(|rule| {
            Ok(LoadBalancerTo {
                uuid: rule.uuid.clone(),
                src_ip: address_of(ips, rule.id, rule.source_ip_id)?,
                src_port: rule.source_port,
                protocol: rule.protocol.clone(),
                algorithm: rule.algorithm,
                revoked: rule.state.is_revoked(),
                already_added: rule.state == RuleState::Active,
                destinations: rule
                    .destinations
                    .iter()
                    .map(|dest| LbDestinationTo {
                        ip: dest.ip,
                        port: dest.port,
                        revoked: dest.revoked,
                    })
                    .collect(),
                stickiness: rule.stickiness.clone(),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    cmds.push(
        Command::new(CommandBody::LoadBalancerConfig {
            load_balancers,
            public_ip: addr.public_ip,
            guest_ip: addr.guest_ip,
            private_ip: addr.control_ip,
            vpc_id: addr.vpc_id,
        })
        .with_access(details),
    );
    Ok(())
}
