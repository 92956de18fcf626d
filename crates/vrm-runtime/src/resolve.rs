//! Turns persisted records into the addressing and network snapshots the
//! batch builder works from.

use crate::context::Repositories;
use vrm_builder::{GuestVmEntry, NetworkSnapshot, RouterAddressing};
use vrm_core::{Result, VrmError};
use vrm_shared::{NetworkId, PublicIp, Router, TrafficDirection, TrafficType};

/// Addressing of `router`, inside `network_id` when one is given
pub fn router_addressing(
    repos: &Repositories,
    router: &Router,
    network_id: Option<NetworkId>,
) -> Result<RouterAddressing> {
    let zone = repos
        .networks
        .find_zone(router.zone_id)
        .ok_or_else(|| VrmError::not_found("zone", router.zone_id))?;

    let guest_ip = match network_id {
        Some(network_id) => repos
            .networks
            .list_nics_by_vm(router.id)
            .into_iter()
            .find(|nic| nic.network_id == network_id && nic.traffic_type == TrafficType::Guest)
            .and_then(|nic| nic.ip4),
        None => None,
    };

    Ok(RouterAddressing {
        router_id: router.id,
        router_name: router.instance_name.clone(),
        control_ip: router.private_ip,
        guest_ip,
        public_ip: router.public_ip,
        public_mac: router.public_mac.clone(),
        zone_name: zone.name,
        zone_type: zone.network_type,
        vpc_id: router.vpc_id,
    })
}

/// Public IPs of a network, in id order
pub fn network_ips(repos: &Repositories, network_id: NetworkId) -> Vec<PublicIp> {
    repos.rules.list_public_ips_by_network(network_id)
}

/// Everything `router` must be told about `network_id` when it (re)starts
pub fn network_snapshot(
    repos: &Repositories,
    router: &Router,
    network_id: NetworkId,
) -> Result<NetworkSnapshot> {
    let network = repos
        .networks
        .find_network(network_id)
        .ok_or_else(|| VrmError::not_found("network", network_id))?;
    let addressing = router_addressing(repos, router, Some(network_id))?;
    let public_ips = network_ips(repos, network_id);

    let mut port_forwarding = Vec::new();
    let mut static_nat_rules = Vec::new();
    let mut remote_vpn = None;
    for ip in &public_ips {
        port_forwarding.extend(repos.rules.list_port_forwarding_by_ip(ip.id));
        static_nat_rules.extend(repos.rules.list_static_nat_rules_by_ip(ip.id));
        if remote_vpn.is_none() {
            remote_vpn = repos.rules.find_remote_vpn_by_ip(ip.id);
        }
    }
    let vpn_users = match &remote_vpn {
        Some(vpn) => repos.rules.list_vpn_users_by_account(vpn.account_id),
        None => Vec::new(),
    };

    let guests = repos
        .networks
        .list_user_vms_by_network(network_id)
        .into_iter()
        .filter_map(|vm| {
            repos
                .networks
                .list_nics_by_vm(vm.id)
                .into_iter()
                .find(|nic| nic.network_id == network_id)
                .map(|nic| GuestVmEntry { vm, nic })
        })
        .collect();

    let default_dns = repos
        .networks
        .find_zone(router.zone_id)
        .and_then(|zone| zone.dns1);

    Ok(NetworkSnapshot {
        egress_rules: repos
            .rules
            .list_firewall_rules(network_id, TrafficDirection::Egress),
        ingress_rules: repos
            .rules
            .list_firewall_rules(network_id, TrafficDirection::Ingress),
        load_balancers: repos.rules.list_load_balancers_by_network(network_id),
        network,
        addressing,
        public_ips,
        port_forwarding,
        static_nat_rules,
        remote_vpn,
        vpn_users,
        guests,
        default_dns,
    })
}
