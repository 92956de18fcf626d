// DHCP, user data, VPN and IP alias commands
use crate::addressing::RouterAddressing;
use crate::error::BuildError;
use std::net::Ipv4Addr;
use vrm_proto::{Command, CommandBody, Commands, DhcpRangeTo, IpAliasTo, UsernamePassword, VmDataEntry};
use vrm_shared::{Nic, RemoteAccessVpn, RuleState, UserVm, VpnUser, ZoneNetworkType};

/// Split users into (add, remove) by state; staged users are left out
pub fn partition_vpn_users(
    users: &[VpnUser],
) -> (Vec<UsernamePassword>, Vec<UsernamePassword>) {
    let mut add = Vec::new();
    let mut remove = Vec::new();
    for user in users {
        let entry = UsernamePassword {
            username: user.username.clone(),
            password: user.password.clone(),
        };
        match user.state {
            RuleState::Add | RuleState::Active => add.push(entry),
            RuleState::Revoke => remove.push(entry),
            RuleState::Staged => {}
        }
    }
    (add, remove)
}

pub fn add_vpn_users(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    users: &[VpnUser],
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let (add, remove) = partition_vpn_users(users);
    cmds.push(Command::new(CommandBody::VpnUsersCfg { add, remove }).with_access(details));
    Ok(())
}

/// Append the account's VPN users followed by the server configuration
pub fn add_remote_access_vpn(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    vpn: &RemoteAccessVpn,
    server_ip: Ipv4Addr,
    users: &[VpnUser],
    create: bool,
    local_cidr: Option<String>,
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let (add, remove) = partition_vpn_users(users);
    cmds.push_named(
        "users",
        Command::new(CommandBody::VpnUsersCfg { add, remove }).with_access(details.clone()),
    );
    cmds.push_named(
        "startVpn",
        Command::new(CommandBody::RemoteAccessVpnCfg {
            create,
            vpn_server_ip: server_ip,
            local_ip: vpn.local_ip,
            ip_range: vpn.ip_range.clone(),
            preshared_key: vpn.preshared_key.clone(),
            local_cidr,
            vpc: vpn.vpc_id.is_some(),
        })
        .with_access(details),
    );
    Ok(())
}

/// Append a DHCP lease for a guest VM's nic
pub fn add_dhcp_entry(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    vm: &UserVm,
    nic: &Nic,
    default_dns: Option<Ipv4Addr>,
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let (vm_mac, vm_ip) = match (nic.mac.clone(), nic.ip4) {
        (Some(mac), Some(ip)) => (mac, ip),
        _ => {
            return Err(BuildError::IncompleteNic {
                nic_id: nic.id,
                vm: vm.instance_name.clone(),
            })
        }
    };
    let default_router = if nic.is_default { nic.gateway } else { None };
    cmds.push(
        Command::new(CommandBody::DhcpEntry {
            vm_mac,
            vm_ip,
            vm_name: vm.host_name.clone(),
            default_router,
            default_dns,
            is_default: nic.is_default,
        })
        .with_access(details),
    );
    Ok(())
}

/// Append the metadata and user data served to a guest VM
pub fn add_vm_data(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    vm: &UserVm,
    nic: &Nic,
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let vm_ip = nic.ip4.ok_or_else(|| BuildError::IncompleteNic {
        nic_id: nic.id,
        vm: vm.instance_name.clone(),
    })?;

    // Basic zones hand the guest address out as the public one
    let public_ip = match (addr.zone_type, addr.public_ip) {
        (ZoneNetworkType::Advanced, Some(public)) => public,
        _ => vm_ip,
    };

    let entries = vec![
        VmDataEntry::new("userdata", "user-data", vm.user_data.clone().unwrap_or_default()),
        VmDataEntry::new("metadata", "service-offering", vm.service_offering.clone()),
        VmDataEntry::new("metadata", "availability-zone", addr.zone_name.clone()),
        VmDataEntry::new("metadata", "local-ipv4", vm_ip.to_string()),
        VmDataEntry::new("metadata", "local-hostname", vm.host_name.clone()),
        VmDataEntry::new("metadata", "public-ipv4", public_ip.to_string()),
        VmDataEntry::new("metadata", "public-hostname", public_ip.to_string()),
        VmDataEntry::new("metadata", "instance-id", vm.instance_name.clone()),
        VmDataEntry::new("metadata", "vm-id", vm.id.to_string()),
        VmDataEntry::new("metadata", "public-keys", vm.public_key.clone().unwrap_or_default()),
    ];

    cmds.push(
        Command::new(CommandBody::VmData {
            vm_ip,
            vm_name: vm.instance_name.clone(),
            entries,
        })
        .with_access(details),
    );
    Ok(())
}

/// Configure DHCP for extra subnets: create the aliases, then reload dnsmasq
pub fn add_create_ip_alias(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    aliases: Vec<IpAliasTo>,
    ranges: Vec<DhcpRangeTo>,
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let router_ip = addr.guest_ip()?;
    cmds.push(
        Command::new(CommandBody::CreateIpAlias { router_ip, aliases })
            .with_access(details.clone()),
    );
    cmds.push(
        Command::new(CommandBody::DnsMasqConfig {
            dhcp_ranges: ranges,
        })
        .with_access(details),
    );
    Ok(())
}

/// Remove DHCP from retired subnets and reload dnsmasq with the remaining ranges
pub fn add_delete_ip_alias(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    revoked: Vec<IpAliasTo>,
    active: Vec<IpAliasTo>,
    ranges: Vec<DhcpRangeTo>,
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let router_ip = addr.guest_ip()?;
    cmds.push(
        Command::new(CommandBody::DeleteIpAlias {
            router_ip,
            revoked,
            active,
        })
        .with_access(details.clone()),
    );
    cmds.push(
        Command::new(CommandBody::DnsMasqConfig {
            dhcp_ranges: ranges,
        })
        .with_access(details),
    );
    Ok(())
}
