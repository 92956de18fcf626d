use crate::addressing::RouterAddressing;
use crate::error::BuildError;
use vrm_proto::{Command, CommandBody, Commands, IpAddressTo};
use vrm_shared::net::mac_on_increase;
use vrm_shared::{IpState, PublicIp, TrafficType};

/// Addresses whose state is not in `skip`
pub fn ips_to_apply(ips: &[PublicIp], skip: &[IpState]) -> Vec<PublicIp> {
    ips.iter()
        .filter(|ip| !skip.contains(&ip.state))
        .cloned()
        .collect()
}

/// Group addresses by VLAN in first-seen order, source NAT first inside each group.
///
/// A source NAT address found in `Releasing` is moved back to `Allocated`: the
/// router keeps its source NAT address for as long as the network lives.
pub fn order_ip_assoc(ips: &[PublicIp]) -> Vec<(String, Vec<PublicIp>)> {
    let mut groups: Vec<(String, Vec<PublicIp>)> = Vec::new();
    for ip in ips {
        let mut ip = ip.clone();
        if ip.is_source_nat && ip.state == IpState::Releasing {
            ip.state = IpState::Allocated;
        }
        match groups.iter_mut().find(|(vlan, _)| *vlan == ip.vlan_tag) {
            Some((_, members)) => members.push(ip),
            None => groups.push((ip.vlan_tag.clone(), vec![ip])),
        }
    }
    for (_, members) in groups.iter_mut() {
        // stable: non source NAT addresses keep their relative order
        members.sort_by_key(|ip| !ip.is_source_nat);
    }
    groups
}

/// Append one `IpAssoc` per VLAN group
pub fn add_ip_assoc(
    cmds: &mut Commands,
    addr: &RouterAddressing,
    ips: &[PublicIp],
) -> Result<(), BuildError> {
    let details = addr.access_details()?;
    let mut built = Vec::new();

    for (_, members) in order_ip_assoc(ips) {
        let mut first_ip = true;
        let mut tos = Vec::with_capacity(members.len());
        for ip in members {
            let add = ip.state != IpState::Releasing;
            // The first address of the interface carries the primary binding;
            // the agent only clears that binding for a source NAT entry.
            let source_nat = ip.is_source_nat || first_ip;
            let vif_mac = if !ip.is_source_nat && ip.vlan_db_id != 0 {
                addr.public_mac
                    .as_deref()
                    .and_then(|mac| mac_on_increase(mac, ip.vlan_db_id))
            } else {
                ip.mac.clone()
            };
            tos.push(IpAddressTo {
                account_id: ip.account_id,
                public_ip: ip.address,
                add,
                first_ip,
                source_nat,
                one_to_one_nat: ip.is_one_to_one_nat,
                vlan_id: ip.vlan_tag.clone(),
                vlan_gateway: ip.vlan_gateway,
                vlan_netmask: ip.vlan_netmask,
                vif_mac,
                traffic_type: TrafficType::Public,
            });
            if add {
                first_ip = false;
            }
        }
        built.push(Command::new(CommandBody::IpAssoc { ips: tos }).with_access(details.clone()));
    }

    for cmd in built {
        cmds.push(cmd);
    }
    Ok(())
}
