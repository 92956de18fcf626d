use std::net::Ipv4Addr;
use vrm_shared::{
    Alert, AlertType, RedundantState, Router, Site2SiteCustomerGateway, Site2SiteVpnConnection,
    Site2SiteVpnState,
};

/// Redundant backups do not terminate tunnels, so only their Master is checked
pub fn should_check(router: &Router) -> bool {
    !(router.is_redundant && router.redundant_state != RedundantState::Master)
}

/// State of a connection whose router is not running
pub fn state_when_router_down(current: Site2SiteVpnState) -> Site2SiteVpnState {
    match current {
        Site2SiteVpnState::Error => Site2SiteVpnState::Error,
        _ => Site2SiteVpnState::Disconnected,
    }
}

/// Only Connected and Disconnected tunnels are probed and updated; Error stays put
pub fn is_probed(state: Site2SiteVpnState) -> bool {
    matches!(
        state,
        Site2SiteVpnState::Connected | Site2SiteVpnState::Disconnected
    )
}

/// Customer gateways worth probing
pub fn probe_targets(
    conns: &[Site2SiteVpnConnection],
    gateway_of: impl Fn(u64) -> Option<Site2SiteCustomerGateway>,
) -> Vec<Ipv4Addr> {
    conns
        .iter()
        .filter(|conn| is_probed(conn.state))
        .filter_map(|conn| gateway_of(conn.customer_gateway_id))
        .map(|gw| gw.gateway_ip)
        .collect()
}

pub fn probed_state(gateway: &Site2SiteCustomerGateway, connected: &[Ipv4Addr]) -> Site2SiteVpnState {
    if connected.contains(&gateway.gateway_ip) {
        Site2SiteVpnState::Connected
    } else {
        Site2SiteVpnState::Disconnected
    }
}

pub fn transition_alert(
    router: &Router,
    gateway: &Site2SiteCustomerGateway,
    from: Site2SiteVpnState,
    to: Site2SiteVpnState,
) -> Alert {
    let context = format!(
        "Site-to-site VPN connection to {} on router {} (id {}) went from {} to {}",
        gateway.name, router.host_name, router.id, from, to
    );
    Alert {
        alert_type: AlertType::Site2SiteVpn,
        zone_id: router.zone_id,
        pod_id: router.pod_id,
        title: context.clone(),
        detail: context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(id: u64, last: u8) -> Site2SiteCustomerGateway {
        Site2SiteCustomerGateway {
            id,
            name: format!("gw-{}", id),
            gateway_ip: Ipv4Addr::new(203, 0, 113, last),
        }
    }

    fn conn(id: u64, gw: u64, state: Site2SiteVpnState) -> Site2SiteVpnConnection {
        Site2SiteVpnConnection {
            id,
            vpc_id: 9,
            customer_gateway_id: gw,
            state,
        }
    }

    #[test]
    fn test_should_check() {
        let mut router = Router::new(4, "r-4-VM", 1);
        assert!(should_check(&router));
        router.is_redundant = true;
        router.redundant_state = RedundantState::Backup;
        assert!(!should_check(&router));
        router.redundant_state = RedundantState::Master;
        assert!(should_check(&router));
    }

    #[test]
    fn test_router_down_keeps_error() {
        assert_eq!(
            state_when_router_down(Site2SiteVpnState::Connected),
            Site2SiteVpnState::Disconnected
        );
        assert_eq!(
            state_when_router_down(Site2SiteVpnState::Error),
            Site2SiteVpnState::Error
        );
    }

    #[test]
    fn test_probe_targets_skip_errored() {
        let conns = vec![
            conn(1, 1, Site2SiteVpnState::Connected),
            conn(2, 2, Site2SiteVpnState::Error),
            conn(3, 3, Site2SiteVpnState::Disconnected),
        ];
        let ips = probe_targets(&conns, |id| Some(gateway(id, id as u8)));
        assert_eq!(
            ips,
            vec![Ipv4Addr::new(203, 0, 113, 1), Ipv4Addr::new(203, 0, 113, 3)]
        );
    }

    #[test]
    fn test_only_live_states_are_probed() {
        assert!(is_probed(Site2SiteVpnState::Connected));
        assert!(is_probed(Site2SiteVpnState::Disconnected));
        assert!(!is_probed(Site2SiteVpnState::Error));
    }

    #[test]
    fn test_probed_state_and_alert() {
        let gw = gateway(1, 1);
        assert_eq!(
            probed_state(&gw, &[Ipv4Addr::new(203, 0, 113, 1)]),
            Site2SiteVpnState::Connected
        );
        assert_eq!(probed_state(&gw, &[]), Site2SiteVpnState::Disconnected);

        let router = Router::new(4, "r-4-VM", 1);
        let alert = transition_alert(
            &router,
            &gw,
            Site2SiteVpnState::Connected,
            Site2SiteVpnState::Disconnected,
        );
        assert!(alert.detail.contains("Connected to Disconnected"));
        assert_eq!(alert.alert_type, AlertType::Site2SiteVpn);
    }
}
