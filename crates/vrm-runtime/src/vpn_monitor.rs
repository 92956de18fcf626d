use crate::context::RouterContext;
use crate::resolve::router_addressing;
use tracing::{debug, info, warn};
use vrm_monitor_core::vpn::{
    is_probed, probe_targets, probed_state, should_check, state_when_router_down,
    transition_alert,
};
use vrm_proto::{AnswerPayload, Command, CommandBody};
use vrm_shared::{Router, Site2SiteVpnConnection};

/// Refresh site-to-site VPN connection states of the VPC routers in `routers`
pub async fn update_site2site_vpn_state(ctx: &RouterContext, routers: &[Router]) {
    for router in routers {
        let Some(vpc_id) = router.vpc_id else {
            continue;
        };
        if !should_check(router) {
            continue;
        }
        let conns = ctx.repos.vpn.list_connections_by_vpc(vpc_id);
        if conns.is_empty() {
            continue;
        }

        if !router.is_running() {
            for conn in &conns {
                let result = ctx.repos.vpn.with_connection_locked(
                    conn.id,
                    &mut |locked: &mut Site2SiteVpnConnection| {
                        locked.state = state_when_router_down(locked.state);
                    },
                );
                if let Err(e) = result {
                    warn!(connection = conn.id, error = %e, "Unable to mark vpn connection down");
                }
            }
            continue;
        }

        let Some(host_id) = router.host_id else {
            continue;
        };
        let vpn_ips = probe_targets(&conns, |id| ctx.repos.vpn.find_customer_gateway(id));
        let details = match router_addressing(&ctx.repos, router, None)
            .map(|addr| addr.access_details())
        {
            Ok(Ok(details)) => details,
            _ => {
                warn!(router = %router.instance_name, "Cannot address router for vpn check");
                continue;
            }
        };
        let cmd = Command::new(CommandBody::CheckS2SVpnConnections { vpn_ips }).with_access(details);
        let connected = match ctx.transport.easy_send(host_id, cmd).await {
            Some(answer) if answer.result => match answer.payload {
                AnswerPayload::CheckS2SVpnConnections { connected } => connected,
                _ => Vec::new(),
            },
            _ => {
                warn!(
                    router = %router.instance_name,
                    "Unable to update site-to-site vpn connection status"
                );
                continue;
            }
        };

        for conn in &conns {
            let Some(gateway) = ctx.repos.vpn.find_customer_gateway(conn.customer_gateway_id) else {
                debug!(connection = conn.id, "Connection has no customer gateway");
                continue;
            };
            let mut transition = None;
            let result = ctx.repos.vpn.with_connection_locked(
                conn.id,
                &mut |locked: &mut Site2SiteVpnConnection| {
                    if !is_probed(locked.state) {
                        return;
                    }
                    let from = locked.state;
                    locked.state = probed_state(&gateway, &connected);
                    if from != locked.state {
                        transition = Some((from, locked.state));
                    }
                },
            );
            if let Err(e) = result {
                warn!(connection = conn.id, error = %e, "Unable to acquire lock on vpn connection");
                continue;
            }
            if let Some((from, to)) = transition {
                info!(
                    connection = conn.id,
                    gateway = %gateway.name,
                    %from,
                    %to,
                    "Site-to-site vpn connection changed state"
                );
                ctx.alerts
                    .send_alert(transition_alert(router, &gateway, from, to));
            }
        }
    }
}
