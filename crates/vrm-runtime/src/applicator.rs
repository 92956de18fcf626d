//! Rule application across the virtual routers of a guest network.
//!
//! Every public `apply_*` operation builds a batch per router and hands it to
//! the [`Dispatcher`]; routers that cannot be reached are collected and, for
//! a redundant pair, handed to the single-working takeover.

use crate::context::RouterContext;
use crate::dispatcher::{all_succeeded, Dispatcher};
use crate::resolve::{network_ips, router_addressing};
use tracing::{debug, error, info, warn};
use vrm_builder::{
    add_create_ip_alias, add_delete_ip_alias, add_dhcp_entry, add_firewall_rules, add_ip_assoc,
    add_load_balancer_config, add_port_forwarding_rules, add_remote_access_vpn,
    add_static_nat_rules, add_static_nats, add_vm_data, add_vpn_users, BuildError,
    RouterAddressing,
};
use vrm_core::{Result, VrmError};
use vrm_monitor_core::{plan_single_working, BumpDecision, SingleWorkingPlan};
use vrm_proto::{Command, CommandBody, Commands, DhcpRangeTo, IpAliasTo, OnError};
use vrm_shared::{
    FirewallRule, LoadBalancingRule, Network, NetworkId, Nic, PortForwardingRule, PublicIp,
    RemoteAccessVpn, Router, RouterRole, StaticNat, StaticNatRule, UserVm, VmState, VpnUser,
    ZoneNetworkType,
};

#[derive(Clone)]
pub struct RuleApplicator {
    ctx: RouterContext,
    dispatcher: Dispatcher,
}

impl RuleApplicator {
    pub fn new(ctx: RouterContext, dispatcher: Dispatcher) -> Self {
        Self { ctx, dispatcher }
    }

    fn network(&self, network_id: NetworkId) -> Result<Network> {
        self.ctx
            .repos
            .networks
            .find_network(network_id)
            .ok_or_else(|| VrmError::not_found("network", network_id))
    }

    fn host_is_up(&self, router: &Router) -> bool {
        router
            .host_id
            .and_then(|id| self.ctx.repos.hosts.find_host(id))
            .map(|host| host.is_up())
            .unwrap_or(false)
    }

    fn is_basic_zone(&self, router: &Router) -> bool {
        self.ctx
            .repos
            .networks
            .find_zone(router.zone_id)
            .map(|zone| zone.network_type == ZoneNetworkType::Basic)
            .unwrap_or(false)
    }

    /// Build and send a batch to every virtual router of the network
    pub async fn apply_rules<F>(&self, network_id: NetworkId, what: &str, build: F) -> Result<()>
    where
        F: Fn(&RouterAddressing, &mut Commands) -> std::result::Result<(), BuildError>
            + Send
            + Sync,
    {
        let routers = self
            .ctx
            .repos
            .routers
            .list_by_network_and_role(network_id, RouterRole::VirtualRouter);
        if routers.is_empty() {
            return Err(VrmError::ResourceUnavailable(format!(
                "unable to apply {}: no virtual router in network {}",
                what, network_id
            )));
        }

        let mut connected = Vec::new();
        let mut disconnected = Vec::new();
        let mut last_failure = String::new();

        for router in routers {
            match router.state {
                VmState::Running => {}
                VmState::Stopped | VmState::Stopping => {
                    debug!(
                        router = %router.instance_name,
                        state = ?router.state,
                        "Router is not running, {} will be applied on start",
                        what
                    );
                    continue;
                }
                state => {
                    warn!(router = %router.instance_name, ?state, "Unable to apply {}", what);
                    return Err(VrmError::ResourceUnavailable(format!(
                        "unable to apply {} on router {} in state {:?}",
                        what, router.instance_name, state
                    )));
                }
            }

            if router.stop_pending {
                if self.host_is_up(&router) {
                    return Err(VrmError::ResourceUnavailable(format!(
                        "router {} is pending stop but was not stopped after its host came back",
                        router.instance_name
                    )));
                }
                debug!(
                    router = %router.instance_name,
                    "Router is pending stop, not sending {}",
                    what
                );
                continue;
            }

            let addr = router_addressing(&self.ctx.repos, &router, Some(network_id))?;
            let mut cmds = Commands::new(OnError::Stop);
            build(&addr, &mut cmds)?;
            if cmds.is_empty() {
                connected.push(router);
                continue;
            }

            match self.dispatcher.apply(&router, &cmds, what).await {
                Ok(()) => connected.push(router),
                Err(VrmError::AgentUnavailable { host_id, reason }) => {
                    warn!(
                        router = %router.instance_name,
                        host_id,
                        %reason,
                        "Unable to apply {}, agent unavailable",
                        what
                    );
                    last_failure = reason;
                    disconnected.push(router);
                }
                Err(e) => return Err(e),
            }
        }

        if !connected.is_empty() {
            let redundant_disconnect = disconnected
                .first()
                .map(|router: &Router| router.is_redundant)
                .unwrap_or(false);
            if redundant_disconnect && !self.is_basic_zone(&connected[0]) {
                let reason = format!("unable to apply {}: {}", what, last_failure);
                self.handle_single_working(&connected, &disconnected, &reason)
                    .await;
            }
        } else if let Some(first) = disconnected.first() {
            return Err(VrmError::AgentUnavailable {
                host_id: first.host_id.unwrap_or_default(),
                reason: format!("unable to apply {} on any router: {}", what, last_failure),
            });
        }
        Ok(())
    }

    /// Let the surviving member of a redundant pair take over.
    ///
    /// Never fails the caller: the rules already reached the connected router.
    pub async fn handle_single_working(
        &self,
        connected: &[Router],
        disconnected: &[Router],
        reason: &str,
    ) {
        let plan = match plan_single_working(connected, disconnected, reason) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Cannot hand over to the single working router");
                return;
            }
        };
        let SingleWorkingPlan::Handle {
            connected,
            mut disconnected,
            bump,
            alert,
        } = plan
        else {
            warn!(
                connected = connected.len(),
                disconnected = disconnected.len(),
                "More than one redundant router connected or disconnected, not handling"
            );
            return;
        };

        self.ctx.alerts.send_alert(alert);
        disconnected.stop_pending = true;
        if let Err(e) = self.ctx.repos.routers.update_router(&disconnected) {
            error!(router = %disconnected.instance_name, error = %e, "Failed to mark router stop pending");
        }

        match bump {
            BumpDecision::Bump => self.bump_priority(connected).await,
            BumpDecision::AlreadyBumped => {
                info!(router = %connected.instance_name, "Priority already bumped, not bumping twice");
            }
            BumpDecision::NotNeeded => {}
        }
    }

    async fn bump_priority(&self, mut router: Router) {
        let details = match router_addressing(&self.ctx.repos, &router, None)
            .and_then(|addr| addr.access_details().map_err(VrmError::from))
        {
            Ok(details) => details,
            Err(e) => {
                error!(router = %router.instance_name, error = %e, "Cannot address router for priority bump");
                return;
            }
        };
        let cmds = Commands::single(Command::new(CommandBody::BumpUpPriority).with_access(details));
        match self.dispatcher.exchange(&router, &cmds).await {
            Ok(answers) if all_succeeded(&cmds, &answers) => {
                router.is_priority_bumped = true;
                match self.ctx.repos.routers.update_router(&router) {
                    Ok(()) => info!(router = %router.instance_name, "Bumped up router priority"),
                    Err(e) => error!(router = %router.instance_name, error = %e, "Failed to persist priority bump"),
                }
            }
            Ok(_) => error!(router = %router.instance_name, "Fail to bump up priority, router rejected it"),
            Err(e) => error!(router = %router.instance_name, error = %e, "Fail to bump up priority"),
        }
    }

    pub async fn apply_firewall_rules(
        &self,
        network_id: NetworkId,
        rules: &[FirewallRule],
    ) -> Result<()> {
        let network = self.network(network_id)?;
        let ips = network_ips(&self.ctx.repos, network_id);
        self.apply_rules(network_id, "firewall rules", |addr, cmds| {
            add_firewall_rules(cmds, addr, rules, &ips, network.egress_default_allow)
        })
        .await
    }

    pub async fn apply_port_forwarding_rules(
        &self,
        network_id: NetworkId,
        rules: &[PortForwardingRule],
    ) -> Result<()> {
        let ips = network_ips(&self.ctx.repos, network_id);
        self.apply_rules(network_id, "port forwarding rules", |addr, cmds| {
            add_port_forwarding_rules(cmds, addr, rules, &ips)
        })
        .await
    }

    pub async fn apply_static_nat_rules(
        &self,
        network_id: NetworkId,
        rules: &[StaticNatRule],
    ) -> Result<()> {
        let ips = network_ips(&self.ctx.repos, network_id);
        self.apply_rules(network_id, "static nat rules", |addr, cmds| {
            add_static_nat_rules(cmds, addr, rules, &ips)
        })
        .await
    }

    pub async fn apply_static_nats(&self, network_id: NetworkId, nats: &[StaticNat]) -> Result<()> {
        let ips = network_ips(&self.ctx.repos, network_id);
        self.apply_rules(network_id, "static nat", |addr, cmds| {
            add_static_nats(cmds, addr, nats, &ips)
        })
        .await
    }

    pub async fn apply_load_balancing_rules(
        &self,
        network_id: NetworkId,
        rules: &[LoadBalancingRule],
    ) -> Result<()> {
        let ips = network_ips(&self.ctx.repos, network_id);
        self.apply_rules(network_id, "load balancing rules", |addr, cmds| {
            add_load_balancer_config(cmds, addr, rules, &ips)
        })
        .await
    }

    pub async fn associate_ips(&self, network_id: NetworkId, ips: &[PublicIp]) -> Result<()> {
        if ips.is_empty() {
            return Ok(());
        }
        self.apply_rules(network_id, "ip associations", |addr, cmds| {
            add_ip_assoc(cmds, addr, ips)
        })
        .await
    }

    pub async fn apply_vpn_users(&self, network_id: NetworkId, users: &[VpnUser]) -> Result<()> {
        self.apply_rules(network_id, "vpn users", |addr, cmds| {
            add_vpn_users(cmds, addr, users)
        })
        .await
    }

    pub async fn start_remote_access_vpn(
        &self,
        network_id: NetworkId,
        vpn: &RemoteAccessVpn,
    ) -> Result<()> {
        self.remote_access_vpn(network_id, vpn, true).await
    }

    pub async fn stop_remote_access_vpn(
        &self,
        network_id: NetworkId,
        vpn: &RemoteAccessVpn,
    ) -> Result<()> {
        self.remote_access_vpn(network_id, vpn, false).await
    }

    async fn remote_access_vpn(
        &self,
        network_id: NetworkId,
        vpn: &RemoteAccessVpn,
        create: bool,
    ) -> Result<()> {
        let network = self.network(network_id)?;
        let server_ip = self
            .ctx
            .repos
            .rules
            .find_public_ip(vpn.server_ip_id)
            .ok_or_else(|| VrmError::not_found("public ip", vpn.server_ip_id))?
            .address;
        let users = self.ctx.repos.rules.list_vpn_users_by_account(vpn.account_id);
        let what = if create {
            "remote access vpn start"
        } else {
            "remote access vpn stop"
        };
        self.apply_rules(network_id, what, |addr, cmds| {
            add_remote_access_vpn(
                cmds,
                addr,
                vpn,
                server_ip,
                &users,
                create,
                network.cidr.clone(),
            )
        })
        .await
    }

    pub async fn apply_dhcp_entry(&self, network_id: NetworkId, vm: &UserVm, nic: &Nic) -> Result<()> {
        let default_dns = self
            .network(network_id)
            .ok()
            .and_then(|network| self.ctx.repos.networks.find_zone(network.zone_id))
            .and_then(|zone| zone.dns1);
        self.apply_rules(network_id, "dhcp entry", |addr, cmds| {
            add_dhcp_entry(cmds, addr, vm, nic, default_dns)
        })
        .await
    }

    pub async fn apply_user_data(&self, network_id: NetworkId, vm: &UserVm, nic: &Nic) -> Result<()> {
        self.apply_rules(network_id, "user data", |addr, cmds| {
            add_vm_data(cmds, addr, vm, nic)
        })
        .await
    }

    /// Serve DHCP on extra subnets through IP aliases
    pub async fn configure_dhcp_alias(
        &self,
        network_id: NetworkId,
        aliases: Vec<IpAliasTo>,
        ranges: Vec<DhcpRangeTo>,
    ) -> Result<()> {
        self.apply_rules(network_id, "dhcp ip alias", |addr, cmds| {
            add_create_ip_alias(cmds, addr, aliases.clone(), ranges.clone())
        })
        .await
    }

    pub async fn remove_dhcp_alias(
        &self,
        network_id: NetworkId,
        revoked: Vec<IpAliasTo>,
        active: Vec<IpAliasTo>,
        ranges: Vec<DhcpRangeTo>,
    ) -> Result<()> {
        self.apply_rules(network_id, "dhcp ip alias removal", |addr, cmds| {
            add_delete_ip_alias(cmds, addr, revoked.clone(), active.clone(), ranges.clone())
        })
        .await
    }
}
