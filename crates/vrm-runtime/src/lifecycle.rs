//! Router VM lifecycle: start with full re-programming, stop, reboot, and
//! the reactions to out-of-band power-on and host reconnects.

use crate::context::RouterContext;
use crate::dispatcher::{all_succeeded, failure_detail, Dispatcher};
use crate::resolve::{network_snapshot, router_addressing};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vrm_builder::{build_start_sequence, cleanup_commands, BuildError, VERSION_COMMAND_NAME};
use vrm_core::{NetworkOrchestrator, Result, VmManager, VrmError};
use vrm_monitor_core::updated_priority;
use vrm_proto::{AnswerPayload, Command, CommandBody, Commands, PvlanOp};
use vrm_shared::{HostId, NetworkId, Router, RouterId, RouterRole, TrafficType, VmState};

/// Reboot primitive used by the redundancy reconciler
#[async_trait]
pub trait RouterRebooter: Send + Sync {
    async fn reboot_router(&self, router_id: RouterId, reprogram: bool) -> Result<Router>;
}

#[derive(Clone)]
pub struct LifecycleController {
    ctx: RouterContext,
    dispatcher: Dispatcher,
    vms: Arc<dyn VmManager>,
    orchestrator: Arc<dyn NetworkOrchestrator>,
}

impl LifecycleController {
    pub fn new(
        ctx: RouterContext,
        dispatcher: Dispatcher,
        vms: Arc<dyn VmManager>,
        orchestrator: Arc<dyn NetworkOrchestrator>,
    ) -> Self {
        Self {
            ctx,
            dispatcher,
            vms,
            orchestrator,
        }
    }

    fn find(&self, router_id: RouterId) -> Result<Router> {
        self.ctx
            .repos
            .routers
            .find_router(router_id)
            .ok_or_else(|| VrmError::not_found("router", router_id))
    }

    /// Start a router; a router already Running is returned untouched
    pub async fn start_router(&self, router_id: RouterId, reprogram: bool) -> Result<Router> {
        let mut router = self.find(router_id)?;
        let networks = self.ctx.repos.routers.router_networks(router_id);

        for &network_id in &networks {
            if !self.orchestrator.start_network(network_id).await? {
                return Err(VrmError::ResourceUnavailable(format!(
                    "unable to start network {} of router {}",
                    network_id, router.instance_name
                )));
            }
        }

        if router.is_running() {
            debug!(router = %router.instance_name, "Router already running");
            return Ok(router);
        }

        if router.is_redundant {
            self.refresh_priority(&mut router, &networks)?;
        }

        self.vms.advance_start(router_id).await?;
        let router = self.find(router_id)?;
        if !router.is_running() {
            return Err(VrmError::Operation(format!(
                "router {} did not reach Running, state is {:?}",
                router.instance_name, router.state
            )));
        }
        info!(router = %router.instance_name, reprogram, "Router VM started");

        if !reprogram {
            return Ok(router);
        }
        match self.finalize_start(router).await {
            Ok(router) => Ok(router),
            Err(e) => {
                error!(router_id, error = %e, "Failed to program router after start, stopping it");
                if let Err(stop_err) = self.vms.advance_stop(router_id, true).await {
                    error!(router_id, error = %stop_err, "Failed to stop router after failed start");
                }
                Err(e)
            }
        }
    }

    fn refresh_priority(&self, router: &mut Router, networks: &[NetworkId]) -> Result<()> {
        let Some(&network_id) = networks.first() else {
            return Ok(());
        };
        let peers = self
            .ctx
            .repos
            .routers
            .list_by_network_and_role(network_id, RouterRole::VirtualRouter);
        router.priority = updated_priority(network_id, &peers, Some(router.id))?;
        router.is_priority_bumped = false;
        self.ctx.repos.routers.update_router(router)?;
        debug!(router = %router.instance_name, priority = router.priority, "Recomputed redundant router priority");
        Ok(())
    }

    /// Re-apply every piece of network state to a freshly started router
    async fn finalize_start(&self, mut router: Router) -> Result<Router> {
        self.setup_pvlan(&router, PvlanOp::Add).await?;

        let addressing = router_addressing(&self.ctx.repos, &router, None)?;
        let snapshots = self
            .ctx
            .repos
            .routers
            .router_networks(router.id)
            .into_iter()
            .map(|network_id| network_snapshot(&self.ctx.repos, &router, network_id))
            .collect::<Result<Vec<_>>>()?;
        let sequence = build_start_sequence(&addressing, &snapshots)?;

        let delivered = self.dispatcher.exchange(&router, &sequence.commands).await;
        let answers = match delivered {
            Ok(answers) if all_succeeded(&sequence.commands, &answers) => answers,
            outcome => {
                self.cleanup_brackets(&router, &sequence.bracketed).await;
                return Err(match outcome {
                    Ok(answers) => VrmError::RuleApplication {
                        router: router.instance_name.clone(),
                        what: "start sequence".to_string(),
                        detail: failure_detail(&sequence.commands, &answers),
                    },
                    Err(e) => e,
                });
            }
        };

        if let Some(answer) = sequence.commands.answer_for(VERSION_COMMAND_NAME, &answers) {
            if let AnswerPayload::GetDomRVersion {
                template_version,
                scripts_version,
            } = &answer.payload
            {
                router.template_version = Some(template_version.clone());
                router.scripts_version = Some(scripts_version.clone());
                self.ctx.repos.routers.update_router(&router)?;
            }
        }
        info!(
            router = %router.instance_name,
            commands = sequence.commands.len(),
            "Router programmed after start"
        );
        Ok(router)
    }

    async fn cleanup_brackets(&self, router: &Router, bracketed: &[vrm_builder::RouterAddressing]) {
        if bracketed.is_empty() {
            return;
        }
        let cmds = match cleanup_commands(bracketed) {
            Ok(cmds) => cmds,
            Err(e) => {
                warn!(router = %router.instance_name, error = %e, "Cannot build aggregation cleanup");
                return;
            }
        };
        if let Err(e) = self.dispatcher.exchange(router, &cmds).await {
            warn!(router = %router.instance_name, error = %e, "Aggregation cleanup failed");
        }
    }

    /// Tell the host about DHCP on private VLAN guest networks
    async fn setup_pvlan(&self, router: &Router, op: PvlanOp) -> Result<()> {
        let nics = self.ctx.repos.networks.list_nics_by_vm(router.id);
        for nic in nics.iter().filter(|nic| nic.traffic_type == TrafficType::Guest) {
            let Some(network) = self.ctx.repos.networks.find_network(nic.network_id) else {
                continue;
            };
            let Some(private_vlan) = network.private_vlan.clone() else {
                continue;
            };
            let (Some(dhcp_ip), Some(dhcp_mac)) = (nic.ip4, nic.mac.clone()) else {
                return Err(BuildError::IncompleteNic {
                    nic_id: nic.id,
                    vm: router.instance_name.clone(),
                }
                .into());
            };
            let cmds = Commands::single(Command::new(CommandBody::PvlanSetup {
                op,
                network_tag: network.broadcast_uri.clone(),
                private_vlan,
                dhcp_name: router.instance_name.clone(),
                dhcp_mac,
                dhcp_ip,
            }));
            self.dispatcher.apply(router, &cmds, "pvlan setup").await?;
        }
        Ok(())
    }

    /// Stop a router and clear its stop-pending flag
    pub async fn stop_router(&self, router_id: RouterId, forced: bool) -> Result<Router> {
        let router = self.find(router_id)?;
        if router.is_running() {
            if let Err(e) = self.setup_pvlan(&router, PvlanOp::Delete).await {
                warn!(router = %router.instance_name, error = %e, "Failed to remove pvlan setup");
            }
        }

        self.vms.advance_stop(router_id, forced).await?;
        let mut router = self.find(router_id)?;
        if router.stop_pending {
            router.stop_pending = false;
            self.ctx.repos.routers.update_router(&router)?;
        }
        info!(router = %router.instance_name, forced, "Router stopped");
        Ok(router)
    }

    /// Stop then start; a failed start leaves the router Stopped
    pub async fn reboot(&self, router_id: RouterId, reprogram: bool) -> Result<Router> {
        let router = self.find(router_id)?;
        if !router.is_running() {
            return Err(VrmError::InvalidParameter(format!(
                "router {} is {:?}, only a Running router can be rebooted",
                router.instance_name, router.state
            )));
        }

        info!(router = %router.instance_name, "Rebooting router");
        self.stop_router(router_id, false).await?;
        self.start_router(router_id, reprogram).await.map_err(|e| {
            VrmError::Operation(format!(
                "router {} stopped but failed to start again: {}",
                router.instance_name, e
            ))
        })
    }

    /// React to the hypervisor reporting a router's power state.
    ///
    /// A router found running while it is recorded as Stopped was started
    /// behind our back, so its rules cannot be trusted: it is marked Running
    /// and rebooted after a short delay.
    pub fn on_power_state_report(&self, router_id: RouterId, running: bool) -> Option<JoinHandle<()>> {
        if !running {
            return None;
        }
        let mut router = self.ctx.repos.routers.find_router(router_id)?;
        if router.state != VmState::Stopped {
            return None;
        }

        warn!(router = %router.instance_name, "Router powered on out of band, scheduling reboot");
        router.state = VmState::Running;
        if let Err(e) = self.ctx.repos.routers.update_router(&router) {
            error!(router = %router.instance_name, error = %e, "Failed to record out of band power on");
            return None;
        }

        let controller = self.clone();
        let delay = Duration::from_millis(self.ctx.config.out_of_band_reboot_delay_ms);
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = controller.reboot(router_id, true).await {
                error!(router_id, error = %e, "Reboot after out of band power on failed");
            }
        }))
    }

    /// Stop every stop-pending router of a host that just reconnected
    pub async fn on_host_connected(&self, host_id: HostId) -> usize {
        let mut stopped = 0;
        for mut router in self.ctx.repos.routers.list_isolated_by_host(Some(host_id)) {
            if !router.stop_pending {
                continue;
            }
            if matches!(router.state, VmState::Stopped | VmState::Destroyed) {
                router.stop_pending = false;
                if let Err(e) = self.ctx.repos.routers.update_router(&router) {
                    error!(router = %router.instance_name, error = %e, "Failed to clear stop pending");
                }
                continue;
            }

            info!(router = %router.instance_name, host_id, "Stopping stop-pending router on reconnected host");
            match self.stop_router(router.id, true).await {
                Ok(_) => stopped += 1,
                Err(e) => error!(router = %router.instance_name, error = %e, "Failed to stop pending router"),
            }
        }
        stopped
    }
}

#[async_trait]
impl RouterRebooter for LifecycleController {
    async fn reboot_router(&self, router_id: RouterId, reprogram: bool) -> Result<Router> {
        self.reboot(router_id, reprogram).await
    }
}
