//! Redundancy state reconciliation.
//!
//! The periodic check enqueues every redundant network onto a bounded queue;
//! a fixed pool of workers drains it, one network at a time. Each pair is
//! reconciled only by the management server owning the host of its
//! lower-id router.

use crate::context::RouterContext;
use crate::lifecycle::RouterRebooter;
use crate::resolve::router_addressing;
use crate::vpn_monitor::update_site2site_vpn_state;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vrm_core::Result;
use vrm_monitor_core::{
    apply_observation, duplicate_master_alerts, find_duplicate_masters, master_transition_alert,
    observe, pair_owner, recovery_alert, sanity_violation, PairKey,
};
use vrm_proto::{Command, CommandBody};
use vrm_shared::{NetworkId, Router, RouterRole};

/// Producer side of the reconcile queue
#[derive(Clone)]
pub struct ReconcileQueue {
    tx: mpsc::Sender<NetworkId>,
    enqueue_timeout: Duration,
    ctx: RouterContext,
}

impl ReconcileQueue {
    /// Offer a network to the workers, giving up after the enqueue timeout
    pub async fn enqueue(&self, network_id: NetworkId) -> bool {
        match self.tx.send_timeout(network_id, self.enqueue_timeout).await {
            Ok(()) => true,
            Err(_) => {
                self.ctx.metrics.reconcile_queue_drops.inc();
                warn!(
                    network_id,
                    "Cannot insert into virtual router update queue; adjust the pool size or check interval"
                );
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct RedundancyReconciler {
    ctx: RouterContext,
    rebooter: Arc<dyn RouterRebooter>,
}

impl RedundancyReconciler {
    pub fn new(ctx: RouterContext, rebooter: Arc<dyn RouterRebooter>) -> Self {
        Self { ctx, rebooter }
    }

    /// Create the queue and start the worker pool draining it
    pub fn spawn_workers(&self) -> (ReconcileQueue, Vec<JoinHandle<()>>) {
        let pool_size = self.ctx.config.rvr_status_update_pool_size.max(1);
        let (tx, rx) = mpsc::channel(pool_size);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..pool_size)
            .map(|worker| {
                let reconciler = self.clone();
                let rx = rx.clone();
                tokio::spawn(async move { reconciler.worker_loop(worker, rx).await })
            })
            .collect();

        let queue = ReconcileQueue {
            tx,
            enqueue_timeout: Duration::from_millis(self.ctx.config.rvr_enqueue_timeout_ms),
            ctx: self.ctx.clone(),
        };
        (queue, workers)
    }

    async fn worker_loop(&self, worker: usize, rx: Arc<Mutex<mpsc::Receiver<NetworkId>>>) {
        loop {
            let next = { rx.lock().await.recv().await };
            let Some(network_id) = next else {
                debug!(worker, "Reconcile queue closed, worker exiting");
                break;
            };
            match AssertUnwindSafe(self.reconcile_network(network_id))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(network_id, error = %e, "Unable to update redundant router status"),
                Err(_) => error!(network_id, "Redundant router status update panicked"),
            }
        }
    }

    /// One pass of the router check task
    pub async fn check_routers(&self, queue: &ReconcileQueue) {
        let routers = self.ctx.repos.routers.list_isolated_by_host(None);
        debug!(count = routers.len(), "Found routers to update status");
        update_site2site_vpn_state(&self.ctx, &routers).await;

        let networks = self.ctx.repos.networks.list_redundant_networks();
        debug!(count = networks.len(), "Found networks to update redundant router status");
        for network in networks {
            queue.enqueue(network.id).await;
        }
    }

    /// Reconcile the redundant pair of one network
    pub async fn reconcile_network(&self, network_id: NetworkId) -> Result<()> {
        let routers = self
            .ctx
            .repos
            .routers
            .list_by_network_and_role(network_id, RouterRole::VirtualRouter);
        if routers.len() != 2 {
            debug!(
                network_id,
                count = routers.len(),
                "Skipping network without exactly two virtual routers"
            );
            return Ok(());
        }

        let Some(owner) = pair_owner(&routers) else {
            return Ok(());
        };
        let Some(host_id) = owner.host_id else {
            debug!(network_id, router = %owner.instance_name, "Skip checking pair, router has no host");
            return Ok(());
        };
        let owned = self
            .ctx
            .repos
            .hosts
            .find_host(host_id)
            .and_then(|host| host.management_server_id)
            == Some(self.ctx.config.management_server_id);
        if !owned {
            debug!(network_id, host_id, "Skip checking pair owned by another management server");
            return Ok(());
        }

        self.ctx.metrics.redundant_pairs_checked.inc();
        let routers = self.update_redundant_states(routers).await;
        self.check_duplicate_master(&routers);
        self.check_sanity(&routers).await;
        Ok(())
    }

    fn host_is_up(&self, router: &Router) -> bool {
        router
            .host_id
            .and_then(|id| self.ctx.repos.hosts.find_host(id))
            .map(|host| host.is_up())
            .unwrap_or(false)
    }

    async fn probe(&self, router: &Router) -> Option<vrm_proto::Answer> {
        let host_id = router.host_id?;
        let details = match router_addressing(&self.ctx.repos, router, None) {
            Ok(addr) => addr.access_details().ok()?,
            Err(e) => {
                warn!(router = %router.instance_name, error = %e, "Cannot address router");
                return None;
            }
        };
        let cmd = Command::new(CommandBody::CheckRouter)
            .with_access(details)
            .with_wait(self.ctx.config.check_router_wait_secs);
        self.ctx.transport.easy_send(host_id, cmd).await
    }

    /// Refresh each router's live redundancy state and persist changes
    pub async fn update_redundant_states(&self, routers: Vec<Router>) -> Vec<Router> {
        let mut updated = Vec::with_capacity(routers.len());
        for mut router in routers {
            if !router.is_redundant {
                updated.push(router);
                continue;
            }
            let host_up = self.host_is_up(&router);
            let answer = if router.is_running() && host_up {
                self.probe(&router).await
            } else {
                None
            };
            let obs = observe(&router, host_up, answer.as_ref());
            let result = apply_observation(&mut router, obs);

            if result.persist {
                if let Err(e) = self.ctx.repos.routers.update_router(&router) {
                    error!(router = %router.instance_name, error = %e, "Failed to persist redundant state");
                }
            }
            if let Some(change) = result.change {
                info!(
                    router = %router.instance_name,
                    from = %change.from,
                    to = %change.to,
                    "Redundant virtual router changed state"
                );
                if change.raises_alert() {
                    self.ctx
                        .alerts
                        .send_alert(master_transition_alert(&router, change));
                }
            }
            updated.push(router);
        }
        updated
    }

    pub fn check_duplicate_master(&self, routers: &[Router]) {
        let keyed: Vec<(PairKey, Router)> = routers
            .iter()
            .filter_map(|router| {
                let networks = self.ctx.repos.routers.router_networks(router.id);
                PairKey::of(router, &networks).map(|key| (key, router.clone()))
            })
            .collect();

        for (duplicate, first) in find_duplicate_masters(&keyed) {
            self.ctx.metrics.duplicate_masters.inc();
            warn!(
                router = %duplicate.instance_name,
                other = %first.instance_name,
                "Duplicate MASTER detected in redundant router pair"
            );
            for alert in duplicate_master_alerts(&duplicate, &first) {
                self.ctx.alerts.send_alert(alert);
            }
        }
    }

    /// Reboot the backup of a pair whose priorities drifted; the master is never touched
    pub async fn check_sanity(&self, routers: &[Router]) {
        let Some((master, backup)) = sanity_violation(routers) else {
            return;
        };
        if !(master.is_running() && backup.is_running()) {
            return;
        }
        if !(self.host_is_up(&master) && self.host_is_up(&backup)) {
            debug!(
                router = %backup.instance_name,
                "Pair out of sync but a host is down, not recovering"
            );
            return;
        }

        warn!(
            master = %master.instance_name,
            backup = %backup.instance_name,
            master_priority = master.priority,
            backup_priority = backup.priority,
            "Redundant router pair out of sync, rebooting backup"
        );
        self.ctx.alerts.send_alert(recovery_alert(&backup));
        self.ctx.metrics.backup_reboots.inc();
        if let Err(e) = self.rebooter.reboot_router(backup.id, true).await {
            error!(router = %backup.instance_name, error = %e, "Failed to reboot backup router");
        }
    }
}
