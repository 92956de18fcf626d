use crate::alert_poller::AlertPoller;
use crate::applicator::RuleApplicator;
use crate::context::RouterContext;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::LifecycleController;
use crate::reconciler::RedundancyReconciler;
use crate::scheduler::{delay_to_next_boundary, spawn_periodic, spawn_periodic_after};
use crate::usage_poller::UsagePoller;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vrm_core::{ClusterLock, NetworkOrchestrator, Result, VmManager};
use vrm_shared::{HostId, Router, RouterId};

/// Entry point wiring every router manager component around one context
pub struct RouterManager {
    ctx: RouterContext,
    applicator: RuleApplicator,
    lifecycle: LifecycleController,
    reconciler: RedundancyReconciler,
    usage: UsagePoller,
    alerts: AlertPoller,
    lock: Arc<dyn ClusterLock>,
}

/// Handles of the running background tasks
pub struct BackgroundTasks {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Stop scheduling new runs and wait for in-flight ones to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Background tasks stopped");
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl RouterManager {
    pub fn new(
        ctx: RouterContext,
        vms: Arc<dyn VmManager>,
        orchestrator: Arc<dyn NetworkOrchestrator>,
        lock: Arc<dyn ClusterLock>,
    ) -> Self {
        let dispatcher = Dispatcher::new(ctx.clone());
        let applicator = RuleApplicator::new(ctx.clone(), dispatcher.clone());
        let lifecycle = LifecycleController::new(ctx.clone(), dispatcher, vms, orchestrator);
        let reconciler = RedundancyReconciler::new(ctx.clone(), Arc::new(lifecycle.clone()));
        Self {
            usage: UsagePoller::new(ctx.clone()),
            alerts: AlertPoller::new(ctx.clone()),
            ctx,
            applicator,
            lifecycle,
            reconciler,
            lock,
        }
    }

    pub fn context(&self) -> &RouterContext {
        &self.ctx
    }

    pub fn rules(&self) -> &RuleApplicator {
        &self.applicator
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn reconciler(&self) -> &RedundancyReconciler {
        &self.reconciler
    }

    pub async fn start_router(&self, router_id: RouterId, reprogram: bool) -> Result<Router> {
        self.lifecycle.start_router(router_id, reprogram).await
    }

    pub async fn stop_router(&self, router_id: RouterId, forced: bool) -> Result<Router> {
        self.lifecycle.stop_router(router_id, forced).await
    }

    pub async fn reboot_router(&self, router_id: RouterId, reprogram: bool) -> Result<Router> {
        self.lifecycle.reboot(router_id, reprogram).await
    }

    pub async fn on_host_connected(&self, host_id: HostId) -> usize {
        self.lifecycle.on_host_connected(host_id).await
    }

    /// Start the router check, usage, aggregation and alert tasks
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let config = self.ctx.config.clone();
        let shutdown = CancellationToken::new();
        let (queue, mut handles) = self.reconciler.spawn_workers();

        let reconciler = self.reconciler.clone();
        handles.push(spawn_periodic(
            "router-check",
            Duration::from_secs(config.router_check_interval_secs),
            shutdown.clone(),
            move || {
                let reconciler = reconciler.clone();
                let queue = queue.clone();
                async move {
                    reconciler.check_routers(&queue).await;
                    Ok(())
                }
            },
        ));

        let usage = self.usage.clone();
        handles.push(spawn_periodic(
            "network-usage",
            Duration::from_secs(config.network_stats_interval_secs),
            shutdown.clone(),
            move || {
                let usage = usage.clone();
                async move {
                    usage.collect_usage().await;
                    Ok(())
                }
            },
        ));

        let usage = self.usage.clone();
        let lock = self.lock.clone();
        let range = config.usage_aggregation_range_minutes;
        handles.push(spawn_periodic_after(
            "network-stats-aggregation",
            delay_to_next_boundary(Utc::now(), range),
            Duration::from_secs(range * 60),
            shutdown.clone(),
            move || {
                let usage = usage.clone();
                let lock = lock.clone();
                async move { usage.aggregate_stats(lock.as_ref()).await.map(|_| ()) }
            },
        ));

        let alerts = self.alerts.clone();
        handles.push(spawn_periodic(
            "router-alerts",
            Duration::from_secs(config.router_alerts_check_interval_secs),
            shutdown.clone(),
            move || {
                let alerts = alerts.clone();
                async move {
                    alerts.poll_alerts().await;
                    Ok(())
                }
            },
        ));

        info!(
            workers = config.rvr_status_update_pool_size,
            management_server_id = config.management_server_id,
            "Router manager background tasks started"
        );
        BackgroundTasks { shutdown, handles }
    }
}
