use crate::context::RouterContext;
use crate::resolve::router_addressing;
use tracing::{debug, info, warn};
use vrm_core::Result;
use vrm_monitor_core::{plan_router_alerts, AlertPoll};
use vrm_proto::{Command, CommandBody};
use vrm_shared::{Router, RouterAlertCheckpoint, ALERT_EPOCH};

/// Collects monitoring-service alerts raised inside routers
#[derive(Clone)]
pub struct AlertPoller {
    ctx: RouterContext,
}

impl AlertPoller {
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }

    /// One pass of the router alerts task
    pub async fn poll_alerts(&self) {
        let routers = self
            .ctx
            .repos
            .routers
            .list_running_by_management_server(self.ctx.config.management_server_id);

        for router in routers {
            if router.vpc_id.is_some() {
                continue;
            }
            if !self.ctx.config.service_monitoring_for_zone(router.zone_id) {
                continue;
            }
            if let Err(e) = self.poll_router(&router).await {
                warn!(router = %router.instance_name, error = %e, "Error while collecting alerts from router");
            }
        }
    }

    async fn poll_router(&self, router: &Router) -> Result<()> {
        let Some(host_id) = router.host_id else {
            return Ok(());
        };
        let previous = self
            .ctx
            .repos
            .checkpoints
            .find_checkpoint(router.id)
            .map(|checkpoint| checkpoint.last_alert_timestamp)
            .unwrap_or_else(|| ALERT_EPOCH.to_string());

        let details = router_addressing(&self.ctx.repos, router, None)?.access_details()?;
        let cmd = Command::new(CommandBody::GetRouterAlerts {
            previous_alert_timestamp: previous,
        })
        .with_access(details);
        let Some(answer) = self.ctx.transport.easy_send(host_id, cmd).await else {
            warn!(router = %router.instance_name, "Unable to get alerts from router");
            return Ok(());
        };

        match plan_router_alerts(router, &answer) {
            AlertPoll::Nothing => {
                debug!(router = %router.instance_name, "No new alerts from router");
            }
            AlertPoll::InvalidTimestamp(raw) => {
                warn!(
                    router = %router.instance_name,
                    timestamp = raw.as_deref().unwrap_or("none"),
                    "Router returned an unparseable alert timestamp, skipping"
                );
            }
            AlertPoll::Emit { alerts, checkpoint } => {
                let count = alerts.len();
                for alert in alerts {
                    self.ctx.alerts.send_alert(alert);
                    self.ctx.metrics.router_alerts_emitted.inc();
                }
                self.ctx.repos.checkpoints.save_checkpoint(RouterAlertCheckpoint {
                    router_id: router.id,
                    router_name: router.instance_name.clone(),
                    last_alert_timestamp: checkpoint,
                })?;
                info!(router = %router.instance_name, count, "Router alerts forwarded");
            }
        }
        Ok(())
    }
}
