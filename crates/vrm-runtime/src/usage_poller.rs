//! Network usage collection and periodic aggregation.

use crate::context::RouterContext;
use crate::resolve::router_addressing;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vrm_core::{ClusterLock, Result, RowUpdate};
use vrm_monitor_core::{fold_usage, UsageFold, UsageReading};
use vrm_proto::{AnswerPayload, Command, CommandBody};
use vrm_shared::{
    GuestType, ManagementServerState, Nic, Router, TrafficType, UsageStatsKey, UserStatistics,
    UserStatsLogEntry, ROUTER_DEVICE_TYPE,
};

/// Name of the cluster lock serialising stats aggregation
pub const STATS_LOCK_NAME: &str = "network.stats";

#[derive(Clone)]
pub struct UsagePoller {
    ctx: RouterContext,
}

impl UsagePoller {
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }

    fn serves_isolated_network(&self, router: &Router) -> bool {
        self.ctx
            .repos
            .routers
            .router_networks(router.id)
            .into_iter()
            .filter_map(|id| self.ctx.repos.networks.find_network(id))
            .any(|network| network.guest_type == GuestType::Isolated)
    }

    /// Nics metered for a router: public ones on VPC routers, isolated guest ones otherwise
    fn metered_nics(&self, router: &Router) -> Vec<Nic> {
        self.ctx
            .repos
            .networks
            .list_nics_by_vm(router.id)
            .into_iter()
            .filter(|nic| {
                if router.vpc_id.is_some() {
                    return nic.traffic_type == TrafficType::Public;
                }
                nic.traffic_type == TrafficType::Guest
                    && self
                        .ctx
                        .repos
                        .networks
                        .find_network(nic.network_id)
                        .map(|network| network.guest_type == GuestType::Isolated)
                        .unwrap_or(false)
            })
            .collect()
    }

    /// One pass of the network usage task
    pub async fn collect_usage(&self) {
        let routers = self
            .ctx
            .repos
            .routers
            .list_running_by_management_server(self.ctx.config.management_server_id);
        debug!(count = routers.len(), "Found running routers to collect usage from");

        for router in routers {
            if !self.serves_isolated_network(&router) {
                continue;
            }
            for nic in self.metered_nics(&router) {
                if let Err(e) = self.collect_nic_usage(&router, &nic).await {
                    warn!(
                        router = %router.instance_name,
                        network_id = nic.network_id,
                        error = %e,
                        "Failed to update network usage"
                    );
                }
            }
        }
    }

    async fn collect_nic_usage(&self, router: &Router, nic: &Nic) -> Result<()> {
        let (Some(host_id), Some(private_ip)) = (router.host_id, router.private_ip) else {
            debug!(router = %router.instance_name, "Router has no host or control address");
            return Ok(());
        };
        let for_vpc = router.vpc_id.is_some();
        let details = router_addressing(&self.ctx.repos, router, Some(nic.network_id))?
            .access_details()?;
        let cmd = Command::new(CommandBody::NetworkUsage {
            private_ip,
            domr_name: router.host_name.clone(),
            for_vpc,
            gateway_ip: if for_vpc { nic.ip4 } else { None },
        })
        .with_access(details);

        let reading = match self.ctx.transport.easy_send(host_id, cmd).await {
            Some(answer) if answer.result => match answer.payload {
                AnswerPayload::NetworkUsage {
                    bytes_sent,
                    bytes_received,
                    ..
                } => UsageReading {
                    bytes_sent,
                    bytes_received,
                },
                _ => {
                    warn!(router = %router.instance_name, "Network usage answer carried no counters");
                    return Ok(());
                }
            },
            Some(answer) => {
                warn!(
                    router = %router.instance_name,
                    detail = answer.details_or(""),
                    "Error while collecting network stats"
                );
                return Ok(());
            }
            None => {
                warn!(router = %router.instance_name, "Unable to send network usage command");
                return Ok(());
            }
        };
        if reading.is_empty() {
            debug!(router = %router.instance_name, "Sent and received bytes are both 0, not updating statistics");
            return Ok(());
        }

        let key = UsageStatsKey {
            account_id: router.account_id,
            zone_id: router.zone_id,
            network_id: nic.network_id,
            public_ip: if for_vpc { nic.ip4 } else { None },
            router_id: router.id,
            device_type: ROUTER_DEVICE_TYPE.to_string(),
        };
        let previous = match self.ctx.repos.usage.find_stats(&key) {
            Some(stats) => stats,
            None => self.ctx.repos.usage.create_stats_if_missing(&key)?,
        };
        let roll_aggregate = !self.ctx.config.is_periodic_aggregation();

        let outcome = self.ctx.repos.usage.with_stats_locked(
            &key,
            &mut |row: &mut UserStatistics| {
                fold_usage(row, Some(&previous), reading, roll_aggregate) == UsageFold::Applied
            },
        )?;
        match outcome {
            RowUpdate::Committed => {
                self.ctx.metrics.usage_answers_applied.inc();
                debug!(
                    router = %router.instance_name,
                    network_id = nic.network_id,
                    sent = reading.bytes_sent,
                    received = reading.bytes_received,
                    "Network usage updated"
                );
            }
            RowUpdate::Discarded => {
                self.ctx.metrics.usage_answers_discarded.inc();
                warn!(
                    router = %router.instance_name,
                    network_id = nic.network_id,
                    "Statistics changed while collecting, discarding this answer"
                );
            }
            RowUpdate::Missing => {
                warn!(router = %router.instance_name, "Unable to find statistics row to update");
            }
        }
        Ok(())
    }

    /// Whether this server is the lowest-id management server currently Up
    pub fn is_primary(&self) -> bool {
        self.ctx
            .repos
            .hosts
            .list_management_servers()
            .into_iter()
            .filter(|ms| ms.state == ManagementServerState::Up)
            .map(|ms| ms.id)
            .min()
            == Some(self.ctx.config.management_server_id)
    }

    /// Roll current deltas into aggregates once per period, cluster-wide
    pub async fn aggregate_stats(&self, lock: &dyn ClusterLock) -> Result<usize> {
        if !self.is_primary() {
            debug!("Not the primary management server, skipping stats aggregation");
            return Ok(0);
        }
        let timeout = Duration::from_secs(self.ctx.config.stats_lock_timeout_secs);
        if !lock.try_lock(STATS_LOCK_NAME, timeout).await {
            debug!("Couldn't get network stats lock");
            return Ok(0);
        }

        let result = self.roll_updated_stats();
        lock.unlock(STATS_LOCK_NAME);
        let rolled = result?;
        info!(rolled, "Network stats aggregated");
        Ok(rolled)
    }

    fn roll_updated_stats(&self) -> Result<usize> {
        let usage = &self.ctx.repos.usage;
        let mut rolled = 0;
        for stats in usage.list_updated_stats() {
            let mut snapshot = None;
            let outcome = usage.with_stats_locked(&stats.key, &mut |row: &mut UserStatistics| {
                row.roll_aggregate();
                snapshot = Some(UserStatsLogEntry::snapshot(row, Utc::now()));
                true
            })?;
            if outcome != RowUpdate::Committed {
                continue;
            }
            if let Some(entry) = snapshot {
                usage.append_stats_log(entry)?;
                rolled += 1;
            }
        }
        Ok(rolled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, running_router, Harness};
    use vrm_core::UsageRepository;
    use vrm_proto::Answer;
    use vrm_shared::{ManagementServer, VmState};
    use vrm_store::MemoryClusterLock;

    fn key() -> UsageStatsKey {
        UsageStatsKey {
            account_id: 2,
            zone_id: 1,
            network_id: 204,
            public_ip: None,
            router_id: 4,
            device_type: ROUTER_DEVICE_TYPE.to_string(),
        }
    }

    fn usage_answer(sent: u64, received: u64) -> Answer {
        Answer::success().with_payload(AnswerPayload::NetworkUsage {
            router_name: "r-4-VM".to_string(),
            bytes_sent: sent,
            bytes_received: received,
        })
    }

    fn seeded() -> Harness {
        let h = harness();
        let mut router = running_router(&h, 4, 1);
        router.account_id = 2;
        h.store.insert_router(router);
        h
    }

    #[tokio::test]
    async fn test_counter_regression_is_folded() {
        let h = seeded();
        let mut stats = UserStatistics::new(1, key());
        stats.current_bytes_received = 100;
        stats.net_bytes_received = 500;
        stats.current_bytes_sent = 100;
        stats.net_bytes_sent = 500;
        h.store.insert_stats(stats);
        h.transport.push_answers(vec![usage_answer(30, 30)]);

        UsagePoller::new(h.ctx.clone()).collect_usage().await;

        let row = h.store.find_stats(&key()).unwrap();
        assert_eq!(row.current_bytes_received, 30);
        assert_eq!(row.net_bytes_received, 600);
        assert_eq!(h.ctx.metrics.usage_answers_applied.get(), 1);
    }

    #[tokio::test]
    async fn test_first_reading_creates_row() {
        let h = seeded();
        h.transport.push_answers(vec![usage_answer(10, 20)]);

        UsagePoller::new(h.ctx.clone()).collect_usage().await;

        let row = h.store.find_stats(&key()).unwrap();
        assert_eq!(row.current_bytes_sent, 10);
        assert_eq!(row.current_bytes_received, 20);
        // daily aggregation leaves the aggregate counters to the stats task
        assert_eq!(row.agg_bytes_received, 0);
    }

    #[tokio::test]
    async fn test_zero_reading_is_ignored() {
        let h = seeded();
        h.transport.push_answers(vec![usage_answer(0, 0)]);

        UsagePoller::new(h.ctx.clone()).collect_usage().await;
        assert!(h.store.find_stats(&key()).is_none());
    }

    #[tokio::test]
    async fn test_stopped_router_not_polled() {
        let h = seeded();
        h.store.set_router_state(4, VmState::Stopped);

        UsagePoller::new(h.ctx.clone()).collect_usage().await;
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_aggregation_rolls_and_logs() {
        let h = seeded();
        let mut stats = UserStatistics::new(1, key());
        stats.current_bytes_received = 30;
        stats.net_bytes_received = 600;
        h.store.insert_stats(stats);
        let lock = MemoryClusterLock::new();

        let rolled = UsagePoller::new(h.ctx.clone())
            .aggregate_stats(&lock)
            .await
            .unwrap();

        assert_eq!(rolled, 1);
        assert_eq!(h.store.find_stats(&key()).unwrap().agg_bytes_received, 630);
        assert_eq!(h.store.stats_log().len(), 1);
        assert!(!lock.is_locked(STATS_LOCK_NAME));
    }

    #[tokio::test]
    async fn test_aggregation_only_on_primary() {
        let h = seeded();
        h.store.insert_management_server(ManagementServer {
            id: 0,
            ..Default::default()
        });
        let mut stats = UserStatistics::new(1, key());
        stats.current_bytes_received = 30;
        h.store.insert_stats(stats);

        let rolled = UsagePoller::new(h.ctx.clone())
            .aggregate_stats(&MemoryClusterLock::new())
            .await
            .unwrap();
        assert_eq!(rolled, 0);
        assert!(h.store.stats_log().is_empty());
    }

    #[tokio::test]
    async fn test_aggregation_skips_when_locked() {
        let h = seeded();
        let lock = MemoryClusterLock::new();
        assert!(lock.try_lock(STATS_LOCK_NAME, Duration::ZERO).await);
        let mut config = (*h.ctx.config).clone();
        config.stats_lock_timeout_secs = 0;
        let mut ctx = h.ctx.clone();
        ctx.config = std::sync::Arc::new(config);

        let rolled = UsagePoller::new(ctx).aggregate_stats(&lock).await.unwrap();
        assert_eq!(rolled, 0);
    }
}
