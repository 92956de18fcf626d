use crate::model::{AccountId, NetworkId, PodId, RouterId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Identity of one usage statistics row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageStatsKey {
    pub account_id: AccountId,
    pub zone_id: ZoneId,
    pub network_id: NetworkId,
    /// Set for VPC routers, which are metered per public address
    pub public_ip: Option<Ipv4Addr>,
    pub router_id: RouterId,
    pub device_type: String,
}

/// Byte counters for one (account, zone, network, router, ip) tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub id: u64,
    pub key: UsageStatsKey,
    pub current_bytes_received: u64,
    pub current_bytes_sent: u64,
    pub net_bytes_received: u64,
    pub net_bytes_sent: u64,
    pub agg_bytes_received: u64,
    pub agg_bytes_sent: u64,
}

impl UserStatistics {
    pub fn new(id: u64, key: UsageStatsKey) -> Self {
        Self {
            id,
            key,
            current_bytes_received: 0,
            current_bytes_sent: 0,
            net_bytes_received: 0,
            net_bytes_sent: 0,
            agg_bytes_received: 0,
            agg_bytes_sent: 0,
        }
    }

    /// Aggregate counters lag behind net + current
    pub fn has_pending_delta(&self) -> bool {
        self.agg_bytes_received != self.net_bytes_received + self.current_bytes_received
            || self.agg_bytes_sent != self.net_bytes_sent + self.current_bytes_sent
    }

    /// Roll net + current into the aggregate counters
    pub fn roll_aggregate(&mut self) {
        self.agg_bytes_received = self.net_bytes_received + self.current_bytes_received;
        self.agg_bytes_sent = self.net_bytes_sent + self.current_bytes_sent;
    }
}

/// Immutable snapshot written each time aggregates are rolled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatsLogEntry {
    pub stats_id: u64,
    pub net_bytes_received: u64,
    pub net_bytes_sent: u64,
    pub current_bytes_received: u64,
    pub current_bytes_sent: u64,
    pub agg_bytes_received: u64,
    pub agg_bytes_sent: u64,
    pub updated_at: DateTime<Utc>,
}

impl UserStatsLogEntry {
    pub fn snapshot(stats: &UserStatistics, updated_at: DateTime<Utc>) -> Self {
        Self {
            stats_id: stats.id,
            net_bytes_received: stats.net_bytes_received,
            net_bytes_sent: stats.net_bytes_sent,
            current_bytes_received: stats.current_bytes_received,
            current_bytes_sent: stats.current_bytes_sent,
            agg_bytes_received: stats.agg_bytes_received,
            agg_bytes_sent: stats.agg_bytes_sent,
            updated_at,
        }
    }
}

/// High-water mark of alerts already collected from a router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterAlertCheckpoint {
    pub router_id: RouterId,
    pub router_name: String,
    pub last_alert_timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    DomainRouter,
    RouterMonitoring,
    Site2SiteVpn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub zone_id: ZoneId,
    pub pod_id: Option<PodId>,
    pub title: String,
    pub detail: String,
}
