use std::sync::Arc;
use vrm_config::ManagerConfig;
use vrm_core::{
    AgentTransport, AlertCheckpointRepository, AlertSink, HostRepository, NetworkRepository,
    RouterRepository, RuleRepository, UsageRepository, VpnConnectionRepository,
};
use vrm_metrics::ManagerMetrics;

/// Persistence seams used by the router manager
#[derive(Clone)]
pub struct Repositories {
    pub routers: Arc<dyn RouterRepository>,
    pub hosts: Arc<dyn HostRepository>,
    pub networks: Arc<dyn NetworkRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub vpn: Arc<dyn VpnConnectionRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub checkpoints: Arc<dyn AlertCheckpointRepository>,
}

impl Repositories {
    /// All repositories served by one backing store
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RouterRepository
            + HostRepository
            + NetworkRepository
            + RuleRepository
            + VpnConnectionRepository
            + UsageRepository
            + AlertCheckpointRepository
            + 'static,
    {
        Self {
            routers: store.clone(),
            hosts: store.clone(),
            networks: store.clone(),
            rules: store.clone(),
            vpn: store.clone(),
            usage: store.clone(),
            checkpoints: store,
        }
    }
}

/// Shared state handed to every runtime component.
///
/// Built once at startup; there is no process-wide mutable state.
#[derive(Clone)]
pub struct RouterContext {
    pub repos: Repositories,
    pub transport: Arc<dyn AgentTransport>,
    pub alerts: Arc<dyn AlertSink>,
    pub config: Arc<ManagerConfig>,
    pub metrics: ManagerMetrics,
}

impl RouterContext {
    pub fn new(
        repos: Repositories,
        transport: Arc<dyn AgentTransport>,
        alerts: Arc<dyn AlertSink>,
        config: ManagerConfig,
        metrics: ManagerMetrics,
    ) -> Self {
        Self {
            repos,
            transport,
            alerts,
            config: Arc::new(config),
            metrics,
        }
    }
}
