use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use vrm_shared::{Alert, NetworkId, RouterId};

/// VM lifecycle primitives owned by the virtual machine manager
#[async_trait]
pub trait VmManager: Send + Sync {
    /// Drive the VM to Running; the persisted state reflects the outcome
    async fn advance_start(&self, router_id: RouterId) -> Result<()>;

    /// Drive the VM to Stopped
    async fn advance_stop(&self, router_id: RouterId, forced: bool) -> Result<()>;
}

/// Network orchestration used before a router boots
#[async_trait]
pub trait NetworkOrchestrator: Send + Sync {
    /// Implement the network if needed; `Ok(false)` when it could not be started
    async fn start_network(&self, network_id: NetworkId) -> Result<bool>;
}

/// Fire-and-forget operator alerts
pub trait AlertSink: Send + Sync {
    fn send_alert(&self, alert: Alert);
}

/// Named lock shared by every management server of the cluster
#[async_trait]
pub trait ClusterLock: Send + Sync {
    /// Try to take the lock, waiting at most `timeout`
    async fn try_lock(&self, name: &str, timeout: Duration) -> bool;

    fn unlock(&self, name: &str);
}
