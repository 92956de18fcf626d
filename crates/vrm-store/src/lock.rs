use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use vrm_core::ClusterLock;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Process-local stand-in for the cluster-wide named lock
#[derive(Default)]
pub struct MemoryClusterLock {
    held: Mutex<HashSet<String>>,
}

impl MemoryClusterLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.held.lock().contains(name)
    }
}

#[async_trait]
impl ClusterLock for MemoryClusterLock {
    async fn try_lock(&self, name: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.held.lock().insert(name.to_string()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn unlock(&self, name: &str) {
        self.held.lock().remove(name);
    }
}
