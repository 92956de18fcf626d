use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;
use vrm_core::{NetworkOrchestrator, Result, RouterRepository, VmManager, VrmError};
use vrm_shared::{NetworkId, RouterId, VmState};

use crate::store::MemoryStore;

/// VM manager that flips router states in the store instead of touching a hypervisor
pub struct SimulatedVmManager {
    store: Arc<MemoryStore>,
    fail_start: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SimulatedVmManager {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            fail_start: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Make every following start fail, leaving the router Stopped
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VmManager for SimulatedVmManager {
    async fn advance_start(&self, router_id: RouterId) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.store.find_router(router_id).is_none() {
            return Err(VrmError::not_found("router", router_id));
        }
        if self.fail_start.load(Ordering::SeqCst) {
            self.store.set_router_state(router_id, VmState::Stopped);
            return Err(VrmError::Operation(format!(
                "simulated start failure for router {}",
                router_id
            )));
        }
        self.store.set_router_state(router_id, VmState::Running);
        info!(router_id, "Router VM started");
        Ok(())
    }

    async fn advance_stop(&self, router_id: RouterId, forced: bool) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.store.find_router(router_id).is_none() {
            return Err(VrmError::not_found("router", router_id));
        }
        self.store.set_router_state(router_id, VmState::Stopped);
        info!(router_id, forced, "Router VM stopped");
        Ok(())
    }
}

/// Network orchestrator that reports every network as implemented unless told otherwise
#[derive(Default)]
pub struct SimulatedNetworkOrchestrator {
    unavailable: Mutex<HashSet<NetworkId>>,
}

impl SimulatedNetworkOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unavailable(&self, network_id: NetworkId) {
        self.unavailable.lock().insert(network_id);
    }
}

#[async_trait]
impl NetworkOrchestrator for SimulatedNetworkOrchestrator {
    async fn start_network(&self, network_id: NetworkId) -> Result<bool> {
        Ok(!self.unavailable.lock().contains(&network_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrm_shared::Router;

    #[tokio::test]
    async fn test_start_and_stop_flip_state() {
        let store = Arc::new(MemoryStore::new());
        store.insert_router(Router::new(4, "r-4-VM", 1));
        let vms = SimulatedVmManager::new(store.clone());

        vms.advance_start(4).await.unwrap();
        assert_eq!(store.find_router(4).unwrap().state, VmState::Running);

        vms.advance_stop(4, false).await.unwrap();
        assert_eq!(store.find_router(4).unwrap().state, VmState::Stopped);
        assert_eq!((vms.start_count(), vms.stop_count()), (1, 1));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_router_stopped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_router(Router::new(4, "r-4-VM", 1));
        let vms = SimulatedVmManager::new(store.clone());
        vms.set_fail_start(true);

        assert!(vms.advance_start(4).await.is_err());
        assert_eq!(store.find_router(4).unwrap().state, VmState::Stopped);
        assert!(vms.advance_start(99).await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_network() {
        let orchestrator = SimulatedNetworkOrchestrator::new();
        orchestrator.mark_unavailable(5);
        assert!(orchestrator.start_network(4).await.unwrap());
        assert!(!orchestrator.start_network(5).await.unwrap());
    }
}
