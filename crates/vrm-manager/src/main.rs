mod http;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use vrm_agent::TcpAgentTransport;
use vrm_config::ManagerConfig;
use vrm_metrics::ManagerMetrics;
use vrm_runtime::{Repositories, RouterContext, RouterManager};
use vrm_store::{
    Inventory, LogAlertSink, MemoryClusterLock, MemoryStore, SimulatedNetworkOrchestrator,
    SimulatedVmManager,
};

const DEFAULT_CONFIG: &str = "config/manager.yaml";
const DEFAULT_INVENTORY: &str = "config/inventory.yaml";

fn load_manager_config(path: &str) -> anyhow::Result<ManagerConfig> {
    if !Path::new(path).exists() {
        return Ok(ManagerConfig::default());
    }
    vrm_config::load_config(path).with_context(|| format!("loading {}", path))
}

fn load_inventory(path: &str) -> anyhow::Result<Inventory> {
    if !Path::new(path).exists() {
        return Ok(Inventory::default());
    }
    Inventory::load(path).with_context(|| format!("loading inventory {}", path))
}

/// Wire the manager around an in-memory store seeded from the inventory
fn build_manager(config: ManagerConfig, inventory: Inventory) -> anyhow::Result<RouterManager> {
    let store = Arc::new(MemoryStore::from_inventory(inventory));
    let transport = Arc::new(TcpAgentTransport::from_config(&config));
    let metrics = ManagerMetrics::new().context("registering metrics")?;
    let ctx = RouterContext::new(
        Repositories::from_store(store.clone()),
        transport,
        Arc::new(LogAlertSink),
        config,
        metrics,
    );
    Ok(RouterManager::new(
        ctx,
        Arc::new(SimulatedVmManager::new(store)),
        Arc::new(SimulatedNetworkOrchestrator::new()),
        Arc::new(MemoryClusterLock::new()),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("VRM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let config = load_manager_config(&config_path)?;

    let log_format: vrm_logging::LogFormat = config.log_format.parse()?;
    vrm_logging::init(&config.log_level, log_format)?;

    info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        management_server_id = config.management_server_id,
        "Starting virtual router manager"
    );

    let inventory_path =
        std::env::var("VRM_INVENTORY").unwrap_or_else(|_| DEFAULT_INVENTORY.to_string());
    let inventory = load_inventory(&inventory_path)?;
    info!(
        routers = inventory.routers.len(),
        networks = inventory.networks.len(),
        agents = config.agents.len(),
        "Inventory loaded"
    );

    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let manager = build_manager(config, inventory)?;
    let tasks = manager.start_background_tasks();

    let app = http::create_router(manager.context().metrics.clone());
    let listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("binding {}", metrics_addr))?;
    info!("Serving metrics on {}", metrics_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;

    info!("Shutting down virtual router manager");
    tasks.shutdown().await;

    match manager.context().metrics.gather() {
        Ok(text) => info!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to gather metrics"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrm_core::RouterRepository;

    const INVENTORY: &str = include_str!("../config/inventory.yaml");

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let config = load_manager_config("/nonexistent/manager.yaml").unwrap();
        assert_eq!(config.rvr_status_update_pool_size, 10);
        let inventory = load_inventory("/nonexistent/inventory.yaml").unwrap();
        assert!(inventory.routers.is_empty());
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config: ManagerConfig =
            vrm_config::load_from_yaml(include_str!("../config/manager.yaml")).unwrap();
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[1].address, "127.0.0.1:8251");
    }

    #[tokio::test]
    async fn test_manager_starts_from_sample_inventory() {
        let inventory = Inventory::from_yaml(INVENTORY).unwrap();
        let manager = build_manager(ManagerConfig::default(), inventory).unwrap();

        let router = manager.context().repos.routers.find_router(5).unwrap();
        assert_eq!(router.priority, 99);

        let tasks = manager.start_background_tasks();
        assert!(!tasks.is_empty());
        tasks.shutdown().await;
    }
}
