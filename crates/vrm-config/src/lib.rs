use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Agent reachable over TCP for the routers of one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AgentEndpoint {
    pub host_id: u64,
    #[validate(length(min = 1))]
    pub address: String,
}

/// Router manager configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ManagerConfig {
    #[validate(length(min = 1))]
    pub service_name: String,
    #[validate(length(min = 1))]
    pub log_level: String,
    /// `json` or `plain`
    #[validate(length(min = 1))]
    pub log_format: String,
    #[validate(range(min = 1, max = 65535))]
    pub metrics_port: u16,

    /// Identity of this management server inside the cluster
    pub management_server_id: u64,

    // Redundancy reconciliation
    #[validate(range(min = 1))]
    pub router_check_interval_secs: u64,
    /// Worker count, also the capacity of the reconcile queue
    #[validate(range(min = 1, max = 1024))]
    pub rvr_status_update_pool_size: usize,
    #[validate(range(min = 1))]
    pub rvr_enqueue_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub check_router_wait_secs: u64,

    // Usage polling
    #[validate(range(min = 1))]
    pub network_stats_interval_secs: u64,
    #[validate(range(min = 1))]
    pub usage_aggregation_range_minutes: u64,
    #[validate(range(min = 1))]
    pub stats_lock_timeout_secs: u64,

    // Router monitoring
    #[validate(range(min = 1))]
    pub router_alerts_check_interval_secs: u64,
    pub service_monitoring_enabled: bool,
    /// Per-zone override of `service_monitoring_enabled`
    pub zone_service_monitoring: BTreeMap<u64, bool>,

    pub router_version_check_enabled: bool,
    #[validate(length(min = 1))]
    pub min_router_version: String,

    pub out_of_band_reboot_delay_ms: u64,
    #[validate(range(min = 1))]
    pub agent_timeout_secs: u64,
    #[validate(nested)]
    pub agents: Vec<AgentEndpoint>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            service_name: "vrm".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            metrics_port: 9090,
            management_server_id: 1,
            router_check_interval_secs: 30,
            rvr_status_update_pool_size: 10,
            rvr_enqueue_timeout_ms: 500,
            check_router_wait_secs: 30,
            network_stats_interval_secs: 300,
            usage_aggregation_range_minutes: 1440,
            stats_lock_timeout_secs: 5,
            router_alerts_check_interval_secs: 1800,
            service_monitoring_enabled: false,
            zone_service_monitoring: BTreeMap::new(),
            router_version_check_enabled: true,
            min_router_version: "4.2.0".to_string(),
            out_of_band_reboot_delay_ms: 1000,
            agent_timeout_secs: 120,
            agents: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Whether router service monitoring is on for a zone
    pub fn service_monitoring_for_zone(&self, zone_id: u64) -> bool {
        self.zone_service_monitoring
            .get(&zone_id)
            .copied()
            .unwrap_or(self.service_monitoring_enabled)
    }

    /// Hourly and daily ranges leave aggregate rolling to the stats aggregation task
    pub fn is_periodic_aggregation(&self) -> bool {
        matches!(self.usage_aggregation_range_minutes, 60 | 1440)
    }
}

/// Load configuration from file
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("VRM"))
        .build()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Load configuration from YAML string (for testing)
pub fn load_from_yaml<T>(yaml: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::LoadError(e.to_string()))?;
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.service_name, "vrm");
        assert_eq!(config.rvr_status_update_pool_size, 10);
        assert_eq!(config.min_router_version, "4.2.0");
        assert!(config.is_periodic_aggregation());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
service_name: vrm-test
log_level: debug
metrics_port: 8080
management_server_id: 3
usage_aggregation_range_minutes: 15
zone_service_monitoring:
  2: true
agents:
  - host_id: 10
    address: "127.0.0.1:8250"
"#;
        let config: ManagerConfig = load_from_yaml(yaml).unwrap();
        assert_eq!(config.service_name, "vrm-test");
        assert_eq!(config.management_server_id, 3);
        assert_eq!(config.router_check_interval_secs, 30);
        assert!(!config.is_periodic_aggregation());
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].host_id, 10);
    }

    #[test]
    fn test_zone_monitoring_override() {
        let mut config = ManagerConfig::default();
        config.zone_service_monitoring.insert(2, true);
        assert!(config.service_monitoring_for_zone(2));
        assert!(!config.service_monitoring_for_zone(1));
    }

    #[test]
    fn test_validation_error() {
        let yaml = r#"
service_name: ""
log_level: info
"#;
        let result: Result<ManagerConfig, _> = load_from_yaml(yaml);
        match result {
            Err(ConfigError::ValidationError(_)) => (),
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let yaml = "rvr_status_update_pool_size: 0\n";
        let result: Result<ManagerConfig, _> = load_from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_empty_agent_address_rejected() {
        let yaml = r#"
agents:
  - host_id: 1
    address: ""
"#;
        let result: Result<ManagerConfig, _> = load_from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
