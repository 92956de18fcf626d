use thiserror::Error;
use vrm_shared::{HostId, NetworkId};

/// Main error type for the router manager
#[derive(Error, Debug)]
pub enum VrmError {
    // ========================================
    // Configuration Errors
    // ========================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    // ========================================
    // Agent Errors
    // ========================================
    #[error("Agent unavailable on host {host_id}: {reason}")]
    AgentUnavailable { host_id: HostId, reason: String },

    #[error("Unable to apply {what} on router {router}: {detail}")]
    RuleApplication {
        router: String,
        what: String,
        detail: String,
    },

    #[error("Router {router} runs template version {found}, {required} or newer required; upgrade the router")]
    VersionMismatch {
        router: String,
        found: String,
        required: String,
    },

    // ========================================
    // Capacity Errors
    // ========================================
    #[error("Insufficient virtual network capacity in network {network_id}: {reason}")]
    InsufficientCapacity { network_id: NetworkId, reason: String },

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VrmError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidParameter(_) => "config",
            Self::NotFound { .. } => "not_found",
            Self::AgentUnavailable { .. } => "agent_unavailable",
            Self::RuleApplication { .. } => "rule_application",
            Self::VersionMismatch { .. } => "version_mismatch",
            Self::InsufficientCapacity { .. } => "insufficient_capacity",
            Self::ResourceUnavailable(_) => "resource_unavailable",
            Self::Operation(_) => "operation",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(_) | Self::InvalidParameter(_) | Self::NotFound { .. } => {
                ErrorSeverity::Warning
            }
            Self::AgentUnavailable { .. } | Self::RuleApplication { .. } => ErrorSeverity::Error,
            Self::VersionMismatch { .. } => ErrorSeverity::Error,
            Self::InsufficientCapacity { .. } => ErrorSeverity::Critical,
            Self::Storage(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AgentUnavailable { .. }
                | Self::VersionMismatch { .. }
                | Self::ResourceUnavailable(_)
                | Self::Io(_)
        )
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Result type alias for router manager operations
pub type Result<T> = std::result::Result<T, VrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = VrmError::AgentUnavailable {
            host_id: 4,
            reason: "timed out".to_string(),
        };
        assert_eq!(err.kind(), "agent_unavailable");
        assert_eq!(
            VrmError::InsufficientCapacity {
                network_id: 1,
                reason: "too low".to_string()
            }
            .kind(),
            "insufficient_capacity"
        );
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            VrmError::Config("missing control nic".to_string()).severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            VrmError::InsufficientCapacity {
                network_id: 1,
                reason: "too high".to_string()
            }
            .severity(),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(VrmError::AgentUnavailable {
            host_id: 1,
            reason: "down".to_string()
        }
        .is_retryable());
        assert!(!VrmError::RuleApplication {
            router: "r-1-VM".to_string(),
            what: "firewall rules".to_string(),
            detail: "bad cidr".to_string(),
        }
        .is_retryable());
        assert!(!VrmError::InsufficientCapacity {
            network_id: 1,
            reason: "churn".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = VrmError::VersionMismatch {
            router: "r-9-VM".to_string(),
            found: "3.0.7".to_string(),
            required: "4.2.0".to_string(),
        };
        assert!(err.to_string().contains("upgrade"));
        assert_eq!(
            VrmError::not_found("router", 12).to_string(),
            "router 12 not found"
        );
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "info");
        assert_eq!(ErrorSeverity::Critical.to_string(), "critical");
    }
}
