// Error types module
pub mod error;

// Collaborator seams: agent transport, persistence, VM lifecycle, alerts
pub mod collaborators;
pub mod repository;
pub mod transport;

// Re-export commonly used types
pub use collaborators::{AlertSink, ClusterLock, NetworkOrchestrator, VmManager};
pub use error::{ErrorSeverity, Result, VrmError};
pub use repository::{
    AlertCheckpointRepository, HostRepository, NetworkRepository, RouterRepository, RowUpdate,
    RuleRepository, UsageRepository, VpnConnectionRepository,
};
pub use transport::AgentTransport;
