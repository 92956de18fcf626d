//! In-memory implementations of the router manager's collaborators.
//!
//! Used by the manager binary against a YAML inventory and by every test in
//! the workspace.

pub mod alerts;
pub mod inventory;
pub mod lock;
pub mod sim;
pub mod store;
pub mod transport;

pub use alerts::{LogAlertSink, RecordingAlertSink};
pub use inventory::Inventory;
pub use lock::MemoryClusterLock;
pub use sim::{SimulatedNetworkOrchestrator, SimulatedVmManager};
pub use store::MemoryStore;
pub use transport::ScriptedTransport;
