pub mod model;
pub mod net;
pub mod rules;
pub mod usage;
pub mod version;

pub use model::*;
pub use rules::*;
pub use usage::*;

// Redundant router priorities
pub const DEFAULT_PRIORITY: u32 = 100;
pub const DEFAULT_DELTA: u32 = 2;
pub const MIN_ALLOCATABLE_PRIORITY: u32 = 20;
pub const MAX_ALLOCATABLE_PRIORITY: u32 = 200;

// Router monitoring service
pub const ALERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const ALERT_EPOCH: &str = "1970-01-01 00:00:00";

// Usage statistics device type for virtual routers
pub const ROUTER_DEVICE_TYPE: &str = "DomainRouter";
