//! Sans-IO decision logic behind the redundancy reconciler and the
//! background pollers. Callers feed in persisted records and agent answers;
//! these functions say what to persist, alert on, or recover.

pub mod alerts;
pub mod priority;
pub mod redundancy;
pub mod usage;
pub mod vpn;

pub use alerts::{parse_alert_timestamp, plan_router_alerts, AlertPoll};
pub use priority::{real_priority, updated_priority, PriorityError};
pub use redundancy::{
    apply_observation, duplicate_master_alerts, find_duplicate_masters, master_transition_alert,
    observe, pair_owner, plan_single_working, recovery_alert, sanity_violation, BumpDecision, Observation,
    ObservationResult, PairKey, SingleWorkingPlan, StateChange,
};
pub use usage::{fold_usage, UsageFold, UsageReading};
