//! Tokio runtime of the virtual router manager.
//!
//! Wires the sans-IO builders and decision logic to the collaborator seams:
//! the [`Dispatcher`] talks to agents, the [`RuleApplicator`] and
//! [`LifecycleController`] serve interactive operations, and the
//! reconciler and pollers run as periodic background tasks owned by
//! [`RouterManager`].

pub mod alert_poller;
pub mod applicator;
pub mod context;
pub mod dispatcher;
pub mod lifecycle;
pub mod manager;
pub mod reconciler;
pub mod resolve;
pub mod scheduler;
pub mod usage_poller;
pub mod vpn_monitor;

#[cfg(test)]
mod testing;

pub use alert_poller::AlertPoller;
pub use applicator::RuleApplicator;
pub use context::{Repositories, RouterContext};
pub use dispatcher::Dispatcher;
pub use lifecycle::{LifecycleController, RouterRebooter};
pub use manager::{BackgroundTasks, RouterManager};
pub use reconciler::{ReconcileQueue, RedundancyReconciler};
pub use usage_poller::{UsagePoller, STATS_LOCK_NAME};
