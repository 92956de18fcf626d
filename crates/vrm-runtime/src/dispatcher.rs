use crate::context::RouterContext;
use std::time::Instant;
use tracing::{debug, warn};
use vrm_core::{Result, VrmError};
use vrm_proto::{Answer, Commands};
use vrm_shared::{version::meets_minimum, Router};

/// Delivers command batches to the agent owning a router's host
#[derive(Clone)]
pub struct Dispatcher {
    ctx: RouterContext,
}

/// True when there is one successful answer per command
pub fn all_succeeded(cmds: &Commands, answers: &[Answer]) -> bool {
    answers.len() == cmds.len() && answers.iter().all(|answer| answer.result)
}

/// Detail of the first failing answer, or why the answer set is unusable
pub fn failure_detail(cmds: &Commands, answers: &[Answer]) -> String {
    if answers.len() != cmds.len() {
        return format!(
            "expected {} answers, agent returned {}",
            cmds.len(),
            answers.len()
        );
    }
    answers
        .iter()
        .find(|answer| !answer.result)
        .map(|answer| answer.details_or("command failed").to_string())
        .unwrap_or_default()
}

impl Dispatcher {
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }

    /// Refuse routers whose template is older than the configured minimum
    pub fn check_version(&self, router: &Router) -> Result<()> {
        let config = &self.ctx.config;
        if !config.router_version_check_enabled {
            return Ok(());
        }
        if meets_minimum(router.template_version.as_deref(), &config.min_router_version) {
            return Ok(());
        }
        Err(VrmError::VersionMismatch {
            router: router.instance_name.clone(),
            found: router
                .template_version
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            required: config.min_router_version.clone(),
        })
    }

    /// Send a batch and return the raw answers, without the version gate
    pub async fn exchange(&self, router: &Router, cmds: &Commands) -> Result<Vec<Answer>> {
        let host_id = router.host_id.ok_or_else(|| {
            VrmError::ResourceUnavailable(format!(
                "router {} is not placed on a host",
                router.instance_name
            ))
        })?;

        for cmd in cmds.iter() {
            self.ctx
                .metrics
                .commands_sent
                .with_label_values(&[cmd.name()])
                .inc();
        }

        let started = Instant::now();
        let result = self.ctx.transport.send(host_id, cmds).await;
        self.ctx
            .metrics
            .dispatch_latency_seconds
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(answers) => {
                debug!(
                    router = %router.instance_name,
                    host_id,
                    commands = cmds.len(),
                    answers = answers.len(),
                    "Batch delivered"
                );
                Ok(answers)
            }
            Err(e) => {
                self.ctx
                    .metrics
                    .dispatch_failures
                    .with_label_values(&[e.kind()])
                    .inc();
                warn!(router = %router.instance_name, host_id, error = %e, "Batch delivery failed");
                Err(e)
            }
        }
    }

    /// Send a batch; `Ok(false)` when any answer failed or answers are missing
    pub async fn send_to_router(&self, router: &Router, cmds: &Commands) -> Result<bool> {
        self.check_version(router)?;
        let answers = self.exchange(router, cmds).await?;
        let ok = all_succeeded(cmds, &answers);
        if !ok {
            self.ctx
                .metrics
                .dispatch_failures
                .with_label_values(&["rule_application"])
                .inc();
        }
        Ok(ok)
    }

    /// Send a batch and turn a failed answer into a rule-application error
    pub async fn apply(&self, router: &Router, cmds: &Commands, what: &str) -> Result<()> {
        self.check_version(router)?;
        let answers = self.exchange(router, cmds).await?;
        if all_succeeded(cmds, &answers) {
            return Ok(());
        }
        self.ctx
            .metrics
            .dispatch_failures
            .with_label_values(&["rule_application"])
            .inc();
        Err(VrmError::RuleApplication {
            router: router.instance_name.clone(),
            what: what.to_string(),
            detail: failure_detail(cmds, &answers),
        })
    }
}
