use crate::error::Result;
use async_trait::async_trait;
use vrm_proto::{Answer, Command, Commands};
use vrm_shared::HostId;

/// Abstract agent transport.
/// Allows switching between the TCP agent link and test doubles transparently.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Send a batch to the agent managing `host_id` and wait for its answers.
    ///
    /// Timeouts and link failures surface as `VrmError::AgentUnavailable`.
    async fn send(&self, host_id: HostId, cmds: &Commands) -> Result<Vec<Answer>>;

    /// Single-command convenience; any failure collapses to `None`
    async fn easy_send(&self, host_id: HostId, cmd: Command) -> Option<Answer> {
        let cmds = Commands::single(cmd);
        match self.send(host_id, &cmds).await {
            Ok(mut answers) if answers.len() == 1 => answers.pop(),
            _ => None,
        }
    }
}
