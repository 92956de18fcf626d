//! TCP link to the hypervisor agents.
//!
//! One request per connection: the batch goes out as a single JSON line and
//! the agent replies with a single JSON line carrying one answer per command.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};
use vrm_config::ManagerConfig;
use vrm_core::{AgentTransport, Result, VrmError};
use vrm_proto::{AgentRequest, AgentResponse, Answer, Commands};
use vrm_shared::HostId;

pub struct TcpAgentTransport {
    endpoints: HashMap<HostId, String>,
    timeout: Duration,
    seq: AtomicU64,
}

impl TcpAgentTransport {
    pub fn new(endpoints: HashMap<HostId, String>, timeout: Duration) -> Self {
        Self {
            endpoints,
            timeout,
            seq: AtomicU64::new(1),
        }
    }

    /// Agents and timeout from the manager configuration
    pub fn from_config(config: &ManagerConfig) -> Self {
        let endpoints = config
            .agents
            .iter()
            .map(|agent| (agent.host_id, agent.address.clone()))
            .collect();
        Self::new(endpoints, Duration::from_secs(config.agent_timeout_secs))
    }

    async fn exchange(&self, address: &str, request: &AgentRequest) -> std::io::Result<AgentResponse> {
        let line = request
            .encode_line()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let mut stream = TcpStream::connect(address).await?;
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        if reader.read_line(&mut reply).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "agent closed the connection without answering",
            ));
        }
        AgentResponse::decode(&reply)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[async_trait]
impl AgentTransport for TcpAgentTransport {
    async fn send(&self, host_id: HostId, cmds: &Commands) -> Result<Vec<Answer>> {
        let address = self
            .endpoints
            .get(&host_id)
            .ok_or_else(|| VrmError::AgentUnavailable {
                host_id,
                reason: "no agent endpoint configured".to_string(),
            })?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let request = AgentRequest::new(seq, host_id, cmds);

        let response = match tokio::time::timeout(self.timeout, self.exchange(address, &request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(host_id, address = %address, error = %e, "Agent exchange failed");
                return Err(VrmError::AgentUnavailable {
                    host_id,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(host_id, address = %address, timeout_secs = self.timeout.as_secs(), "Agent timed out");
                return Err(VrmError::AgentUnavailable {
                    host_id,
                    reason: format!("no answer within {:?}", self.timeout),
                });
            }
        };

        if response.seq != seq {
            return Err(VrmError::AgentUnavailable {
                host_id,
                reason: format!("answer for request {} while waiting for {}", response.seq, seq),
            });
        }
        debug!(host_id, seq, answers = response.answers.len(), "Agent answered");
        Ok(response.answers)
    }
}
