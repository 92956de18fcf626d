// Newline-delimited JSON envelope exchanged with an agent
use crate::answer::Answer;
use crate::batch::{Commands, OnError};
use crate::command::Command;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub seq: u64,
    pub host_id: u64,
    pub on_error: OnError,
    pub commands: Vec<Command>,
}

impl AgentRequest {
    pub fn new(seq: u64, host_id: u64, cmds: &Commands) -> Self {
        Self {
            seq,
            host_id,
            on_error: cmds.on_error(),
            commands: cmds.to_vec(),
        }
    }

    pub fn encode_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub seq: u64,
    pub answers: Vec<Answer>,
}

impl AgentResponse {
    pub fn encode_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}
