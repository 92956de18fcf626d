use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use vrm_shared::RedundantState;

/// Typed result data carried by some answers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnswerPayload {
    #[default]
    None,
    CheckRouter {
        state: RedundantState,
        is_bumped: bool,
    },
    CheckS2SVpnConnections {
        connected: Vec<Ipv4Addr>,
    },
    GetRouterAlerts {
        timestamp: Option<String>,
        alerts: Option<Vec<String>>,
    },
    GetDomRVersion {
        template_version: String,
        scripts_version: String,
    },
    NetworkUsage {
        router_name: String,
        bytes_sent: u64,
        bytes_received: u64,
    },
}

/// Agent reply to one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub result: bool,
    pub details: Option<String>,
    #[serde(default)]
    pub payload: AnswerPayload,
}

impl Answer {
    pub fn success() -> Self {
        Self {
            result: true,
            details: None,
            payload: AnswerPayload::None,
        }
    }

    pub fn failure(details: impl Into<String>) -> Self {
        Self {
            result: false,
            details: Some(details.into()),
            payload: AnswerPayload::None,
        }
    }

    pub fn with_payload(mut self, payload: AnswerPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn details_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.details.as_deref().unwrap_or(fallback)
    }
}
