use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use vrm_core::{AgentTransport, Result, VrmError};
use vrm_proto::{Answer, Command, Commands};
use vrm_shared::HostId;

type Responder = Box<dyn Fn(HostId, &Command) -> Answer + Send + Sync>;

/// Agent transport answering from a script, recording every batch it is given.
///
/// Queued answer sets are consumed first; once the queue is empty each command
/// is answered by the responder, or with a plain success.
#[derive(Default)]
pub struct ScriptedTransport {
    scripted: Mutex<VecDeque<Vec<Answer>>>,
    responder: Mutex<Option<Responder>>,
    unreachable: Mutex<HashSet<HostId>>,
    sent: Mutex<Vec<(HostId, Commands)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers for the next batch, returned as-is whatever its length
    pub fn push_answers(&self, answers: Vec<Answer>) {
        self.scripted.lock().push_back(answers);
    }

    pub fn set_responder(&self, responder: impl Fn(HostId, &Command) -> Answer + Send + Sync + 'static) {
        *self.responder.lock() = Some(Box::new(responder));
    }

    pub fn set_unreachable(&self, host_id: HostId) {
        self.unreachable.lock().insert(host_id);
    }

    pub fn set_reachable(&self, host_id: HostId) {
        self.unreachable.lock().remove(&host_id);
    }

    pub fn sent(&self) -> Vec<(HostId, Commands)> {
        self.sent.lock().clone()
    }

    /// Names of every command sent so far, in order
    pub fn sent_names(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .flat_map(|(_, cmds)| cmds.iter().map(|cmd| cmd.name().to_string()).collect::<Vec<_>>())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn send(&self, host_id: HostId, cmds: &Commands) -> Result<Vec<Answer>> {
        self.sent.lock().push((host_id, cmds.clone()));
        if self.unreachable.lock().contains(&host_id) {
            return Err(VrmError::AgentUnavailable {
                host_id,
                reason: "host is disconnected".to_string(),
            });
        }
        if let Some(answers) = self.scripted.lock().pop_front() {
            return Ok(answers);
        }
        let responder = self.responder.lock();
        Ok(cmds
            .iter()
            .map(|cmd| match responder.as_ref() {
                Some(respond) => respond(host_id, cmd),
                None => Answer::success(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrm_proto::{AnswerPayload, CommandBody};
    use vrm_shared::RedundantState;

    #[tokio::test]
    async fn test_script_then_responder() {
        let transport = ScriptedTransport::new();
        transport.push_answers(vec![Answer::failure("scripted")]);
        transport.set_responder(|_, cmd| match cmd.body {
            CommandBody::CheckRouter => Answer::success().with_payload(AnswerPayload::CheckRouter {
                state: RedundantState::Master,
                is_bumped: false,
            }),
            _ => Answer::success(),
        });

        let cmds = Commands::single(Command::new(CommandBody::CheckRouter));
        let first = transport.send(1, &cmds).await.unwrap();
        assert!(!first[0].result);
        let second = transport.send(1, &cmds).await.unwrap();
        assert!(matches!(second[0].payload, AnswerPayload::CheckRouter { .. }));
        assert_eq!(transport.sent_names(), vec!["CheckRouter", "CheckRouter"]);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let transport = ScriptedTransport::new();
        transport.set_unreachable(3);
        let cmds = Commands::single(Command::new(CommandBody::BumpUpPriority));
        let err = transport.send(3, &cmds).await.unwrap_err();
        assert_eq!(err.kind(), "agent_unavailable");
        assert!(transport.send(4, &cmds).await.is_ok());
    }
}
