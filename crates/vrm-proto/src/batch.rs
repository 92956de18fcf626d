use crate::answer::Answer;
use crate::command::Command;
use serde::{Deserialize, Serialize};

/// Agent behaviour when a command in the batch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnError {
    /// Abort the remaining commands
    #[default]
    Stop,
    /// Run every command and report each result
    Continue,
}

/// Ordered batch of commands bound for one router
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commands {
    on_error: OnError,
    entries: Vec<(String, Command)>,
}

impl Commands {
    pub fn new(on_error: OnError) -> Self {
        Self {
            on_error,
            entries: Vec::new(),
        }
    }

    /// Batch holding a single command
    pub fn single(cmd: Command) -> Self {
        let mut cmds = Self::new(OnError::Stop);
        cmds.push(cmd);
        cmds
    }

    pub fn on_error(&self) -> OnError {
        self.on_error
    }

    /// Append a command named after its type
    pub fn push(&mut self, cmd: Command) {
        let name = cmd.name().to_string();
        self.entries.push((name, cmd));
    }

    /// Append a command under an explicit name for later answer lookup
    pub fn push_named(&mut self, name: impl Into<String>, cmd: Command) {
        self.entries.push((name.into(), cmd));
    }

    pub fn extend(&mut self, other: Commands) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter().map(|(_, cmd)| cmd)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn to_vec(&self) -> Vec<Command> {
        self.iter().cloned().collect()
    }

    /// Answer correlated with the first command registered under `name`
    pub fn answer_for<'a>(&self, name: &str, answers: &'a [Answer]) -> Option<&'a Answer> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .and_then(|idx| answers.get(idx))
    }
}
