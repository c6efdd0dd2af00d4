//! In-memory gateway for tests.
//!
//! `MockAz` records every command it is asked to run and answers from rules
//! keyed by command prefix. The longest matching prefix wins; commands with no
//! matching rule get an empty reply.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::command::AzCommand;
use crate::error::{AzError, Result};
use crate::gateway::AzGateway;

/// A canned reply for a mocked command.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful exit with this JSON on stdout.
    Json(Value),
    /// Successful exit with nothing on stdout.
    Empty,
    /// Non-zero exit with this text on stderr.
    Fail(String),
}

struct Rule {
    prefix: String,
    replies: VecDeque<MockReply>,
}

/// A mock gateway that replies from registered rules.
#[derive(Default)]
pub struct MockAz {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl MockAz {
    /// Create a mock with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to commands starting with `prefix`.
    pub fn on(&self, prefix: impl Into<String>, reply: MockReply) {
        self.on_sequence(prefix, vec![reply]);
    }

    /// Reply to successive matching commands with each reply in turn; the last
    /// reply repeats once the sequence is exhausted.
    pub fn on_sequence(&self, prefix: impl Into<String>, replies: Vec<MockReply>) {
        let prefix = prefix.into();
        let mut rules = self.rules.lock();
        rules.retain(|r| r.prefix != prefix);
        rules.push(Rule {
            prefix,
            replies: replies.into(),
        });
    }

    /// All commands issued so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of issued commands starting with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Forget recorded calls, keeping the rules.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn next_reply(&self, rendered: &str) -> MockReply {
        let mut rules = self.rules.lock();
        let rule = rules
            .iter_mut()
            .filter(|r| rendered.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());

        match rule {
            Some(rule) if rule.replies.len() > 1 => {
                rule.replies.pop_front().unwrap_or(MockReply::Empty)
            }
            Some(rule) => rule.replies.front().cloned().unwrap_or(MockReply::Empty),
            None => MockReply::Empty,
        }
    }
}

#[async_trait]
impl AzGateway for MockAz {
    async fn run(
        &self,
        command: &AzCommand,
        description: &str,
        no_data_ok: bool,
    ) -> Result<Value> {
        let rendered = command.to_string();
        self.calls.lock().push(rendered.clone());

        match self.next_reply(&rendered) {
            MockReply::Json(value) => Ok(value),
            MockReply::Empty if no_data_ok => Ok(Value::Object(serde_json::Map::new())),
            MockReply::Empty => Err(AzError::NoData {
                description: description.to_string(),
                stderr: String::new(),
            }),
            MockReply::Fail(stderr) => Err(AzError::CommandFailed {
                description: description.to_string(),
                code: Some(1),
                stderr,
            }),
        }
    }
}
