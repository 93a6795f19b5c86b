// Copyright (c) 2025 - Cowboy AI, Inc.
//! Mock transport for testing.
//!
//! Records every command submitted to every host and plays it back through
//! [`CommandSpec::evaluate`], so tests can see exactly which fragments a real
//! shell would have run. Connections and individual fragments can be made to
//! fail on demand.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CommandOutput, Session, Transport};
use crate::command::CommandSpec;
use crate::domain::{CredentialSet, Host};
use crate::errors::ConnectionError;

/// A command as received by a mock session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Alias of the host the session was opened to
    pub host: String,
    /// Exact command string submitted
    pub command: String,
    /// Fragments that would have executed, in order
    pub executed: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    unreachable: HashSet<String>,
    failing_fragments: HashSet<String>,
    connections: usize,
    closed: usize,
    submissions: Vec<Submission>,
}

/// Test-double transport shared between the test and the dispatcher
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded submissions.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refuse connections to the host with this alias
    pub fn fail_connection(&self, alias: impl Into<String>) -> &Self {
        self.state().unreachable.insert(alias.into());
        self
    }

    /// Make any fragment with exactly this text exit non-zero
    pub fn fail_fragment(&self, fragment: impl Into<String>) -> &Self {
        self.state().failing_fragments.insert(fragment.into());
        self
    }

    /// All submissions in arrival order
    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Submissions received by one host
    pub fn submissions_for(&self, alias: &str) -> Vec<Submission> {
        self.state()
            .submissions
            .iter()
            .filter(|s| s.host == alias)
            .cloned()
            .collect()
    }

    /// Number of sessions successfully opened
    pub fn connection_count(&self) -> usize {
        self.state().connections
    }

    /// Number of sessions closed
    pub fn closed_count(&self) -> usize {
        self.state().closed
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        host: &Host,
        _credentials: &CredentialSet,
    ) -> Result<Box<dyn Session>, ConnectionError> {
        let mut state = self.state();
        if state.unreachable.contains(&host.alias) {
            return Err(ConnectionError::Unreachable {
                host: host.alias.clone(),
                reason: "mock: connection refused".to_string(),
            });
        }
        state.connections += 1;
        Ok(Box::new(MockSession {
            host: host.alias.clone(),
            transport: self.clone(),
        }))
    }
}

struct MockSession {
    host: String,
    transport: MockTransport,
}

#[async_trait]
impl Session for MockSession {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, ConnectionError> {
        let mut state = self.transport.state();

        let (output, executed) = match CommandSpec::parse(command) {
            Ok(spec) => {
                let mut executed = Vec::new();
                let mut failed = None;
                let ok = spec.evaluate(&mut |fragment: &str| {
                    executed.push(fragment.to_string());
                    let ok = !state.failing_fragments.contains(fragment);
                    if !ok {
                        failed = Some(fragment.to_string());
                    }
                    ok
                });
                let output = CommandOutput {
                    exit_code: Some(if ok { 0 } else { 1 }),
                    stdout: executed.join("\n"),
                    stderr: failed
                        .map(|f| format!("mock: fragment failed: {f}"))
                        .unwrap_or_default(),
                };
                (output, executed)
            }
            Err(e) => (
                CommandOutput {
                    exit_code: Some(2),
                    stdout: String::new(),
                    stderr: format!("mock: syntax error: {e}"),
                },
                Vec::new(),
            ),
        };

        state.submissions.push(Submission {
            host: self.host.clone(),
            command: command.to_string(),
            executed,
        });
        Ok(output)
    }

    async fn close(self: Box<Self>) -> Result<(), ConnectionError> {
        self.transport.state().closed += 1;
        Ok(())
    }
}
