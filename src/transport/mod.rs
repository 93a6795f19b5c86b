// Copyright (c) 2025 - Cowboy AI, Inc.
//! Remote execution transport
//!
//! The dispatcher only needs three primitives from a transport: open an
//! authenticated session to a host, run one command string with captured
//! output, and close the session. Implementations:
//!
//! - [`OpenSshTransport`] - drives the system `ssh` client
//! - [`MockTransport`] - in-process test double that records submissions
//!
//! Connection and authentication failures come back as [`ConnectionError`]
//! values; they are never raised past the dispatcher.

pub mod mock;
pub mod ssh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CredentialSet, Host};
use crate::errors::ConnectionError;

pub use mock::{MockTransport, Submission};
pub use ssh::OpenSshTransport;

/// Captured result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Opens sessions to fleet hosts
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect and authenticate, trying `credentials` in order
    async fn connect(
        &self,
        host: &Host,
        credentials: &CredentialSet,
    ) -> Result<Box<dyn Session>, ConnectionError>;
}

/// A live, authenticated connection to one host
#[async_trait]
pub trait Session: Send {
    /// Run a command string in the remote shell
    async fn run(&mut self, command: &str) -> Result<CommandOutput, ConnectionError>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<(), ConnectionError>;
}
