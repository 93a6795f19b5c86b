// Copyright (c) 2025 - Cowboy AI, Inc.
//! Transport backed by the system OpenSSH client
//!
//! Every session authenticates with a probe (`ssh … true`) using each
//! identity in turn; the first identity that is accepted is kept for the
//! commands run on that session. The client always runs in batch mode so a
//! missing key fails instead of prompting.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CommandOutput, Session, Transport};
use crate::config::SshSettings;
use crate::domain::{CredentialSet, Host};
use crate::errors::ConnectionError;

/// Exit status the `ssh` client reserves for its own failures
const SSH_ERROR_STATUS: i32 = 255;

/// Launches `ssh` through `tokio::process`
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    settings: SshSettings,
    program: String,
}

impl OpenSshTransport {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            program: "ssh".to_string(),
        }
    }

    /// Use a different client binary (e.g. a wrapper script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments preceding the remote command
    pub fn base_args(&self, host: &Host, identity: Option<&PathBuf>) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            host.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(identity) = identity {
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        if let Some(secs) = self.settings.connect_timeout_secs {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={secs}"));
        }
        for option in &self.settings.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(host.destination());
        args
    }

    async fn exec(
        &self,
        host: &Host,
        identity: Option<&PathBuf>,
        command: &str,
    ) -> Result<CommandOutput, ConnectionError> {
        let output = Command::new(&self.program)
            .args(self.base_args(host, identity))
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ConnectionError::Spawn {
                host: host.alias.clone(),
                reason: e.to_string(),
            })?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn is_auth_failure(stderr: &str) -> bool {
    stderr.contains("Permission denied")
        || stderr.contains("Too many authentication failures")
        || stderr.contains("no such identity")
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn connect(
        &self,
        host: &Host,
        credentials: &CredentialSet,
    ) -> Result<Box<dyn Session>, ConnectionError> {
        let identities = credentials.for_host(host);
        let attempts: Vec<Option<&PathBuf>> = if identities.is_empty() {
            vec![None]
        } else {
            identities.iter().map(Some).collect()
        };

        let mut last_reason = String::new();
        for identity in attempts.iter().copied() {
            let probe = self.exec(host, identity, "true").await?;
            if probe.success() {
                debug!(
                    "Authenticated to {} with {}",
                    host,
                    identity.map_or("agent".to_string(), |p| p.display().to_string())
                );
                return Ok(Box::new(OpenSshSession {
                    transport: self.clone(),
                    host: host.clone(),
                    identity: identity.cloned(),
                }));
            }

            let reason = probe.stderr.trim().to_string();
            if probe.exit_code == Some(SSH_ERROR_STATUS) && !is_auth_failure(&reason) {
                return Err(ConnectionError::Unreachable {
                    host: host.alias.clone(),
                    reason,
                });
            }
            warn!("Identity rejected by {}: {}", host, reason);
            last_reason = reason;
        }

        Err(ConnectionError::Authentication {
            host: host.alias.clone(),
            attempts: attempts.len(),
            reason: last_reason,
        })
    }
}

/// Session over the identity that authenticated
#[derive(Debug)]
pub struct OpenSshSession {
    transport: OpenSshTransport,
    host: Host,
    identity: Option<PathBuf>,
}

#[async_trait]
impl Session for OpenSshSession {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, ConnectionError> {
        debug!("[{}] $ {}", self.host.alias, command);
        self.transport
            .exec(&self.host, self.identity.as_ref(), command)
            .await
    }

    async fn close(self: Box<Self>) -> Result<(), ConnectionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HostAddress;

    fn host() -> Host {
        Host::new("a", HostAddress::new("10.0.0.1").unwrap(), 2222, "ubuntu")
    }

    #[test]
    fn test_base_args_with_identity() {
        let transport = OpenSshTransport::new(SshSettings {
            connect_timeout_secs: Some(5),
            options: vec!["StrictHostKeyChecking=accept-new".to_string()],
            ..SshSettings::default()
        });
        let identity = PathBuf::from("/keys/pem1.pem");
        assert_eq!(
            transport.base_args(&host(), Some(&identity)),
            vec![
                "-p",
                "2222",
                "-o",
                "BatchMode=yes",
                "-o",
                "IdentitiesOnly=yes",
                "-i",
                "/keys/pem1.pem",
                "-o",
                "ConnectTimeout=5",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "ubuntu@10.0.0.1",
            ]
        );
    }

    #[test]
    fn test_base_args_without_identity() {
        let transport = OpenSshTransport::new(SshSettings::default());
        assert_eq!(
            transport.base_args(&host(), None),
            vec!["-p", "2222", "-o", "BatchMode=yes", "ubuntu@10.0.0.1"]
        );
    }

    #[test]
    fn test_auth_failure_detection() {
        assert!(is_auth_failure("ubuntu@10.0.0.1: Permission denied (publickey)."));
        assert!(!is_auth_failure("ssh: connect to host 10.0.0.1 port 22: Connection refused"));
    }

    #[tokio::test]
    async fn test_missing_client_is_spawn_error() {
        let transport = OpenSshTransport::new(SshSettings::default())
            .with_program("/nonexistent/cim-fleet-ssh");
        let err = transport
            .connect(&host(), &CredentialSet::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::Spawn { .. }));
    }
}
