// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for fleet operations

use thiserror::Error;

use crate::domain::{HostIndex, NodeId};

/// Structural problems in the host registry or topology.
///
/// These are fatal and are detected before any session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Host index outside the registry
    #[error("host index {index} out of range (registry has {len} hosts)")]
    HostIndexOutOfRange { index: HostIndex, len: usize },

    /// Node not present in the topology
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Peer map points at a node that does not exist
    #[error("node {node} targets unknown peer {peer}")]
    UnknownPeer { node: NodeId, peer: NodeId },

    /// Host address is neither an IP literal nor a valid hostname
    #[error("invalid host address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Two hosts share the same alias
    #[error("duplicate host alias {0:?}")]
    DuplicateAlias(String),

    /// No identity file is available to authenticate with
    #[error("no SSH credentials configured")]
    NoCredentials,

    /// Launch repository is not among the configured repositories
    #[error("unknown repository {0:?}")]
    UnknownRepository(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Transport-level failure to reach or authenticate against a host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The SSH client process could not be started
    #[error("failed to spawn transport for {host}: {reason}")]
    Spawn { host: String, reason: String },

    /// Every configured identity was rejected
    #[error("authentication to {host} failed with all {attempts} identities: {reason}")]
    Authentication {
        host: String,
        attempts: usize,
        reason: String,
    },

    /// The host could not be reached
    #[error("host {host} unreachable: {reason}")]
    Unreachable { host: String, reason: String },
}

/// A remote command finished with a non-zero exit status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote command on {host} exited with {}", describe_exit(.exit_code))]
pub struct RemoteCommandError {
    pub host: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

/// Errors that can occur in fleet operations
#[derive(Debug, Error)]
pub enum FleetError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Remote command error
    #[error("Remote command error: {0}")]
    RemoteCommand(#[from] RemoteCommandError),

    /// Invalid mode requested on the command line
    #[error("Usage error: unknown mode {mode:?} (expected one of: {expected})")]
    Usage { mode: String, expected: String },

    /// One or more targets failed during a dispatch
    #[error("{failed} of {total} targets failed:\n{details}")]
    RemoteFailures {
        failed: usize,
        total: usize,
        details: String,
    },

    /// Local I/O error (reading configuration, spawning processes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fleet operations
pub type FleetResult<T> = Result<T, FleetError>;

impl From<toml::de::Error> for ConfigurationError {
    fn from(err: toml::de::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for FleetError {
    fn from(err: toml::de::Error) -> Self {
        FleetError::Configuration(err.into())
    }
}
