// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fleet dispatch for a peer-to-peer test network
//!
//! Starts, configures and drives nodes of a p2p network spread over a set of
//! SSH-reachable hosts:
//!
//! - [`domain`] - hosts, credentials and the node topology
//! - [`config`] - TOML configuration loaded once and passed by reference
//! - [`command`] - shell command trees built from the configuration
//! - [`transport`] - remote sessions (system `ssh`, or a mock for tests)
//! - [`dispatch`] - concurrent fan-out with per-job isolation
//! - [`report`] - summary of a dispatch
//! - [`service`] - the operating modes tying it all together

pub mod command;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod report;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use command::{CommandBuilder, CommandSpec, RoleCommand};
pub use config::FleetConfig;
pub use dispatch::{ExecutionResult, FleetDispatcher, Job};
pub use domain::{Host, HostIndex, HostRegistry, NodeId, Topology};
pub use errors::{ConfigurationError, ConnectionError, FleetError, FleetResult, RemoteCommandError};
pub use report::{summarize, Summary};
pub use service::{FleetService, Mode, Plan, SyncScope};
pub use transport::{MockTransport, OpenSshTransport, Transport};
