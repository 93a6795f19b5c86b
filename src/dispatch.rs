// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fleet Dispatcher
//!
//! Fans a set of jobs out over independent remote sessions and gathers one
//! [`ExecutionResult`] per job.
//!
//! ```text
//! jobs ──┬── spawn ── connect ── run ── close ──┐
//!        ├── spawn ── connect ── run ── close ──┼── join ── BTreeMap<target, result>
//!        └── spawn ── connect ✗ ────────────────┘
//! ```
//!
//! Every job gets its own task and its own session, even when several jobs
//! target the same host. A failure in one job (connection refused, non-zero
//! exit, even a panic) is recorded in that job's result and never affects
//! its siblings. There is no ordering between jobs, no timeout and no retry.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::command::CommandSpec;
use crate::config::FleetConfig;
use crate::domain::{CredentialSet, Host, NodeId};
use crate::errors::{ConfigurationError, ConnectionError, FleetError, RemoteCommandError};
use crate::transport::{CommandOutput, Transport};

/// One command bound for one host, keyed by a target id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<K> {
    pub target: K,
    pub host: Host,
    pub command: CommandSpec,
}

impl<K> Job<K> {
    pub fn new(target: K, host: Host, command: CommandSpec) -> Self {
        Self {
            target,
            host,
            command,
        }
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command ran; it may still have exited non-zero
    Completed(CommandOutput),
    /// The session could not be opened or broke while running
    ConnectionFailed(ConnectionError),
    /// The job's task panicked
    Aborted(String),
}

/// Result of one job, created once and read-only afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult<K> {
    pub target: K,
    /// Alias of the host the job ran on
    pub host: String,
    /// Exact command string submitted
    pub command: String,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<K> ExecutionResult<K> {
    pub fn success(&self) -> bool {
        matches!(&self.outcome, Outcome::Completed(output) if output.success())
    }

    pub fn output(&self) -> Option<&CommandOutput> {
        match &self.outcome {
            Outcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn stdout(&self) -> &str {
        self.output().map_or("", |o| o.stdout.as_str())
    }

    pub fn stderr(&self) -> &str {
        self.output().map_or("", |o| o.stderr.as_str())
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.output().and_then(|o| o.exit_code)
    }

    /// The error this result represents, if it failed
    pub fn error(&self) -> Option<FleetError> {
        match &self.outcome {
            Outcome::Completed(output) if output.success() => None,
            Outcome::Completed(output) => Some(
                RemoteCommandError {
                    host: self.host.clone(),
                    exit_code: output.exit_code,
                    stderr: output.stderr.clone(),
                }
                .into(),
            ),
            Outcome::ConnectionFailed(err) => Some(err.clone().into()),
            Outcome::Aborted(reason) => Some(FleetError::Io(std::io::Error::other(reason.clone()))),
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Results keyed by target, each written exactly once
pub type DispatchResults<K> = BTreeMap<K, ExecutionResult<K>>;

/// Runs jobs concurrently over a [`Transport`]
#[derive(Clone)]
pub struct FleetDispatcher {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialSet>,
}

impl FleetDispatcher {
    pub fn new(transport: Arc<dyn Transport>, credentials: CredentialSet) -> Self {
        Self {
            transport,
            credentials: Arc::new(credentials),
        }
    }

    /// Run every job concurrently and wait for all of them
    ///
    /// A target that appears more than once is only dispatched the first time.
    pub async fn dispatch<K>(&self, jobs: Vec<Job<K>>) -> DispatchResults<K>
    where
        K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    {
        let run_id = Uuid::now_v7();
        let span = info_span!("dispatch", %run_id);
        info!(parent: &span, "Dispatching {} jobs", jobs.len());

        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            if !seen.insert(job.target.to_string()) {
                warn!(parent: &span, "Skipping duplicate job for target {}", job.target);
                continue;
            }
            let target = job.target.clone();
            let host = job.host.clone();
            let command = job.command.render();
            let spawned_at = Utc::now();
            let task = run_job(
                Arc::clone(&self.transport),
                Arc::clone(&self.credentials),
                job,
            )
            .instrument(span.clone());
            handles.push((target, host, command, spawned_at, tokio::spawn(task)));
        }

        let joined = join_all(handles.into_iter().map(|(target, host, command, spawned_at, handle)| async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Job for target {} aborted: {}", target, e);
                    ExecutionResult {
                        target,
                        host: host.alias,
                        command,
                        outcome: Outcome::Aborted(e.to_string()),
                        started_at: spawned_at,
                        finished_at: Utc::now(),
                    }
                }
            }
        }))
        .await;

        let results: DispatchResults<K> = joined
            .into_iter()
            .map(|result| (result.target.clone(), result))
            .collect();
        let failed = results.values().filter(|r| !r.success()).count();
        info!(parent: &span, "Dispatch finished: {} ok, {} failed", results.len() - failed, failed);
        results
    }

    /// Dispatch one command per node, resolving hosts through the topology
    ///
    /// Every node is resolved before anything is sent; a configuration error
    /// for any node aborts the whole dispatch.
    pub async fn dispatch_nodes<F>(
        &self,
        config: &FleetConfig,
        nodes: impl IntoIterator<Item = NodeId>,
        mut command_for: F,
    ) -> Result<DispatchResults<NodeId>, ConfigurationError>
    where
        F: FnMut(NodeId) -> Result<CommandSpec, ConfigurationError>,
    {
        let mut jobs = Vec::new();
        for node in nodes {
            let host = config.topology.host_for(&config.registry, node)?.clone();
            jobs.push(Job::new(node, host, command_for(node)?));
        }
        Ok(self.dispatch(jobs).await)
    }
}

async fn run_job<K: fmt::Display>(
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialSet>,
    job: Job<K>,
) -> ExecutionResult<K> {
    let started_at = Utc::now();
    let command = job.command.render();
    debug!("[{}] {} $ {}", job.target, job.host.alias, command);

    let outcome = match transport.connect(&job.host, &credentials).await {
        Err(e) => {
            error!("[{}] connection to {} failed: {}", job.target, job.host, e);
            Outcome::ConnectionFailed(e)
        }
        Ok(mut session) => {
            let outcome = match session.run(&command).await {
                Ok(output) => Outcome::Completed(output),
                Err(e) => {
                    error!("[{}] session on {} broke: {}", job.target, job.host, e);
                    Outcome::ConnectionFailed(e)
                }
            };
            if let Err(e) = session.close().await {
                warn!("[{}] closing session on {} failed: {}", job.target, job.host, e);
            }
            outcome
        }
    };

    ExecutionResult {
        target: job.target,
        host: job.host.alias,
        command,
        outcome,
        started_at,
        finished_at: Utc::now(),
    }
}
