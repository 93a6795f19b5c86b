// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fleet Service
//!
//! Turns a [`Mode`] into a [`Plan`] of jobs with the command builder, runs
//! the plan through the dispatcher and reports the outcome.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::mode::Mode;
use crate::command::{CommandBuilder, CommandSpec};
use crate::config::FleetConfig;
use crate::dispatch::{DispatchResults, FleetDispatcher, Job};
use crate::domain::{HostIndex, NodeId};
use crate::errors::{ConfigurationError, FleetResult};
use crate::report::summarize;
use crate::transport::Transport;

/// One planned job, flattened for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub target: String,
    pub host: String,
    pub destination: String,
    pub port: u16,
    pub command: String,
}

impl<K: fmt::Display> From<&Job<K>> for PlannedCommand {
    fn from(job: &Job<K>) -> Self {
        Self {
            target: job.target.to_string(),
            host: job.host.alias.clone(),
            destination: job.host.destination(),
            port: job.host.port,
            command: job.command.render(),
        }
    }
}

impl fmt::Display for PlannedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}:{}\n    {}", self.target, self.destination, self.port, self.command)
    }
}

/// Jobs for one mode, before anything is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Nodes(Vec<Job<NodeId>>),
    Hosts(Vec<Job<HostIndex>>),
}

impl Plan {
    pub fn len(&self) -> usize {
        match self {
            Plan::Nodes(jobs) => jobs.len(),
            Plan::Hosts(jobs) => jobs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One entry per job, for dry runs
    pub fn describe(&self) -> Vec<PlannedCommand> {
        match self {
            Plan::Nodes(jobs) => jobs.iter().map(PlannedCommand::from).collect(),
            Plan::Hosts(jobs) => jobs.iter().map(PlannedCommand::from).collect(),
        }
    }
}

/// Results of an executed [`Plan`]
#[derive(Debug, Clone)]
pub enum Dispatched {
    Nodes(DispatchResults<NodeId>),
    Hosts(DispatchResults<HostIndex>),
}

impl Dispatched {
    /// Log per-target lines and fail when any target failed
    ///
    /// Returns the number of targets on success.
    pub fn report(&self) -> FleetResult<usize> {
        match self {
            Dispatched::Nodes(results) => {
                let summary = summarize(results);
                summary.log(results);
                Ok(summary.into_result()?.total)
            }
            Dispatched::Hosts(results) => {
                let summary = summarize(results);
                summary.log(results);
                Ok(summary.into_result()?.total)
            }
        }
    }
}

/// Hosts a sync run builds on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncScope {
    /// Only hosts that run at least one node
    #[default]
    HostsInUse,
    /// Every host in the registry
    Registry,
}

/// Application service composing builder, dispatcher and reporter
#[derive(Clone)]
pub struct FleetService {
    config: Arc<FleetConfig>,
    dispatcher: FleetDispatcher,
    sync_scope: SyncScope,
}

impl FleetService {
    pub fn new(config: Arc<FleetConfig>, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = FleetDispatcher::new(transport, config.ssh.identities.clone());
        Self {
            config,
            dispatcher,
            sync_scope: SyncScope::default(),
        }
    }

    pub fn with_sync_scope(mut self, scope: SyncScope) -> Self {
        self.sync_scope = scope;
        self
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Build every job for `mode` without contacting any host
    pub fn plan(&self, mode: Mode) -> Result<Plan, ConfigurationError> {
        let config = self.config.as_ref();
        let builder = CommandBuilder::new(config);
        let topology = &config.topology;

        let node_job = |node: NodeId, command: CommandSpec| -> Result<Job<NodeId>, ConfigurationError> {
            let host = topology.host_for(&config.registry, node)?.clone();
            Ok(Job::new(node, host, command))
        };

        let plan = match mode {
            Mode::Server => Plan::Nodes(
                topology
                    .nodes()
                    .map(|node| node_job(node, builder.server_start(node)?))
                    .collect::<Result<_, _>>()?,
            ),
            Mode::Up => Plan::Nodes(
                topology
                    .nodes()
                    .map(|node| node_job(node, builder.node_command(node)?))
                    .collect::<Result<_, _>>()?,
            ),
            Mode::Role(role) => {
                let mut jobs = Vec::new();
                for node in topology.nodes() {
                    if let Some(command) = builder.role_command(node, role)? {
                        jobs.push(node_job(node, command)?);
                    }
                }
                Plan::Nodes(jobs)
            }
            Mode::Sync => {
                let command = builder.sync_and_build()?;
                let hosts = match self.sync_scope {
                    SyncScope::HostsInUse => topology.hosts_in_use(),
                    SyncScope::Registry => config.registry.iter().map(|(index, _)| index).collect(),
                };
                let jobs = hosts
                    .into_iter()
                    .map(|index| -> Result<Job<HostIndex>, ConfigurationError> {
                        let host = config.registry.resolve(index)?.clone();
                        Ok(Job::new(index, host, command.clone()))
                    })
                    .collect::<Result<_, _>>()?;
                Plan::Hosts(jobs)
            }
        };
        Ok(plan)
    }

    pub async fn execute(&self, plan: Plan) -> Dispatched {
        match plan {
            Plan::Nodes(jobs) => Dispatched::Nodes(self.dispatcher.dispatch(jobs).await),
            Plan::Hosts(jobs) => Dispatched::Hosts(self.dispatcher.dispatch(jobs).await),
        }
    }

    /// Plan, dispatch and report one mode
    pub async fn run(&self, mode: Mode) -> FleetResult<usize> {
        let plan = self.plan(mode)?;
        if plan.is_empty() {
            warn!("Mode {} has no targets in this topology", mode);
            return Ok(0);
        }
        info!("🚀 Running {} on {} targets", mode, plan.len());
        self.execute(plan).await.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RoleCommand;
    use crate::config::{LaunchSettings, Repository, SshSettings, Toolchain};
    use crate::domain::{CredentialSet, Host, HostAddress, HostRegistry, Topology};
    use crate::transport::MockTransport;

    fn service(topology: Topology, transport: MockTransport) -> FleetService {
        let registry = HostRegistry::new(vec![
            Host::new("a", HostAddress::new("10.0.0.1").unwrap(), 22, "ubuntu"),
            Host::new("b", HostAddress::new("10.0.0.2").unwrap(), 22, "ubuntu"),
        ])
        .unwrap();
        let config = FleetConfig::new(
            Toolchain::default(),
            LaunchSettings::default(),
            SshSettings {
                identities: CredentialSet::new(vec!["/keys/id.pem".into()]),
                ..SshSettings::default()
            },
            registry,
            vec![Repository::new("sharding-p2p-poc", "mhchia")],
            topology,
        )
        .unwrap();
        FleetService::new(Arc::new(config), Arc::new(transport))
    }

    fn three_nodes() -> Topology {
        Topology::new(vec![HostIndex::new(0), HostIndex::new(1), HostIndex::new(1)])
    }

    #[test]
    fn test_role_plan_only_targets_configured_nodes() {
        let service = service(
            three_nodes().with_peer(NodeId::new(2), NodeId::new(0)),
            MockTransport::new(),
        );
        match service.plan(Mode::Role(RoleCommand::AddPeer)).unwrap() {
            Plan::Nodes(jobs) => {
                assert_eq!(jobs.len(), 1);
                assert_eq!(jobs[0].target, NodeId::new(2));
                assert_eq!(jobs[0].host.alias, "b");
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_sync_plan_targets_each_host_once() {
        let service = service(three_nodes(), MockTransport::new());
        let plan = service.plan(Mode::Sync).unwrap();
        assert!(matches!(&plan, Plan::Hosts(jobs) if jobs.len() == 2));
        assert_eq!(plan.describe().len(), 2);
        let entries = plan.describe();
        assert_eq!(entries[0].host, "a");
        assert!(entries[0].to_string().starts_with("[0] ubuntu@10.0.0.1:22\n    export GOPATH="));
    }

    #[test]
    fn test_sync_scope_registry_includes_idle_hosts() {
        let topology = Topology::new(vec![HostIndex::new(0), HostIndex::new(0)]);
        let in_use = service(topology.clone(), MockTransport::new());
        assert_eq!(in_use.plan(Mode::Sync).unwrap().len(), 1);

        let registry = in_use.with_sync_scope(SyncScope::Registry);
        let hosts: Vec<String> = registry
            .plan(Mode::Sync)
            .unwrap()
            .describe()
            .into_iter()
            .map(|entry| entry.host)
            .collect();
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_server_mode() {
        let transport = MockTransport::new();
        let service = service(three_nodes(), transport.clone());
        assert_eq!(service.run(Mode::Server).await.unwrap(), 3);
        assert_eq!(transport.submissions_for("b").len(), 2);
    }

    #[tokio::test]
    async fn test_run_without_targets_sends_nothing() {
        let transport = MockTransport::new();
        let service = service(three_nodes(), transport.clone());
        assert_eq!(service.run(Mode::Role(RoleCommand::Broadcast)).await.unwrap(), 0);
        assert!(transport.submissions().is_empty());
    }
}
