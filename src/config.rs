// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fleet configuration
//!
//! Everything the dispatcher needs is read once from a TOML file into an
//! immutable [`FleetConfig`] and passed by reference from then on.
//!
//! ```toml
//! [toolchain]
//! gopath = "$HOME/go"
//!
//! [launch]
//! executable = "sharding-p2p-poc"
//! repository = "sharding-p2p-poc"
//!
//! [ssh]
//! identities = ["/home/ubuntu/pem1.pem", "/home/ubuntu/pem2.pem"]
//!
//! [[hosts]]
//! alias = "local"
//! address = "127.0.0.1"
//! user = "ubuntu"
//!
//! [[repositories]]
//! name = "sharding-p2p-poc"
//! owner = "mhchia"
//! branch = "test-speed"
//!
//! [topology]
//! node_hosts = [0, 0]
//! peer_chain = true
//! subscribe_all = [1]
//!
//! [[topology.broadcasts]]
//! node = 1
//! shard_id = 1
//! count = 10
//! size = 1000000
//! period = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::domain::{
    BroadcastSchedule, CredentialSet, Host, HostIndex, HostRegistry, NodeId, ShardId, Topology,
};
use crate::errors::{ConfigurationError, FleetResult};

/// Environment variable overriding the configuration path
pub const CONFIG_ENV: &str = "CIM_FLEET_CONFIG";

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "fleet.toml";

/// Go toolchain locations on the remote hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    pub gopath: String,
    /// GOROOT used when the remote `uname` is not Darwin
    pub goroot_linux: String,
    /// GOROOT used when the remote `uname` is Darwin
    pub goroot_darwin: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            gopath: "$HOME/go".to_string(),
            goroot_linux: "/usr/local/go".to_string(),
            goroot_darwin: "/usr/local/Cellar/go/1.10.2/libexec".to_string(),
        }
    }
}

/// How the node binary is started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Binary produced by `go build` in the launch repository
    pub executable: String,
    /// Repository the binary is built from
    pub repository: String,
    /// Node output goes to `<log_prefix>_<node>.out`
    pub log_prefix: String,
    /// Seconds to wait after killing an old instance or starting a new one
    pub restart_delay_secs: u64,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            executable: "sharding-p2p-poc".to_string(),
            repository: "sharding-p2p-poc".to_string(),
            log_prefix: "poc".to_string(),
            restart_delay_secs: 1,
        }
    }
}

/// SSH client settings shared by every session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Identity files tried in order
    pub identities: CredentialSet,
    /// Passed as `-o ConnectTimeout=<secs>`
    pub connect_timeout_secs: Option<u64>,
    /// Extra `-o` options, e.g. `StrictHostKeyChecking=accept-new`
    pub options: Vec<String>,
}

/// A fork to track instead of the upstream branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFork {
    pub owner: String,
    pub remote: String,
    pub branch: String,
}

/// Go repository synchronised on every host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    /// Upstream owner; also decides the import path
    pub owner: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<RepositoryFork>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

impl Repository {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            remote: default_remote(),
            branch: default_branch(),
            fork: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_fork(mut self, fork: RepositoryFork) -> Self {
        self.fork = Some(fork);
        self
    }

    /// Go import path, `github.com/<owner>/<name>`
    pub fn import_path(&self) -> String {
        format!("github.com/{}/{}", self.owner, self.name)
    }

    /// Checkout location under the GOPATH
    pub fn src_path(&self, toolchain: &Toolchain) -> String {
        format!("{}/src/{}", toolchain.gopath, self.import_path())
    }

    /// Remote and branch actually checked out: the fork when present
    pub fn tracking(&self) -> (&str, &str) {
        match &self.fork {
            Some(fork) => (fork.remote.as_str(), fork.branch.as_str()),
            None => (self.remote.as_str(), self.branch.as_str()),
        }
    }

    /// Clone URL of whatever is being tracked
    pub fn tracking_url(&self) -> String {
        let owner = self.fork.as_ref().map_or(&self.owner, |fork| &fork.owner);
        format!("https://github.com/{}/{}", owner, self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PeerEntry {
    node: NodeId,
    target: NodeId,
}

#[derive(Debug, Clone, Deserialize)]
struct SubscriptionEntry {
    node: NodeId,
    shards: Vec<ShardId>,
}

#[derive(Debug, Clone, Deserialize)]
struct BroadcastEntry {
    node: NodeId,
    #[serde(flatten)]
    schedule: BroadcastSchedule,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct TopologySection {
    node_hosts: Vec<HostIndex>,
    peer_chain: bool,
    peers: Vec<PeerEntry>,
    subscribe_all: Vec<ShardId>,
    subscriptions: Vec<SubscriptionEntry>,
    broadcasts: Vec<BroadcastEntry>,
}

impl TopologySection {
    fn into_topology(self) -> Topology {
        let mut topology = Topology::new(self.node_hosts);
        if self.peer_chain {
            topology = topology.with_peer_chain();
        }
        for PeerEntry { node, target } in self.peers {
            topology = topology.with_peer(node, target);
        }
        if !self.subscribe_all.is_empty() {
            topology = topology.with_subscriptions_for_all(&self.subscribe_all);
        }
        for SubscriptionEntry { node, shards } in self.subscriptions {
            topology = topology.with_subscriptions(node, shards);
        }
        for BroadcastEntry { node, schedule } in self.broadcasts {
            topology = topology.with_broadcast(node, schedule);
        }
        topology
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    toolchain: Toolchain,
    #[serde(default)]
    launch: LaunchSettings,
    #[serde(default)]
    ssh: SshSettings,
    hosts: Vec<Host>,
    #[serde(default)]
    repositories: Vec<Repository>,
    #[serde(default)]
    topology: TopologySection,
}

/// Validated, immutable fleet configuration
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub toolchain: Toolchain,
    pub launch: LaunchSettings,
    pub ssh: SshSettings,
    pub registry: HostRegistry,
    pub repositories: Vec<Repository>,
    pub topology: Topology,
}

impl FleetConfig {
    /// Assemble and validate a configuration
    pub fn new(
        toolchain: Toolchain,
        launch: LaunchSettings,
        ssh: SshSettings,
        registry: HostRegistry,
        repositories: Vec<Repository>,
        topology: Topology,
    ) -> Result<Self, ConfigurationError> {
        let config = Self {
            toolchain,
            launch,
            ssh,
            registry,
            repositories,
            topology,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> FleetResult<Self> {
        let path = path.as_ref();
        debug!("Loading fleet configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        let file: ConfigFile = toml::from_str(text)?;
        Self::new(
            file.toolchain,
            file.launch,
            file.ssh,
            HostRegistry::new(file.hosts)?,
            file.repositories,
            file.topology.into_topology(),
        )
    }

    /// Structural checks run before anything is dispatched
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.topology.validate(&self.registry)?;
        self.launch_repository()?;
        let anonymous = self.registry.iter().any(|(_, host)| host.identity.is_none());
        if anonymous && self.ssh.identities.is_empty() {
            return Err(ConfigurationError::NoCredentials);
        }
        Ok(())
    }

    /// Repository the node binary is built from
    pub fn launch_repository(&self) -> Result<&Repository, ConfigurationError> {
        self.repository(&self.launch.repository)
    }

    pub fn repository(&self, name: &str) -> Result<&Repository, ConfigurationError> {
        self.repositories
            .iter()
            .find(|repo| repo.name == name)
            .ok_or_else(|| ConfigurationError::UnknownRepository(name.to_string()))
    }
}
