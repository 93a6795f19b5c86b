// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Descriptor
//!
//! Maps logical nodes onto hosts and describes the mesh the nodes form once
//! launched: which peer each node dials, which shards it subscribes to, and
//! which nodes broadcast collations.
//!
//! A topology is checked against the [`HostRegistry`] as a whole with
//! [`Topology::validate`] before anything is dispatched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{Host, HostIndex, HostRegistry, NodeId};
use crate::errors::ConfigurationError;

/// Shard identifier understood by the node binary
pub type ShardId = u64;

/// Collation broadcast parameters for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSchedule {
    pub shard_id: ShardId,
    /// Number of collations to send
    pub count: u64,
    /// Collation size in bytes
    pub size: u64,
    /// Delay between collations
    pub period: u64,
}

/// Per-node role parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleData {
    /// Shards to subscribe to, in order
    #[serde(default)]
    pub subscriptions: Vec<ShardId>,

    #[serde(default)]
    pub broadcast: Option<BroadcastSchedule>,
}

impl RoleData {
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.broadcast.is_none()
    }
}

/// Assignment of nodes to hosts plus the peer/role relationships between them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    node_hosts: Vec<HostIndex>,
    peers: BTreeMap<NodeId, NodeId>,
    roles: BTreeMap<NodeId, RoleData>,
}

impl Topology {
    /// One node per entry; entry `i` is the host node `i` runs on
    pub fn new(node_hosts: Vec<HostIndex>) -> Self {
        Self {
            node_hosts,
            ..Self::default()
        }
    }

    /// Node `node` dials `target` when peers are wired up
    pub fn with_peer(mut self, node: NodeId, target: NodeId) -> Self {
        self.peers.insert(node, target);
        self
    }

    /// Every node dials its predecessor (node i+1 → node i)
    pub fn with_peer_chain(mut self) -> Self {
        for i in 1..self.node_hosts.len() {
            self.peers.insert(NodeId::new(i), NodeId::new(i - 1));
        }
        self
    }

    pub fn with_subscriptions(mut self, node: NodeId, shards: Vec<ShardId>) -> Self {
        self.roles.entry(node).or_default().subscriptions = shards;
        self
    }

    /// Every node subscribes to the same shards
    pub fn with_subscriptions_for_all(mut self, shards: &[ShardId]) -> Self {
        for node in self.nodes().collect::<Vec<_>>() {
            self.roles.entry(node).or_default().subscriptions = shards.to_vec();
        }
        self
    }

    pub fn with_broadcast(mut self, node: NodeId, schedule: BroadcastSchedule) -> Self {
        self.roles.entry(node).or_default().broadcast = Some(schedule);
        self
    }

    /// Host index a node is assigned to
    pub fn host_index_for(&self, node: NodeId) -> Result<HostIndex, ConfigurationError> {
        self.node_hosts
            .get(node.index())
            .copied()
            .ok_or(ConfigurationError::UnknownNode(node))
    }

    /// Host a node runs on
    pub fn host_for<'r>(
        &self,
        registry: &'r HostRegistry,
        node: NodeId,
    ) -> Result<&'r Host, ConfigurationError> {
        registry.resolve(self.host_index_for(node)?)
    }

    /// Peer the node should dial, if any
    pub fn peer_target_for(&self, node: NodeId) -> Option<NodeId> {
        self.peers.get(&node).copied()
    }

    /// Role parameters for a node; empty when none are configured
    pub fn role_data_for(&self, node: NodeId) -> RoleData {
        self.roles.get(&node).cloned().unwrap_or_default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.node_hosts.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_hosts.len()).map(NodeId::new)
    }

    pub fn node_count(&self) -> usize {
        self.node_hosts.len()
    }

    /// Distinct hosts referenced by the assignment, in index order
    pub fn hosts_in_use(&self) -> Vec<HostIndex> {
        self.node_hosts
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Check every reference in the topology against the registry
    pub fn validate(&self, registry: &HostRegistry) -> Result<(), ConfigurationError> {
        for &index in &self.node_hosts {
            registry.resolve(index)?;
        }
        for (&node, &peer) in &self.peers {
            if !self.contains(node) {
                return Err(ConfigurationError::UnknownNode(node));
            }
            if !self.contains(peer) {
                return Err(ConfigurationError::UnknownPeer { node, peer });
            }
        }
        if let Some(&node) = self.roles.keys().find(|node| !self.contains(**node)) {
            return Err(ConfigurationError::UnknownNode(node));
        }
        Ok(())
    }
}
