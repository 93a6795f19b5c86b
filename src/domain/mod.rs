// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fleet Domain Models
//!
//! Value objects and immutable tables describing the fleet: where hosts are,
//! how logical nodes map onto them, and what each node does once launched.
//!
//! - [`HostAddress`] - IP literal or RFC 1123 hostname
//! - [`Host`] / [`HostRegistry`] - reachable machines, resolved by [`HostIndex`]
//! - [`CredentialSet`] - identity files tried in order
//! - [`Topology`] - node → host, node → peer, node → [`RoleData`]

pub mod address;
pub mod host;
pub mod ids;
pub mod topology;

pub use address::HostAddress;
pub use host::{CredentialSet, Host, HostRegistry};
pub use ids::{HostIndex, NodeId};
pub use topology::{BroadcastSchedule, RoleData, ShardId, Topology};
