// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-fleet
//!
//! Deterministic fleets for dispatch tests. Every fixture uses private
//! addresses and a single placeholder identity file; nothing here ever
//! touches a real host since all dispatch tests run on `MockTransport`.

#![allow(dead_code)]

use std::sync::Arc;

use cim_fleet::config::{LaunchSettings, Repository, RepositoryFork, SshSettings, Toolchain};
use cim_fleet::domain::{CredentialSet, Host, HostAddress, HostIndex, HostRegistry, Topology};
use cim_fleet::{FleetConfig, FleetDispatcher, FleetService, MockTransport};

pub const IDENTITY: &str = "/home/ubuntu/pem1.pem";

pub const HOST_ADDRESSES: [&str; 3] = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];

/// Host with alias `host<i>` at `HOST_ADDRESSES[i]`
pub fn host(i: usize) -> Host {
    Host::new(
        format!("host{i}"),
        HostAddress::new(HOST_ADDRESSES[i]).expect("Invalid address in test fixture"),
        22,
        "ubuntu",
    )
}

pub fn registry(hosts: usize) -> HostRegistry {
    HostRegistry::new((0..hosts).map(host).collect()).expect("Duplicate alias in test fixture")
}

/// One node per host, node `i` on host `i`
pub fn one_node_per_host(hosts: usize) -> Topology {
    Topology::new((0..hosts).map(HostIndex::new).collect())
}

pub fn repositories() -> Vec<Repository> {
    vec![
        Repository::new("go-libp2p", "libp2p"),
        Repository::new("go-floodsub", "libp2p").with_fork(RepositoryFork {
            owner: "mhchia".to_string(),
            remote: "mine".to_string(),
            branch: "gossipsub-big-buffer".to_string(),
        }),
        Repository::new("sharding-p2p-poc", "mhchia").with_branch("test-speed"),
    ]
}

pub fn fleet_config(hosts: usize, topology: Topology) -> FleetConfig {
    FleetConfig::new(
        Toolchain::default(),
        LaunchSettings::default(),
        SshSettings {
            identities: CredentialSet::new(vec![IDENTITY.into()]),
            ..SshSettings::default()
        },
        registry(hosts),
        repositories(),
        topology,
    )
    .expect("Invalid fleet in test fixture")
}

pub fn dispatcher(transport: &MockTransport) -> FleetDispatcher {
    FleetDispatcher::new(
        Arc::new(transport.clone()),
        CredentialSet::new(vec![IDENTITY.into()]),
    )
}

pub fn service(config: FleetConfig, transport: &MockTransport) -> FleetService {
    FleetService::new(Arc::new(config), Arc::new(transport.clone()))
}
