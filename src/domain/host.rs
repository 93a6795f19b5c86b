// Copyright (c) 2025 - Cowboy AI, Inc.
//! Host Registry
//!
//! Static list of machines reachable over SSH. Loaded once at startup and
//! never mutated; hosts are identified by their [`HostIndex`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use super::{HostAddress, HostIndex};
use crate::errors::ConfigurationError;

fn default_port() -> u16 {
    22
}

/// A machine in the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Short human-readable name used in logs and reports
    pub alias: String,

    /// IP literal or hostname
    pub address: HostAddress,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user
    pub user: String,

    /// Identity file to try before the fleet-wide credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<PathBuf>,
}

impl Host {
    pub fn new(alias: impl Into<String>, address: HostAddress, port: u16, user: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            address,
            port,
            user: user.into(),
            identity: None,
        }
    }

    /// `user@address` destination for the SSH client
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.alias, self.address, self.port)
    }
}

/// Ordered list of identity files tried until one authenticates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSet(Vec<PathBuf>);

impl CredentialSet {
    pub fn new(identities: Vec<PathBuf>) -> Self {
        Self(identities)
    }

    /// Identities to try for `host`: its own override first, then the fleet-wide list
    pub fn for_host(&self, host: &Host) -> Vec<PathBuf> {
        let mut identities = Vec::with_capacity(self.0.len() + 1);
        if let Some(identity) = &host.identity {
            identities.push(identity.clone());
        }
        identities.extend(self.0.iter().filter(|id| Some(*id) != host.identity.as_ref()).cloned());
        identities
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }
}

/// Immutable registry of fleet hosts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRegistry {
    hosts: Vec<Host>,
}

impl HostRegistry {
    /// Build a registry, rejecting duplicate aliases
    pub fn new(hosts: Vec<Host>) -> Result<Self, ConfigurationError> {
        let mut seen = HashSet::new();
        for host in &hosts {
            if !seen.insert(host.alias.as_str()) {
                return Err(ConfigurationError::DuplicateAlias(host.alias.clone()));
            }
        }
        Ok(Self { hosts })
    }

    /// Resolve a host index, failing when it is past the end of the registry
    pub fn resolve(&self, index: HostIndex) -> Result<&Host, ConfigurationError> {
        self.hosts
            .get(index.index())
            .ok_or(ConfigurationError::HostIndexOutOfRange {
                index,
                len: self.hosts.len(),
            })
    }

    pub fn by_alias(&self, alias: &str) -> Option<(HostIndex, &Host)> {
        self.iter().find(|(_, host)| host.alias == alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HostIndex, &Host)> {
        self.hosts
            .iter()
            .enumerate()
            .map(|(i, host)| (HostIndex::new(i), host))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(alias: &str, address: &str) -> Host {
        Host::new(alias, HostAddress::new(address).unwrap(), 22, "ubuntu")
    }

    #[test]
    fn test_resolve_in_range() {
        let registry = HostRegistry::new(vec![host("a", "10.0.0.1"), host("b", "10.0.0.2")]).unwrap();
        assert_eq!(registry.resolve(HostIndex::new(1)).unwrap().alias, "b");
    }

    #[test]
    fn test_resolve_out_of_range() {
        let registry = HostRegistry::new(vec![host("a", "10.0.0.1"), host("b", "10.0.0.2")]).unwrap();
        assert_eq!(
            registry.resolve(HostIndex::new(2)),
            Err(ConfigurationError::HostIndexOutOfRange {
                index: HostIndex::new(2),
                len: 2
            })
        );
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let result = HostRegistry::new(vec![host("a", "10.0.0.1"), host("a", "10.0.0.2")]);
        assert_eq!(result, Err(ConfigurationError::DuplicateAlias("a".to_string())));
    }

    #[test]
    fn test_credentials_prefer_host_identity() {
        let credentials = CredentialSet::new(vec!["/keys/a.pem".into(), "/keys/b.pem".into()]);
        let mut h = host("a", "10.0.0.1");
        h.identity = Some("/keys/b.pem".into());
        assert_eq!(
            credentials.for_host(&h),
            vec![PathBuf::from("/keys/b.pem"), PathBuf::from("/keys/a.pem")]
        );
    }

    #[test]
    fn test_destination() {
        assert_eq!(host("a", "10.0.0.1").destination(), "ubuntu@10.0.0.1");
    }
}
