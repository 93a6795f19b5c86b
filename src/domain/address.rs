// Copyright (c) 2025 - Cowboy AI, Inc.
//! Host Address Value Object with DNS/IP Validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::errors::ConfigurationError;

/// Network address of a fleet host
///
/// Either an IP literal (v4 or v6) or a hostname following RFC 1123:
/// - Total length ≤ 253 characters
/// - Each label 1..=63 characters of ASCII alphanumerics and hyphens
/// - Labels cannot start or end with a hyphen
///
/// # Examples
///
/// ```rust
/// use cim_fleet::domain::HostAddress;
///
/// assert!(HostAddress::new("10.0.0.1").is_ok());
/// assert!(HostAddress::new("nsl-node1.d2").is_ok());
/// assert!(HostAddress::new("-bad").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostAddress(String);

impl HostAddress {
    /// Maximum total length for a hostname (RFC 1123)
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length for a single label (RFC 1123)
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Create a new address with validation
    pub fn new(address: impl Into<String>) -> Result<Self, ConfigurationError> {
        let address = address.into();
        let invalid = |reason: String| ConfigurationError::InvalidAddress {
            address: address.clone(),
            reason,
        };

        if address.is_empty() {
            return Err(invalid("address is empty".to_string()));
        }

        if address.parse::<IpAddr>().is_ok() {
            return Ok(Self(address));
        }

        if address.len() > Self::MAX_LENGTH {
            return Err(invalid(format!(
                "exceeds {} characters",
                Self::MAX_LENGTH
            )));
        }

        for label in address.split('.') {
            Self::validate_label(label).map_err(invalid)?;
        }

        Ok(Self(address))
    }

    fn validate_label(label: &str) -> Result<(), String> {
        if label.is_empty() {
            return Err("empty label".to_string());
        }
        if label.len() > Self::MAX_LABEL_LENGTH {
            return Err(format!("label {label:?} exceeds 63 characters"));
        }
        if let Some(ch) = label.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(format!("invalid character {ch:?}"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label {label:?} starts or ends with a hyphen"));
        }
        Ok(())
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is an IP literal rather than a hostname
    pub fn is_ip(&self) -> bool {
        self.0.parse::<IpAddr>().is_ok()
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for HostAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HostAddress {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for HostAddress {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HostAddress> for String {
    fn from(value: HostAddress) -> Self {
        value.0
    }
}
