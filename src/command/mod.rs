// Copyright (c) 2025 - Cowboy AI, Inc.
//! Shell command construction
//!
//! - [`CommandSpec`] - tree of fragments joined with `&&`, `||` or `;`
//! - [`CommandBuilder`] - per-node and per-host commands from the fleet config
//! - [`ClientInvocation`] - client-mode calls into a running node

pub mod builder;
pub mod client;
pub mod spec;

pub use builder::{CommandBuilder, RoleCommand};
pub use client::{ClientCall, ClientInvocation, InvocationParseError};
pub use spec::{shell_quote, CommandSpec, Join, ParseError};
