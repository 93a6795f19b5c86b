// Copyright (c) 2025 - Cowboy AI, Inc.
//! Operating modes selectable from the command line

use std::fmt;
use std::str::FromStr;

use crate::command::RoleCommand;
use crate::errors::FleetError;

/// What a single invocation does to the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Restart every node
    Server,
    /// Sync repositories and build on every host in use
    Sync,
    /// Restart every node and send its configured client requests
    Up,
    /// Send one kind of client request to the nodes configured for it
    Role(RoleCommand),
}

impl Mode {
    /// Canonical names, in help order
    pub const NAMES: [&'static str; 6] = [
        "server",
        "sync",
        "up",
        "addpeer",
        "subshard",
        "broadcastcollation",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Server => "server",
            Mode::Sync => "sync",
            Mode::Up => "up",
            Mode::Role(RoleCommand::AddPeer) => "addpeer",
            Mode::Role(RoleCommand::Subscribe) => "subshard",
            Mode::Role(RoleCommand::Broadcast) => "broadcastcollation",
        }
    }
}

impl FromStr for Mode {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" | "server-start" => Ok(Mode::Server),
            "sync" | "fleet-sync-and-build" => Ok(Mode::Sync),
            "up" => Ok(Mode::Up),
            "addpeer" | "add-peer" => Ok(Mode::Role(RoleCommand::AddPeer)),
            "subshard" | "set-subscriptions" => Ok(Mode::Role(RoleCommand::Subscribe)),
            "broadcastcollation" | "broadcast-collation" => Ok(Mode::Role(RoleCommand::Broadcast)),
            _ => Err(FleetError::Usage {
                mode: s.to_string(),
                expected: Mode::NAMES.join(", "),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
