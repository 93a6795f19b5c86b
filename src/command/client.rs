// Copyright (c) 2025 - Cowboy AI, Inc.
//! Client-mode invocations of the node binary
//!
//! A running node is driven through its own binary in client mode:
//!
//! ```text
//! ./sharding-p2p-poc -seed=1 -client addpeer 10.0.0.1 0
//! ./sharding-p2p-poc -seed=1 -client subshard 1 2
//! ./sharding-p2p-poc -seed=1 -client broadcastcollation 1 10 1000000 0
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{BroadcastSchedule, HostAddress, NodeId, ShardId};

/// Role-specific request sent to a running node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    AddPeer { address: HostAddress, peer: NodeId },
    Subscribe { shards: Vec<ShardId> },
    Broadcast(BroadcastSchedule),
}

impl ClientCall {
    pub fn rpc_name(&self) -> &'static str {
        match self {
            ClientCall::AddPeer { .. } => "addpeer",
            ClientCall::Subscribe { .. } => "subshard",
            ClientCall::Broadcast(_) => "broadcastcollation",
        }
    }
}

/// `./<executable> -seed=<node> -client <rpc> <args…>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInvocation {
    pub executable: String,
    pub node: NodeId,
    pub call: ClientCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationParseError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("unexpected token {0:?}")]
    Unexpected(String),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("unknown rpc {0:?}")]
    UnknownRpc(String),

    #[error("invalid peer address: {0}")]
    InvalidAddress(String),
}

impl ClientInvocation {
    pub fn render(&self) -> String {
        let args = match &self.call {
            ClientCall::AddPeer { address, peer } => format!("{address} {peer}"),
            ClientCall::Subscribe { shards } => join_numbers(shards),
            ClientCall::Broadcast(s) => format!("{} {} {} {}", s.shard_id, s.count, s.size, s.period),
        };
        format!(
            "./{} -seed={} -client {} {}",
            self.executable,
            self.node,
            self.call.rpc_name(),
            args
        )
        .trim_end()
        .to_string()
    }

    /// Find and parse the invocation inside a rendered command
    ///
    /// Scans every fragment of a command tree and returns the first one that
    /// is a client invocation.
    pub fn find_in(command: &str) -> Option<Self> {
        let spec = super::CommandSpec::parse(command).ok()?;
        spec.fragments().into_iter().find_map(|f| f.parse().ok())
    }
}

impl fmt::Display for ClientInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for ClientInvocation {
    type Err = InvocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();

        let executable = tokens
            .next()
            .and_then(|t| t.strip_prefix("./"))
            .ok_or(InvocationParseError::Missing("executable"))?
            .to_string();

        let seed = tokens.next().ok_or(InvocationParseError::Missing("-seed"))?;
        let node = seed
            .strip_prefix("-seed=")
            .ok_or_else(|| InvocationParseError::Unexpected(seed.to_string()))
            .and_then(parse_number::<usize>)
            .map(NodeId::new)?;

        match tokens.next() {
            Some("-client") => {}
            Some(other) => return Err(InvocationParseError::Unexpected(other.to_string())),
            None => return Err(InvocationParseError::Missing("-client")),
        }

        let rpc = tokens.next().ok_or(InvocationParseError::Missing("rpc"))?;
        let args: Vec<&str> = tokens.collect();
        let call = match rpc {
            "addpeer" => {
                let [address, peer] = args[..] else {
                    return Err(InvocationParseError::Missing("addpeer <address> <peer>"));
                };
                ClientCall::AddPeer {
                    address: HostAddress::new(address)
                        .map_err(|e| InvocationParseError::InvalidAddress(e.to_string()))?,
                    peer: NodeId::new(parse_number(peer)?),
                }
            }
            "subshard" => ClientCall::Subscribe {
                shards: args
                    .iter()
                    .map(|a| parse_number(a))
                    .collect::<Result<_, _>>()?,
            },
            "broadcastcollation" => {
                let [shard_id, count, size, period] = args[..] else {
                    return Err(InvocationParseError::Missing(
                        "broadcastcollation <shard> <count> <size> <period>",
                    ));
                };
                ClientCall::Broadcast(BroadcastSchedule {
                    shard_id: parse_number(shard_id)?,
                    count: parse_number(count)?,
                    size: parse_number(size)?,
                    period: parse_number(period)?,
                })
            }
            other => return Err(InvocationParseError::UnknownRpc(other.to_string())),
        };

        Ok(Self {
            executable,
            node,
            call,
        })
    }
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, InvocationParseError> {
    s.parse()
        .map_err(|_| InvocationParseError::InvalidNumber(s.to_string()))
}

fn join_numbers(values: &[ShardId]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn invocation(call: ClientCall) -> ClientInvocation {
        ClientInvocation {
            executable: "sharding-p2p-poc".to_string(),
            node: NodeId::new(1),
            call,
        }
    }

    #[test]
    fn test_render_addpeer() {
        let inv = invocation(ClientCall::AddPeer {
            address: HostAddress::new("10.0.0.1").unwrap(),
            peer: NodeId::new(0),
        });
        assert_eq!(inv.render(), "./sharding-p2p-poc -seed=1 -client addpeer 10.0.0.1 0");
    }

    #[test]
    fn test_render_broadcast() {
        let inv = invocation(ClientCall::Broadcast(BroadcastSchedule {
            shard_id: 1,
            count: 10,
            size: 1_000_000,
            period: 0,
        }));
        assert_eq!(
            inv.render(),
            "./sharding-p2p-poc -seed=1 -client broadcastcollation 1 10 1000000 0"
        );
    }

    #[test]
    fn test_parse_preserves_subscription_order() {
        let inv: ClientInvocation = "./node -seed=4 -client subshard 3 1 2".parse().unwrap();
        assert_eq!(inv.node, NodeId::new(4));
        assert_eq!(inv.call, ClientCall::Subscribe { shards: vec![3, 1, 2] });
    }

    #[test_case("node -seed=1 -client subshard 1" ; "missing dot slash")]
    #[test_case("./node -seed=x -client subshard 1" ; "bad seed")]
    #[test_case("./node -seed=1 subshard 1" ; "missing client flag")]
    #[test_case("./node -seed=1 -client unsubshard 1" ; "unknown rpc")]
    #[test_case("./node -seed=1 -client addpeer 10.0.0.1" ; "addpeer arity")]
    #[test_case("./node -seed=1 -client broadcastcollation 1 2 3" ; "broadcast arity")]
    fn test_parse_rejects(input: &str) {
        assert!(input.parse::<ClientInvocation>().is_err());
    }

    #[test]
    fn test_find_in_command_tree() {
        let command = "{ export GOPATH=$HOME/go ; export PATH=$PATH:$GOPATH/bin ; } && cd /srv/poc && ./poc -seed=2 -client subshard 1 2";
        let inv = ClientInvocation::find_in(command).unwrap();
        assert_eq!(inv.executable, "poc");
        assert_eq!(inv.call, ClientCall::Subscribe { shards: vec![1, 2] });
    }
}
