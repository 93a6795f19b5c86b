// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Command Rendering
//!
//! Whatever the builder renders must read back as the same tree, and every
//! client invocation it embeds must carry the configured role data.

use cim_fleet::command::{ClientCall, ClientInvocation, CommandSpec};
use cim_fleet::domain::{BroadcastSchedule, HostAddress, NodeId, ShardId};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn shards() -> impl Strategy<Value = Vec<ShardId>> {
    prop::collection::vec(0u64..1_000, 1..8)
}

fn schedule() -> impl Strategy<Value = BroadcastSchedule> {
    (0u64..100, 0u64..1_000, 0u64..10_000_000, 0u64..60).prop_map(|(shard_id, count, size, period)| {
        BroadcastSchedule {
            shard_id,
            count,
            size,
            period,
        }
    })
}

fn address() -> impl Strategy<Value = HostAddress> {
    prop_oneof![
        (1u8..=254, 0u8..=255, 0u8..=255, 1u8..=254)
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}")),
        "[a-z][a-z0-9]{0,10}(\\.[a-z][a-z0-9]{0,10}){0,2}",
    ]
    .prop_map(|s| HostAddress::new(s).expect("strategy yields valid addresses"))
}

fn call() -> impl Strategy<Value = ClientCall> {
    prop_oneof![
        (address(), 0usize..64).prop_map(|(address, peer)| ClientCall::AddPeer {
            address,
            peer: NodeId::new(peer),
        }),
        shards().prop_map(|shards| ClientCall::Subscribe { shards }),
        schedule().prop_map(ClientCall::Broadcast),
    ]
}

/// Fragments without operators, quotes, parentheses or braces
fn fragment() -> impl Strategy<Value = CommandSpec> {
    "[a-z][a-z0-9_=/.-]{0,12}( [a-z0-9_=/.-]{1,8}){0,3}".prop_map(CommandSpec::fragment)
}

fn tree() -> impl Strategy<Value = CommandSpec> {
    fragment().prop_recursive(3, 24, 4, |inner| {
        (0usize..3, prop::collection::vec(inner, 2..4)).prop_map(|(join, parts)| match join {
            0 => CommandSpec::and(parts),
            1 => CommandSpec::or(parts),
            _ => CommandSpec::batch(parts),
        })
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_subscriptions_survive_render(shards in shards(), node in 0usize..64) {
        let invocation = ClientInvocation {
            executable: "sharding-p2p-poc".to_string(),
            node: NodeId::new(node),
            call: ClientCall::Subscribe { shards: shards.clone() },
        };
        let parsed: ClientInvocation = invocation.render().parse().unwrap();
        prop_assert_eq!(parsed.call, ClientCall::Subscribe { shards });
        prop_assert_eq!(parsed.node, NodeId::new(node));
    }

    #[test]
    fn prop_invocation_found_inside_command(call in call(), node in 0usize..64) {
        let invocation = ClientInvocation {
            executable: "sharding-p2p-poc".to_string(),
            node: NodeId::new(node),
            call,
        };
        let command = CommandSpec::and([
            CommandSpec::fragment("cd $HOME/go/src/github.com/mhchia/sharding-p2p-poc"),
            CommandSpec::fragment(invocation.render()),
        ]);
        prop_assert_eq!(ClientInvocation::find_in(&command.render()), Some(invocation));
    }

    #[test]
    fn prop_rendered_tree_parses_back(spec in tree()) {
        let rendered = spec.render();
        prop_assert_eq!(CommandSpec::parse(&rendered).unwrap(), spec);
    }

    #[test]
    fn prop_and_chain_stops_at_first_failure(
        parts in prop::collection::vec(fragment(), 2..8),
        failing in 0usize..8,
    ) {
        let spec = CommandSpec::and(parts);
        let fragments: Vec<String> = spec.fragments().iter().map(|f| f.to_string()).collect();
        let target = fragments[failing % fragments.len()].clone();
        let stop = fragments.iter().position(|f| *f == target).unwrap();

        let mut executed = Vec::new();
        let ok = spec.evaluate(&mut |f: &str| {
            executed.push(f.to_string());
            f != target
        });

        prop_assert!(!ok);
        prop_assert_eq!(executed, fragments[..=stop].to_vec());
    }
}
