// Copyright (c) 2025 - Cowboy AI, Inc.
//! Command Builder
//!
//! Pure functions from configuration + node to [`CommandSpec`]. Nothing here
//! touches the network; the output is handed to the dispatcher as-is.
//!
//! Anything that depends on the remote operating system is decided by the
//! remote shell through `uname`, never on the dispatching machine, since the
//! fleet may mix Linux and macOS hosts.

use tracing::trace;

use super::client::{ClientCall, ClientInvocation};
use super::spec::{shell_quote, CommandSpec};
use crate::config::{FleetConfig, Repository};
use crate::domain::NodeId;
use crate::errors::ConfigurationError;

/// Client requests a node can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleCommand {
    /// Dial the configured peer target
    AddPeer,
    /// Subscribe to the configured shards
    Subscribe,
    /// Broadcast collations on the configured schedule
    Broadcast,
}

impl RoleCommand {
    pub const ALL: [RoleCommand; 3] = [RoleCommand::AddPeer, RoleCommand::Subscribe, RoleCommand::Broadcast];
}

/// Builds per-node and per-host shell commands from a [`FleetConfig`]
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    config: &'a FleetConfig,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a FleetConfig) -> Self {
        Self { config }
    }

    /// Toolchain environment, identical for every node
    pub fn env_setup(&self) -> CommandSpec {
        let toolchain = &self.config.toolchain;
        CommandSpec::batch([
            CommandSpec::fragment(format!("export GOPATH={}", toolchain.gopath)),
            CommandSpec::fragment(format!(
                "export GOROOT=$(if [ \"$(uname)\" = Darwin ]; then echo {}; else echo {}; fi)",
                toolchain.goroot_darwin, toolchain.goroot_linux
            )),
            CommandSpec::fragment("export PATH=$PATH:$GOPATH/bin"),
            CommandSpec::fragment("export PATH=$PATH:$GOROOT/bin"),
        ])
    }

    fn enter(&self, repo: &Repository) -> CommandSpec {
        CommandSpec::fragment(format!("cd {}", repo.src_path(&self.config.toolchain)))
    }

    /// Fetch the repository and register the fork remote
    pub fn repository_setup(&self, repo: &Repository) -> CommandSpec {
        let mut parts = vec![
            self.env_setup(),
            CommandSpec::fragment(format!("go get -u {}", repo.import_path())),
            self.enter(repo),
        ];
        if repo.fork.is_some() {
            let (remote, _) = repo.tracking();
            parts.push(CommandSpec::fragment(format!(
                "git remote add {} {}",
                remote,
                repo.tracking_url()
            )));
        }
        CommandSpec::batch(parts)
    }

    /// Reset the tracked branch to the remote head
    pub fn repository_pull(&self, repo: &Repository) -> CommandSpec {
        let (remote, branch) = repo.tracking();
        CommandSpec::batch([
            self.env_setup(),
            self.enter(repo),
            CommandSpec::fragment(format!("git fetch {remote}")),
            CommandSpec::fragment("git checkout master"),
            CommandSpec::fragment(format!("git branch -D {branch}")),
            CommandSpec::fragment(format!("git checkout {branch}")),
            CommandSpec::fragment(format!("git pull {remote} {branch}")),
        ])
    }

    pub fn repository_build(&self, repo: &Repository) -> CommandSpec {
        CommandSpec::batch([
            self.env_setup(),
            CommandSpec::and([self.enter(repo), CommandSpec::fragment("go build")]),
        ])
    }

    /// Sync every repository and build the launch repository (one per host)
    pub fn sync_and_build(&self) -> Result<CommandSpec, ConfigurationError> {
        let launch = self.config.launch_repository()?;
        let mut parts = Vec::with_capacity(self.config.repositories.len() * 2 + 1);
        for repo in &self.config.repositories {
            parts.push(self.repository_setup(repo));
            parts.push(self.repository_pull(repo));
        }
        parts.push(self.repository_build(launch));
        Ok(CommandSpec::batch(parts))
    }

    /// Detached launch wrapper; picks the `script` idiom on the remote host
    fn detached_launch(&self, node: NodeId) -> CommandSpec {
        let launch = &self.config.launch;
        let program = format!("./{} -seed={}", launch.executable, node);
        let log = format!("{}_{}.out", launch.log_prefix, node);
        let script = format!(
            "if [ \"$(uname)\" = Darwin ]; then script -q /dev/null {program} > {log} 2>&1; \
             else script -f -c \"{program}\" {log}; fi"
        );
        CommandSpec::fragment(format!("screen -d -m bash -c {}", shell_quote(&script)))
    }

    /// Extended regex matching exactly the command line of `node`'s process
    ///
    /// Anchored on both ends so it neither matches a sibling node sharing the
    /// host (`-seed=1` vs `-seed=10`) nor the session shell whose command
    /// line embeds the launch text.
    fn instance_pattern(&self, node: NodeId) -> String {
        format!(
            "^\\./{} -seed={}$",
            regex_escape(&self.config.launch.executable),
            node
        )
    }

    /// Stop the running instance of one node, leaving its siblings alone
    fn stop(&self, node: NodeId) -> CommandSpec {
        CommandSpec::fragment(format!(
            "pkill -9 -f {}",
            shell_quote(&self.instance_pattern(node))
        ))
    }

    fn restart(&self, node: NodeId) -> CommandSpec {
        let launch = &self.config.launch;
        CommandSpec::batch([
            self.stop(node),
            CommandSpec::fragment(format!("sleep {}", launch.restart_delay_secs)),
            self.detached_launch(node),
        ])
    }

    /// Kill the node's running instance and start it again detached
    pub fn server_start(&self, node: NodeId) -> Result<CommandSpec, ConfigurationError> {
        let repo = self.config.launch_repository()?;
        Ok(CommandSpec::and([
            self.env_setup(),
            self.enter(repo),
            self.restart(node),
        ]))
    }

    /// Client invocation for `role`, or `None` when the node has no such role
    pub fn client_invocation(
        &self,
        node: NodeId,
        role: RoleCommand,
    ) -> Result<Option<ClientInvocation>, ConfigurationError> {
        let topology = &self.config.topology;
        if !topology.contains(node) {
            return Err(ConfigurationError::UnknownNode(node));
        }
        let role_data = topology.role_data_for(node);
        let call = match role {
            RoleCommand::AddPeer => match topology.peer_target_for(node) {
                Some(peer) => Some(ClientCall::AddPeer {
                    address: topology.host_for(&self.config.registry, peer)?.address.clone(),
                    peer,
                }),
                None => None,
            },
            RoleCommand::Subscribe => (!role_data.subscriptions.is_empty()).then(|| ClientCall::Subscribe {
                shards: role_data.subscriptions.clone(),
            }),
            RoleCommand::Broadcast => role_data.broadcast.map(ClientCall::Broadcast),
        };
        Ok(call.map(|call| ClientInvocation {
            executable: self.config.launch.executable.clone(),
            node,
            call,
        }))
    }

    /// Command sending one client request to a running node
    pub fn role_command(
        &self,
        node: NodeId,
        role: RoleCommand,
    ) -> Result<Option<CommandSpec>, ConfigurationError> {
        let Some(invocation) = self.client_invocation(node, role)? else {
            return Ok(None);
        };
        let repo = self.config.launch_repository()?;
        Ok(Some(CommandSpec::and([
            self.env_setup(),
            self.enter(repo),
            CommandSpec::fragment(invocation.render()),
        ])))
    }

    /// Full bring-up of a node: restart, then every configured client request
    ///
    /// A node without peer or role data gets the restart alone. Dialing a
    /// peer assumes the peer is already listening; bring-up of the target
    /// must have happened first.
    pub fn node_command(&self, node: NodeId) -> Result<CommandSpec, ConfigurationError> {
        let repo = self.config.launch_repository()?;
        let mut parts = vec![self.env_setup(), self.enter(repo), self.restart(node)];

        let mut invocations = Vec::new();
        for role in RoleCommand::ALL {
            if let Some(invocation) = self.client_invocation(node, role)? {
                invocations.push(CommandSpec::fragment(invocation.render()));
            }
        }
        if !invocations.is_empty() {
            parts.push(CommandSpec::fragment(format!(
                "sleep {}",
                self.config.launch.restart_delay_secs
            )));
            parts.extend(invocations);
        }

        let spec = CommandSpec::and(parts);
        trace!(node = %node, command = %spec, "built node command");
        Ok(spec)
    }
}

fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LaunchSettings, SshSettings, Toolchain};
    use crate::domain::{BroadcastSchedule, CredentialSet, Host, HostAddress, HostIndex, HostRegistry, Topology};
    use pretty_assertions::assert_eq;

    fn config(topology: Topology) -> FleetConfig {
        let registry = HostRegistry::new(vec![
            Host::new("a", HostAddress::new("10.0.0.1").unwrap(), 22, "ubuntu"),
            Host::new("b", HostAddress::new("10.0.0.2").unwrap(), 22, "ubuntu"),
        ])
        .unwrap();
        FleetConfig::new(
            Toolchain::default(),
            LaunchSettings::default(),
            SshSettings {
                identities: CredentialSet::new(vec!["/keys/id.pem".into()]),
                ..SshSettings::default()
            },
            registry,
            vec![Repository::new("sharding-p2p-poc", "mhchia")],
            topology,
        )
        .unwrap()
    }

    fn two_nodes() -> Topology {
        Topology::new(vec![HostIndex::new(0), HostIndex::new(1)])
    }

    fn cd_count(spec: &CommandSpec) -> usize {
        spec.fragments().iter().filter(|f| f.starts_with("cd ")).count()
    }

    #[test]
    fn test_minimal_node_command() {
        let config = config(two_nodes());
        let spec = CommandBuilder::new(&config).node_command(NodeId::new(0)).unwrap();
        let fragments = spec.fragments();
        assert_eq!(cd_count(&spec), 1);
        assert!(fragments.last().unwrap().starts_with("screen -d -m bash -c"));
        assert!(!spec.render().contains("-client"));
    }

    #[test]
    fn test_node_command_with_roles() {
        let topology = two_nodes()
            .with_peer(NodeId::new(1), NodeId::new(0))
            .with_subscriptions(NodeId::new(1), vec![1, 2])
            .with_broadcast(
                NodeId::new(1),
                BroadcastSchedule {
                    shard_id: 1,
                    count: 10,
                    size: 100,
                    period: 0,
                },
            );
        let config = config(topology);
        let spec = CommandBuilder::new(&config).node_command(NodeId::new(1)).unwrap();
        let fragments = spec.fragments();
        let n = fragments.len();
        assert_eq!(cd_count(&spec), 1);
        assert_eq!(
            &fragments[n - 3..],
            &[
                "./sharding-p2p-poc -seed=1 -client addpeer 10.0.0.1 0",
                "./sharding-p2p-poc -seed=1 -client subshard 1 2",
                "./sharding-p2p-poc -seed=1 -client broadcastcollation 1 10 100 0",
            ]
        );
    }

    #[test]
    fn test_server_start_branches_on_remote_uname() {
        let config = config(two_nodes());
        let spec = CommandBuilder::new(&config).server_start(NodeId::new(1)).unwrap();
        let launch = spec.fragments().into_iter().last().unwrap().to_string();
        assert!(launch.contains("$(uname)"));
        assert!(launch.contains("script -q /dev/null ./sharding-p2p-poc -seed=1 > poc_1.out 2>&1"));
        assert!(launch.contains("script -f -c \"./sharding-p2p-poc -seed=1\" poc_1.out"));
        assert!(spec
            .render()
            .contains("pkill -9 -f '^\\./sharding-p2p-poc -seed=1$' ; sleep 1 ; screen"));
    }

    #[test]
    fn test_rendered_node_command_parses_back() {
        let config = config(two_nodes().with_peer(NodeId::new(1), NodeId::new(0)));
        let spec = CommandBuilder::new(&config).node_command(NodeId::new(1)).unwrap();
        assert_eq!(CommandSpec::parse(&spec.render()).unwrap(), spec);
    }

    #[test]
    fn test_role_command_absent_without_role() {
        let config = config(two_nodes());
        let builder = CommandBuilder::new(&config);
        for role in RoleCommand::ALL {
            assert_eq!(builder.role_command(NodeId::new(0), role).unwrap(), None);
        }
    }

    #[test]
    fn test_role_command_unknown_node() {
        let config = config(two_nodes());
        assert_eq!(
            CommandBuilder::new(&config).role_command(NodeId::new(9), RoleCommand::AddPeer),
            Err(ConfigurationError::UnknownNode(NodeId::new(9)))
        );
    }

    #[test]
    fn test_sync_and_build_ends_with_build() {
        let config = config(two_nodes());
        let spec = CommandBuilder::new(&config).sync_and_build().unwrap();
        let fragments = spec.fragments();
        assert_eq!(fragments.last(), Some(&"go build"));
        assert!(fragments.contains(&"go get -u github.com/mhchia/sharding-p2p-poc"));
        assert!(fragments.contains(&"git pull origin master"));
        assert!(!fragments.iter().any(|f| f.starts_with("git remote add")));
    }

    /// Whether `pattern` matches `line` under `grep -E`, as `pkill -f` would
    fn shell_matches(pattern: &str, line: &str) -> bool {
        std::process::Command::new("sh")
            .arg("-c")
            .arg("printf '%s\\n' \"$LINE\" | grep -Eq -- \"$PATTERN\"")
            .env("LINE", line)
            .env("PATTERN", pattern)
            .status()
            .unwrap()
            .success()
    }

    #[test]
    fn test_restart_only_stops_own_node() {
        let config = config(Topology::new(vec![HostIndex::new(0), HostIndex::new(0)]));
        let builder = CommandBuilder::new(&config);
        let own = builder.instance_pattern(NodeId::new(0));
        let sibling = builder.instance_pattern(NodeId::new(1));

        assert!(shell_matches(&own, "./sharding-p2p-poc -seed=0"));
        assert!(!shell_matches(&own, "./sharding-p2p-poc -seed=1"));
        assert!(!shell_matches(&sibling, "./sharding-p2p-poc -seed=0"));
        assert!(!shell_matches(&sibling, "./sharding-p2p-poc -seed=10"));

        for node in [NodeId::new(0), NodeId::new(1)] {
            let command = builder.server_start(node).unwrap().render();
            assert!(!command.contains("killall"));
            assert!(!shell_matches(&own, &format!("bash -c {command}")));
            assert!(!shell_matches(&sibling, &format!("bash -c {command}")));
        }
    }

    #[test]
    fn test_instance_pattern_escapes_executable() {
        assert_eq!(regex_escape("poc.v2+"), "poc\\.v2\\+");
    }

    #[test]
    fn test_env_setup_visible_to_later_fragments() {
        let config = config(two_nodes());
        let spec = CommandSpec::and([
            CommandBuilder::new(&config).env_setup(),
            CommandSpec::fragment("printf '%s|%s' \"$GOPATH\" \"$PATH\""),
        ]);
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(spec.render())
            .env("HOME", "/tmp/fleet-home")
            .output()
            .unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success());
        assert!(stdout.starts_with("/tmp/fleet-home/go|"), "{stdout}");
        assert!(stdout.contains(":/tmp/fleet-home/go/bin"), "{stdout}");
    }

    #[test]
    fn test_env_setup_defers_goroot_to_remote() {
        let config = config(two_nodes());
        let env = CommandBuilder::new(&config).env_setup().render();
        assert!(env.starts_with("export GOPATH=$HOME/go ; export GOROOT=$(if [ \"$(uname)\" = Darwin ]"));
        assert!(env.contains("/usr/local/go"));
        assert!(env.contains("/usr/local/Cellar/go/1.10.2/libexec"));
    }
}
