//! Runner (spec §4.6, component C6).
//!
//! Executes an emitted [`crate::actions::Op`] list against one Docker
//! client. Consults a name/image cache before each op to avoid redundant
//! inspects, performs the call, records a result entry, and on failure
//! wraps the original error with the client name, the failed op, and the
//! partial-results list accumulated so far (spec §7 `ActionRunnerError`).

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::actions::{Op, PlannedOp};
use crate::docker::backend::{DockerBackend, ExecRequest};
use crate::docker::types::ContainerId;
use crate::error::{LandscapeError, LandscapeResult};

/// A single `(client, action, node, outcome)` entry (spec §7).
#[derive(Debug, Clone)]
pub struct OpOutcome {
    pub client: String,
    pub node: String,
    pub action: String,
    pub succeeded: bool,
}

/// Per-client name -> id caches (spec §4.6 "Caches"): containers,
/// volumes, networks, and an image-tag -> id map. Flushed on explicit
/// [`Runner::refresh_names`] and invalidated locally on every
/// create/remove.
#[derive(Debug, Default)]
struct NameCache {
    containers: HashMap<String, ContainerId>,
    image_ids: HashMap<String, String>,
}

/// Executes op lists against a single named Docker client.
///
/// A planning cycle is single-threaded cooperative with respect to one
/// map and client (spec §5): the Runner processes one `Vec<PlannedOp>`
/// strictly in emitted order and does not reorder or parallelize within
/// a client. Fanning the *same* op list out across multiple clients
/// concurrently is the caller's responsibility (spawn one `Runner::run`
/// per client); this type owns no cross-client state.
pub struct Runner<'a> {
    client_name: String,
    backend: &'a dyn DockerBackend,
    cache: NameCache,
}

impl<'a> Runner<'a> {
    pub fn new(client_name: impl Into<String>, backend: &'a dyn DockerBackend) -> Self {
        Self {
            client_name: client_name.into(),
            backend,
            cache: NameCache::default(),
        }
    }

    /// Drop every cached name/id (spec §4.6: flushed on explicit
    /// `refresh_names` or a new policy being set).
    pub fn refresh_names(&mut self) {
        self.cache = NameCache::default();
    }

    /// Execute every op in order. On the first failure, returns
    /// `ActionRunnerError` carrying every outcome recorded before the
    /// failing op (spec §7 propagation policy: "execution errors
    /// immediately terminate the traversal").
    pub async fn run(&mut self, ops: Vec<PlannedOp>) -> LandscapeResult<Vec<OpOutcome>> {
        let mut results = Vec::with_capacity(ops.len());
        for planned in ops {
            let description = describe(&planned.op);
            let node_name = planned.node.display_name();
            match self.execute(planned.op).await {
                Ok(()) => {
                    debug!(client = %self.client_name, node = %node_name, op = %description, "op succeeded");
                    results.push(OpOutcome {
                        client: self.client_name.clone(),
                        node: node_name,
                        action: description,
                        succeeded: true,
                    });
                }
                Err(source) => {
                    warn!(client = %self.client_name, node = %node_name, op = %description, error = %source, "op failed");
                    return Err(LandscapeError::action_runner(
                        self.client_name.clone(),
                        format!("{description} on {node_name}"),
                        source,
                        results,
                    ));
                }
            }
        }
        Ok(results)
    }

    async fn execute(&mut self, op: Op) -> LandscapeResult<()> {
        match op {
            Op::PullImage { image } => {
                self.backend.pull_image(&image, false).await?;
                self.cache.image_ids.remove(&image);
            }
            Op::CreateVolume { name, driver } => {
                self.backend.create_volume(&name, &driver).await?;
            }
            Op::CreateNetwork { name, driver, internal } => {
                self.backend.create_network(&name, &driver, internal).await?;
            }
            Op::CreateContainer { spec } => {
                let name = spec.name.clone();
                let id = self.backend.create_container(spec).await?;
                self.cache.containers.insert(name, id);
            }
            Op::PreparePermissions {
                container_name,
                user,
                permissions,
                path,
            } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend
                    .exec(
                        &id,
                        ExecRequest {
                            command: vec!["chown".to_string(), chown_spec(&user), path.clone()],
                            user: None,
                        },
                    )
                    .await?;
                self.backend
                    .exec(
                        &id,
                        ExecRequest {
                            command: vec!["chmod".to_string(), permissions, path],
                            user: None,
                        },
                    )
                    .await?;
            }
            Op::StartContainer { container_name } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.start_container(&id).await?;
            }
            Op::ConnectNetwork {
                container_name,
                network,
                aliases,
            } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.connect_network(&id, &network, &aliases).await?;
            }
            Op::DisconnectNetwork {
                container_name,
                network,
            } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.disconnect_network(&id, &network).await?;
            }
            Op::Exec {
                container_name,
                command,
                user,
            } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.exec(&id, ExecRequest { command, user }).await?;
            }
            Op::StopContainer {
                container_name,
                signal,
                timeout,
            } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.stop_container(&id, &signal, timeout).await?;
            }
            Op::RemoveContainer { container_name, force } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.remove_container(&id, force).await?;
                self.cache.containers.remove(&container_name);
            }
            Op::RemoveVolume { name } => {
                self.backend.remove_volume(&name).await?;
            }
            Op::RemoveNetwork { name } => {
                self.backend.remove_network(&name).await?;
            }
            Op::UpdateHostConfig { container_name, limits } => {
                let id = self.resolve_container(&container_name).await?;
                self.backend.update_host_config(&id, &limits).await?;
            }
        }
        Ok(())
    }

    async fn resolve_container(&mut self, name: &str) -> LandscapeResult<ContainerId> {
        if let Some(id) = self.cache.containers.get(name) {
            return Ok(id.clone());
        }
        let inspect = self
            .backend
            .inspect_container(name)
            .await?
            .ok_or_else(|| LandscapeError::map_integrity("runtime", format!("container '{name}' does not exist")))?;
        self.cache.containers.insert(name.to_string(), inspect.id.clone());
        Ok(inspect.id)
    }
}

/// `chown` takes `user[:group]`; a bare user with no group defaults the
/// group to the same value (spec S2: `user=2000` -> `chown 2000:2000`).
fn chown_spec(user: &str) -> String {
    if user.contains(':') {
        user.to_string()
    } else {
        format!("{user}:{user}")
    }
}

fn describe(op: &Op) -> String {
    match op {
        Op::PullImage { image } => format!("pull({image})"),
        Op::CreateVolume { name, .. } => format!("create-volume({name})"),
        Op::CreateNetwork { name, .. } => format!("create-network({name})"),
        Op::CreateContainer { spec } => format!("create-container({})", spec.name),
        Op::PreparePermissions { container_name, .. } => format!("prepare-permissions({container_name})"),
        Op::StartContainer { container_name } => format!("start-container({container_name})"),
        Op::ConnectNetwork { container_name, network, .. } => format!("connect-network({container_name}, {network})"),
        Op::DisconnectNetwork { container_name, network } => format!("disconnect-network({container_name}, {network})"),
        Op::Exec { container_name, .. } => format!("exec({container_name})"),
        Op::StopContainer { container_name, .. } => format!("stop-container({container_name})"),
        Op::RemoveContainer { container_name, .. } => format!("remove-container({container_name})"),
        Op::RemoveVolume { name } => format!("remove-volume({name})"),
        Op::RemoveNetwork { name } => format!("remove-network({name})"),
        Op::UpdateHostConfig { container_name, .. } => format!("update-host-config({container_name})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::backend::CreateContainerSpec;
    use crate::docker::fake::FakeDockerBackend;
    use crate::graph::NodeId;

    fn node(config: &str) -> NodeId {
        NodeId::Container {
            config: config.to_string(),
            instance: None,
        }
    }

    #[tokio::test]
    async fn successful_ops_accumulate_results_in_order() {
        let backend = FakeDockerBackend::new();
        let mut runner = Runner::new("default", &backend);
        let ops = vec![
            PlannedOp {
                node: node("a"),
                op: Op::CreateContainer {
                    spec: CreateContainerSpec {
                        name: "m.a".to_string(),
                        image: "ubuntu:latest".to_string(),
                        ..Default::default()
                    },
                },
            },
            PlannedOp {
                node: node("a"),
                op: Op::StartContainer {
                    container_name: "m.a".to_string(),
                },
            },
        ];
        let results = runner.run(ops).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.succeeded));
    }

    #[tokio::test]
    async fn prepare_permissions_chowns_and_chmods_the_resolved_path() {
        let backend = FakeDockerBackend::new();
        let mut runner = Runner::new("default", &backend);
        let ops = vec![
            PlannedOp {
                node: node("app"),
                op: Op::CreateContainer {
                    spec: CreateContainerSpec {
                        name: "m.app".to_string(),
                        image: "app:latest".to_string(),
                        ..Default::default()
                    },
                },
            },
            PlannedOp {
                node: node("app"),
                op: Op::PreparePermissions {
                    container_name: "m.app".to_string(),
                    user: "2000".to_string(),
                    permissions: "u=rwX,g=rX,o=".to_string(),
                    path: "/var/run/app".to_string(),
                },
            },
        ];
        runner.run(ops).await.unwrap();

        let calls = backend.calls.lock().unwrap();
        let exec_commands: Vec<&Vec<String>> = calls
            .iter()
            .filter_map(|c| match c {
                crate::docker::fake::RecordedCall::Exec(_, command) => Some(command),
                _ => None,
            })
            .collect();
        assert_eq!(
            exec_commands,
            vec![
                &vec!["chown".to_string(), "2000:2000".to_string(), "/var/run/app".to_string()],
                &vec!["chmod".to_string(), "u=rwX,g=rX,o=".to_string(), "/var/run/app".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn failure_midway_carries_partial_results_and_reraises() {
        let backend = FakeDockerBackend::new();
        let mut runner = Runner::new("default", &backend);
        let ops = vec![
            PlannedOp {
                node: node("a"),
                op: Op::CreateContainer {
                    spec: CreateContainerSpec {
                        name: "m.a".to_string(),
                        image: "ubuntu:latest".to_string(),
                        ..Default::default()
                    },
                },
            },
            PlannedOp {
                node: node("b"),
                op: Op::StartContainer {
                    container_name: "m.does-not-exist".to_string(),
                },
            },
        ];
        let err = runner.run(ops).await.unwrap_err();
        let LandscapeError::ActionRunner { partial_results, source, .. } = &err else {
            panic!("expected ActionRunner error");
        };
        assert_eq!(partial_results.len(), 1);
        assert!(matches!(**source, LandscapeError::MapIntegrity { .. }));
        assert!(matches!(err.reraise(), LandscapeError::MapIntegrity { .. }));
    }
}
