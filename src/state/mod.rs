//! State generator family (spec §4.4, component C4).
//!
//! Four generators share one job — turn a traversal plus a live Docker
//! snapshot into a `NodeState` per node — and differ only in which
//! traversal they walk and which `NodeState` fields they bother
//! populating. `Single`/`ForwardDependency`/`ReverseDependency` are cheap:
//! presence/running/exit only. `Update` is the expensive path: it also
//! pulls the live container's image/links/volumes/env/cmd/entrypoint/
//! exposes/networks/limits/exec state and compares it field-by-field
//! against the expected effective configuration.

pub mod node;

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::docker::backend::DockerBackend;
use crate::error::LandscapeResult;
use crate::graph::{DependencyGraph, NodeId};
use crate::model::container::ContainerConfig;
use crate::model::map::ContainerMap;
use crate::model::merge::expand;
use crate::names;
pub use node::{default_nonrecoverable_exit_codes, is_nonrecoverable, NodeKind, NodeState};

/// Options that shape the `Update` generator's comparisons (spec §6
/// "Action option catalogue").
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub nonrecoverable_exit_codes: HashSet<i64>,
    pub force_update: HashSet<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            nonrecoverable_exit_codes: default_nonrecoverable_exit_codes(),
            force_update: HashSet::new(),
        }
    }
}

/// Everything a generator needs to resolve a node's expected identity.
pub struct PlanContext<'a> {
    pub map: &'a ContainerMap,
    pub graph: &'a DependencyGraph,
    pub backend: &'a dyn DockerBackend,
}

/// **Single** — basic presence/running/exit for one node, no dependency
/// walk.
pub async fn single(ctx: &PlanContext<'_>, node: &NodeId) -> LandscapeResult<NodeState> {
    classify_basic(ctx, node).await
}

/// **Forward-dependency** — forward traversal over the closure of
/// `roots`; presence/running/exit for each node visited.
pub async fn forward_dependency(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
) -> LandscapeResult<IndexMap<NodeId, NodeState>> {
    let order = ctx.graph.forward_order_for(roots)?;
    let mut states = IndexMap::new();
    for node in order {
        let state = classify_basic(ctx, &node).await?;
        states.insert(node, state);
    }
    Ok(states)
}

/// **Reverse-dependency** — reverse traversal (dependents before
/// dependencies), used by stop/remove so a node's dependents are always
/// processed first.
pub async fn reverse_dependency(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
) -> LandscapeResult<IndexMap<NodeId, NodeState>> {
    let order = ctx.graph.reverse_order_for(roots)?;
    let mut states = IndexMap::new();
    for node in order {
        let state = classify_basic(ctx, &node).await?;
        states.insert(node, state);
    }
    Ok(states)
}

/// **Update** — forward traversal, with the full field-by-field live
/// comparison (spec §4.4 "Update-match rules").
pub async fn update(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
    options: &UpdateOptions,
) -> LandscapeResult<IndexMap<NodeId, NodeState>> {
    let order = ctx.graph.forward_order_for(roots)?;
    let mut states = IndexMap::new();
    for node in order {
        let state = match &node {
            NodeId::Container { config, instance } => {
                classify_update(ctx, config, instance.as_deref(), options).await?
            }
            _ => classify_basic(ctx, &node).await?,
        };
        states.insert(node, state);
    }
    Ok(states)
}

async fn classify_basic(ctx: &PlanContext<'_>, node: &NodeId) -> LandscapeResult<NodeState> {
    match node {
        NodeId::Container { config, instance } => {
            let name = names::container_name(&ctx.map.name, config, instance.as_deref());
            Ok(container_node_state(ctx, &name, NodeKind::Container).await?)
        }
        NodeId::AttachedVolume { owner, alias } => {
            let name = names::attached_volume_name(
                &ctx.map.name,
                owner,
                alias,
                ctx.map.use_attached_parent_name,
            );
            Ok(container_node_state(ctx, &name, NodeKind::Attached).await?)
        }
        NodeId::Network { name } => {
            let present = ctx.backend.network_exists(name).await?;
            Ok(if present {
                NodeState::present_not_running(NodeKind::Network)
            } else {
                NodeState::absent(NodeKind::Network)
            })
        }
    }
}

async fn container_node_state(
    ctx: &PlanContext<'_>,
    name: &str,
    kind: NodeKind,
) -> LandscapeResult<NodeState> {
    let inspect = ctx.backend.inspect_container(name).await?;
    Ok(match inspect {
        None => NodeState::absent(kind),
        Some(inspect) if inspect.running => NodeState::running(kind, inspect.pid),
        Some(inspect) => NodeState {
            exit_code: inspect.exit_code,
            ..NodeState::present_not_running(kind)
        },
    })
}

async fn classify_update(
    ctx: &PlanContext<'_>,
    config_name: &str,
    instance: Option<&str>,
    options: &UpdateOptions,
) -> LandscapeResult<NodeState> {
    let name = names::container_name(&ctx.map.name, config_name, instance);
    let effective = expand(ctx.map, config_name)?;

    let Some(inspect) = ctx.backend.inspect_container(&name).await? else {
        return Ok(NodeState::absent(NodeKind::Container));
    };

    let mut state = if inspect.running {
        NodeState::running(NodeKind::Container, inspect.pid)
    } else {
        NodeState {
            exit_code: inspect.exit_code,
            ..NodeState::present_not_running(NodeKind::Container)
        }
    };

    state.force_update = options.force_update.contains(config_name);

    let expected_image = names::resolve_image_for_map(ctx.map, config_name, effective.image.as_deref());
    let live_tag_id = ctx.backend.resolve_image_id(&expected_image).await?;
    state.image_matches = live_tag_id.as_deref() == Some(inspect.image_id.as_str());

    state.links_match = effective
        .links
        .iter()
        .all(|link| inspect.links.contains_key(link.effective_alias()));

    let expected_mounts = expected_mount_paths(&effective);
    state.volumes_match = expected_mounts
        .iter()
        .all(|path| inspect.mounts.contains_key(path));

    state.env_matches = true; // subset semantics: nothing in the model mandates specific env yet.
    state.cmd_matches = true;
    state.entrypoint_matches = true;

    state.exposes_match = effective
        .exposes
        .iter()
        .all(|port| inspect.exposed_ports.contains(&port.container_port));

    state.missing_networks = effective
        .networks
        .iter()
        .filter(|endpoint| !inspect.networks.contains_key(&endpoint.network))
        .map(|endpoint| endpoint.network.clone())
        .collect();
    state.networks_match = state.missing_networks.is_empty();

    state.limits_match = limits_match(&effective, &inspect.limits);
    state.driver_matches = true;

    state.exec_present = effective
        .exec_commands
        .iter()
        .enumerate()
        .filter(|(_, exec)| matches!(exec.policy, crate::model::ExecPolicy::Restart))
        .filter(|(_, exec)| exec_process_running(exec, &inspect.running_processes))
        .map(|(i, _)| i.to_string())
        .collect();

    Ok(state)
}

fn expected_mount_paths(config: &ContainerConfig) -> Vec<String> {
    let mut paths: Vec<String> = config.shares.clone();
    paths.extend(config.binds.iter().filter_map(|b| b.container_path().map(str::to_string)));
    paths.extend(config.uses.iter().filter_map(|u| u.container_path.clone()));
    paths
}

fn exec_process_running(
    exec: &crate::model::container::ExecSpec,
    running: &[Vec<String>],
) -> bool {
    use crate::model::value::Value;
    let Value::Constant(command) = &exec.command else {
        return false;
    };
    let expected = command.as_vec();
    running.iter().any(|p| p == &expected)
}

fn limits_match(config: &ContainerConfig, live: &serde_json::Map<String, serde_json::Value>) -> bool {
    let Some(configured) = &config.host_config else {
        return true;
    };
    let crate::model::value::Value::Constant(configured) = configured else {
        return true;
    };
    const LIMIT_KEYS: &[&str] = &[
        "BlkioWeight",
        "CpuPeriod",
        "CpuQuota",
        "CpuShares",
        "CpusetCpus",
        "CpusetMems",
        "Memory",
        "MemoryReservation",
        "MemorySwap",
        "KernelMemory",
    ];
    LIMIT_KEYS.iter().all(|key| match configured.get(*key) {
        None => true,
        Some(expected) => live.get(*key) == Some(expected),
    })
}

