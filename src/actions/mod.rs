//! Action generator family (spec §4.5, component C5).
//!
//! Maps `(intent, NodeState)` to an ordered list of low-level [`Op`]s.
//! Generators never talk to Docker directly — they hand fully-assembled
//! argument bundles to the [`crate::runner::Runner`], which is the only
//! thing that calls a [`crate::docker::backend::DockerBackend`].

pub mod keywords;
pub mod script;

use std::collections::HashSet;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Map as JsonMap;

use crate::error::LandscapeResult;
use crate::graph::NodeId;
use crate::model::container::ExecPolicy;
use crate::model::map::ContainerMap;
use crate::model::merge::expand;
use crate::model::value::Value;
use crate::names;
use crate::state::{self, NodeState, PlanContext, UpdateOptions};

use keywords::{assemble_create_spec, ExplicitOverrides};

/// One low-level Docker operation, already bound to the node it affects.
#[derive(Debug, Clone)]
pub enum Op {
    PullImage {
        image: String,
    },
    CreateVolume {
        name: String,
        driver: String,
    },
    CreateNetwork {
        name: String,
        driver: String,
        internal: bool,
    },
    CreateContainer {
        spec: crate::docker::backend::CreateContainerSpec,
    },
    PreparePermissions {
        container_name: String,
        user: String,
        permissions: String,
        path: String,
    },
    StartContainer {
        container_name: String,
    },
    ConnectNetwork {
        container_name: String,
        network: String,
        aliases: Vec<String>,
    },
    DisconnectNetwork {
        container_name: String,
        network: String,
    },
    Exec {
        container_name: String,
        command: Vec<String>,
        user: Option<String>,
    },
    StopContainer {
        container_name: String,
        signal: String,
        timeout: Duration,
    },
    RemoveContainer {
        container_name: String,
        force: bool,
    },
    RemoveVolume {
        name: String,
    },
    RemoveNetwork {
        name: String,
    },
    UpdateHostConfig {
        container_name: String,
        limits: JsonMap<String, serde_json::Value>,
    },
}

/// One planned operation, tagged with the node it was generated for (used
/// by the Runner to build partial-results entries, spec §4.6).
#[derive(Debug, Clone)]
pub struct PlannedOp {
    pub node: NodeId,
    pub op: Op,
}

fn planned(node: &NodeId, op: Op) -> PlannedOp {
    PlannedOp { node: node.clone(), op }
}

/// **create** (spec §4.5): forward traversal; absent containers, attached
/// volumes, and networks get created. Present containers are untouched.
pub async fn plan_create(ctx: &PlanContext<'_>, roots: &[NodeId]) -> LandscapeResult<Vec<PlannedOp>> {
    let states = state::forward_dependency(ctx, roots).await?;
    let mut ops = Vec::new();
    for (node, node_state) in &states {
        if node_state.present {
            continue;
        }
        ops.extend(create_ops_for(ctx.map, node)?);
    }
    Ok(ops)
}

/// **start** (spec §4.5): forward traversal; start every non-running
/// node in order, with permission prep and network connect/exec
/// bracketed around it.
pub async fn plan_start(ctx: &PlanContext<'_>, roots: &[NodeId]) -> LandscapeResult<Vec<PlannedOp>> {
    let states = state::forward_dependency(ctx, roots).await?;
    let mut ops = Vec::new();
    for (node, node_state) in &states {
        if node_state.running {
            continue;
        }
        match node {
            NodeId::Container { config, instance } => {
                ops.extend(start_ops_for(ctx.map, node, config, instance.as_deref(), true)?);
            }
            NodeId::AttachedVolume { owner, alias } => {
                ops.push(attached_volume_start_op(ctx.map, node, owner, alias));
            }
            NodeId::Network { .. } => {}
        }
    }
    Ok(ops)
}

/// **restart**: restart only the named container, honoring
/// `stop_signal`/`stop_timeout`.
pub async fn plan_restart(ctx: &PlanContext<'_>, node: &NodeId) -> LandscapeResult<Vec<PlannedOp>> {
    let NodeId::Container { config, instance } = node else {
        return Ok(Vec::new());
    };
    let effective = expand(ctx.map, config)?;
    let name = names::container_name(&ctx.map.name, config, instance.as_deref());
    let mut ops = vec![planned(
        node,
        Op::StopContainer {
            container_name: name.clone(),
            signal: effective.stop_signal.clone().unwrap_or_else(|| "SIGTERM".to_string()),
            timeout: effective.stop_timeout.unwrap_or(Duration::from_secs(10)),
        },
    )];
    ops.extend(start_ops_for(ctx.map, node, config, instance.as_deref(), false)?);
    Ok(ops)
}

/// **stop** (spec §4.5): reverse traversal.
pub async fn plan_stop(ctx: &PlanContext<'_>, roots: &[NodeId]) -> LandscapeResult<Vec<PlannedOp>> {
    let states = state::reverse_dependency(ctx, roots).await?;
    let mut ops = Vec::new();
    for (node, node_state) in &states {
        if !node_state.running {
            continue;
        }
        if let NodeId::Container { config, instance } = node {
            let effective = expand(ctx.map, config)?;
            let name = names::container_name(&ctx.map.name, config, instance.as_deref());
            ops.push(planned(
                node,
                Op::StopContainer {
                    container_name: name,
                    signal: effective.stop_signal.clone().unwrap_or_else(|| "SIGTERM".to_string()),
                    timeout: effective
                        .stop_timeout
                        .unwrap_or(Duration::from_secs(10)),
                },
            ));
        }
    }
    Ok(ops)
}

/// **remove** (spec §4.5): reverse traversal; `persistent`/attached
/// containers are skipped unless the corresponding override is set.
pub async fn plan_remove(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
    remove_persistent: bool,
    remove_attached: bool,
) -> LandscapeResult<Vec<PlannedOp>> {
    let states = state::reverse_dependency(ctx, roots).await?;
    let mut ops = Vec::new();
    for (node, node_state) in &states {
        if !node_state.present {
            continue;
        }
        match node {
            NodeId::Container { config, instance } => {
                let effective = expand(ctx.map, config)?;
                if effective.persistent && !remove_persistent {
                    continue;
                }
                let name = names::container_name(&ctx.map.name, config, instance.as_deref());
                ops.push(planned(node, Op::RemoveContainer { container_name: name, force: false }));
            }
            NodeId::AttachedVolume { owner, alias } => {
                if !remove_attached {
                    continue;
                }
                let name = names::attached_volume_name(
                    &ctx.map.name,
                    owner,
                    alias,
                    ctx.map.use_attached_parent_name,
                );
                ops.push(planned(node, Op::RemoveContainer { container_name: name, force: false }));
            }
            NodeId::Network { .. } => {}
        }
    }
    Ok(ops)
}

/// **startup** (spec §4.5): forward; nonrecoverable containers are
/// recreated, absent ones created and started, present-but-stopped ones
/// started.
pub async fn plan_startup(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
    options: &UpdateOptions,
) -> LandscapeResult<Vec<PlannedOp>> {
    let states = state::update(ctx, roots, options).await?;
    let mut ops = Vec::new();
    for (node, node_state) in &states {
        let nonrecoverable = state::is_nonrecoverable(node_state.exit_code, &options.nonrecoverable_exit_codes);
        if nonrecoverable {
            ops.extend(remove_ops_for(ctx.map, node)?);
            ops.extend(create_ops_for(ctx.map, node)?);
            ops.extend(startup_start_ops(ctx.map, node, true)?);
        } else if !node_state.present {
            ops.extend(create_ops_for(ctx.map, node)?);
            ops.extend(startup_start_ops(ctx.map, node, true)?);
        } else if !node_state.running {
            ops.extend(startup_start_ops(ctx.map, node, false)?);
        }
    }
    Ok(ops)
}

fn startup_start_ops(map: &ContainerMap, node: &NodeId, run_initial_execs: bool) -> LandscapeResult<Vec<PlannedOp>> {
    match node {
        NodeId::Container { config, instance } => {
            start_ops_for(map, node, config, instance.as_deref(), run_initial_execs)
        }
        NodeId::AttachedVolume { owner, alias } => Ok(vec![attached_volume_start_op(map, node, owner, alias)]),
        NodeId::Network { .. } => Ok(Vec::new()),
    }
}

/// The container-side path an attached volume is mounted at: the
/// `attaches` entry's own `default_path`, else the map-level
/// `volumes.<alias>.default_path`, else `/<alias>` (spec §3 `AttachSpec`).
fn attached_volume_container_path(map: &ContainerMap, attach: &crate::model::container::AttachSpec) -> String {
    attach
        .default_path
        .clone()
        .or_else(|| map.volumes.get(&attach.alias).and_then(|v| v.default_path.clone()))
        .unwrap_or_else(|| format!("/{}", attach.alias))
}

fn attached_volume_start_op(map: &ContainerMap, node: &NodeId, owner: &str, alias: &str) -> PlannedOp {
    let name = names::attached_volume_name(&map.name, owner, alias, map.use_attached_parent_name);
    planned(node, Op::StartContainer { container_name: name })
}

/// **shutdown**: stop then remove over one traversal.
pub async fn plan_shutdown(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
    remove_persistent: bool,
    remove_attached: bool,
) -> LandscapeResult<Vec<PlannedOp>> {
    let mut ops = plan_stop(ctx, roots).await?;
    ops.extend(plan_remove(ctx, roots, remove_persistent, remove_attached).await?);
    Ok(ops)
}

/// **update** (spec §4.5): forward traversal, branching on the §4.4
/// match results.
pub async fn plan_update(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
    options: &UpdateOptions,
) -> LandscapeResult<Vec<PlannedOp>> {
    let states = state::update(ctx, roots, options).await?;
    let mut ops = Vec::new();
    for (node, node_state) in &states {
        let NodeId::Container { config, instance } = node else {
            continue;
        };
        let nonrecoverable = state::is_nonrecoverable(node_state.exit_code, &options.nonrecoverable_exit_codes);

        if !nonrecoverable && node_state.fully_matches() {
            ops.extend(reconnect_missing_networks(ctx.map, node, config, node_state)?);
            ops.extend(rerun_missing_restart_execs(ctx.map, node, config, instance.as_deref(), node_state)?);
            continue;
        }

        if !nonrecoverable && node_state.only_limits_mismatch() && ctx.backend.supports_host_config_update() {
            let effective = expand(ctx.map, config)?;
            if let Some(Value::Constant(limits)) = &effective.host_config {
                let name = names::container_name(&ctx.map.name, config, instance.as_deref());
                ops.push(planned(node, Op::UpdateHostConfig { container_name: name, limits: limits.clone() }));
            }
            continue;
        }

        if node_state.running {
            ops.extend(stop_ops_for(ctx.map, node, config, instance.as_deref())?);
        }
        if node_state.present {
            ops.extend(remove_ops_for(ctx.map, node)?);
        }
        ops.extend(create_ops_for(ctx.map, node)?);
        ops.extend(start_ops_for(ctx.map, node, config, instance.as_deref(), true)?);
    }
    Ok(ops)
}

/// **pull** (spec §4.5): forward traversal over configured images.
pub async fn plan_pull(
    ctx: &PlanContext<'_>,
    roots: &[NodeId],
    only_missing: bool,
) -> LandscapeResult<Vec<PlannedOp>> {
    let order = ctx.graph.forward_order_for(roots)?;
    let mut seen = HashSet::new();
    let mut ops = Vec::new();
    for node in &order {
        let NodeId::Container { config, .. } = node else {
            continue;
        };
        let effective = expand(ctx.map, config)?;
        let image = names::resolve_image_for_map(ctx.map, config, effective.image.as_deref());
        if !seen.insert(image.clone()) {
            continue;
        }
        if only_missing && ctx.backend.resolve_image_id(&image).await?.is_some() {
            continue;
        }
        ops.push(planned(node, Op::PullImage { image }));
    }
    Ok(ops)
}

fn create_ops_for(map: &ContainerMap, node: &NodeId) -> LandscapeResult<Vec<PlannedOp>> {
    match node {
        NodeId::Container { config, instance } => {
            let effective = expand(map, config)?;
            let volumes_from = effective
                .uses
                .iter()
                .filter_map(|u| match &u.target {
                    crate::model::container::UseTarget::Attached(alias) => Some(
                        names::attached_volume_name(&map.name, config, alias, map.use_attached_parent_name),
                    ),
                    crate::model::container::UseTarget::ParentAttached { parent, alias } => Some(
                        names::attached_volume_name(&map.name, parent, alias, map.use_attached_parent_name),
                    ),
                    crate::model::container::UseTarget::Container(target) => {
                        Some(names::container_name(&map.name, target, None))
                    }
                })
                .collect();
            let spec = assemble_create_spec(
                map,
                config,
                instance.as_deref(),
                &effective,
                volumes_from,
                &ExplicitOverrides::default(),
            );
            Ok(vec![planned(node, Op::CreateContainer { spec })])
        }
        NodeId::AttachedVolume { owner, alias } => {
            let owner_config = map
                .containers
                .get(owner)
                .ok_or_else(|| crate::error::LandscapeError::map_integrity(&map.name, format!("unknown owner '{owner}'")))?;
            let attach = owner_config
                .attaches
                .iter()
                .find(|a| &a.alias == alias)
                .ok_or_else(|| crate::error::LandscapeError::map_integrity(&map.name, format!("unknown attach alias '{alias}'")))?;
            let name = names::attached_volume_name(&map.name, owner, alias, map.use_attached_parent_name);
            let spec = crate::docker::backend::CreateContainerSpec {
                name,
                image: "tianon/true".to_string(),
                cmd: vec!["true".to_string()],
                exposed_ports: vec![],
                binds: vec![(attached_volume_container_path(map, attach), alias.clone(), false)],
                ..Default::default()
            };
            Ok(vec![planned(node, Op::CreateContainer { spec })])
        }
        NodeId::Network { name } => {
            let config = map.networks.get(name);
            Ok(vec![planned(
                node,
                Op::CreateNetwork {
                    name: name.clone(),
                    driver: config.map(|c| c.driver.clone()).unwrap_or_else(|| "bridge".to_string()),
                    internal: config.map(|c| c.internal).unwrap_or(false),
                },
            )])
        }
    }
}

fn start_ops_for(
    map: &ContainerMap,
    node: &NodeId,
    config: &str,
    instance: Option<&str>,
    run_initial_execs: bool,
) -> LandscapeResult<Vec<PlannedOp>> {
    let effective = expand(map, config)?;
    let name = names::container_name(&map.name, config, instance);
    let mut ops = Vec::new();

    if let (Some(user), Some(permissions)) = (
        effective.user.as_ref().map(Value::resolve),
        effective.permissions.clone(),
    ) {
        if effective.attaches.is_empty() {
            ops.push(planned(
                node,
                Op::PreparePermissions {
                    container_name: name.clone(),
                    user: user.clone(),
                    permissions: permissions.clone(),
                    path: "/".to_string(),
                },
            ));
        } else {
            for attach in &effective.attaches {
                ops.push(planned(
                    node,
                    Op::PreparePermissions {
                        container_name: name.clone(),
                        user: user.clone(),
                        permissions: permissions.clone(),
                        path: attached_volume_container_path(map, attach),
                    },
                ));
            }
        }
    }

    ops.push(planned(node, Op::StartContainer { container_name: name.clone() }));

    for endpoint in &effective.networks {
        ops.push(planned(
            node,
            Op::ConnectNetwork {
                container_name: name.clone(),
                network: endpoint.network.clone(),
                aliases: endpoint.aliases.clone(),
            },
        ));
    }

    for exec in &effective.exec_commands {
        if !run_initial_execs && !matches!(exec.policy, ExecPolicy::Restart) {
            continue;
        }
        if let Value::Constant(command) = &exec.command {
            ops.push(planned(
                node,
                Op::Exec {
                    container_name: name.clone(),
                    command: command.as_vec(),
                    user: exec.user.as_ref().map(Value::resolve),
                },
            ));
        }
    }

    Ok(ops)
}

fn stop_ops_for(map: &ContainerMap, node: &NodeId, config: &str, instance: Option<&str>) -> LandscapeResult<Vec<PlannedOp>> {
    let effective = expand(map, config)?;
    let name = names::container_name(&map.name, config, instance);
    Ok(vec![planned(
        node,
        Op::StopContainer {
            container_name: name,
            signal: effective.stop_signal.clone().unwrap_or_else(|| "SIGTERM".to_string()),
            timeout: effective.stop_timeout.unwrap_or(Duration::from_secs(10)),
        },
    )])
}

fn remove_ops_for(map: &ContainerMap, node: &NodeId) -> LandscapeResult<Vec<PlannedOp>> {
    match node {
        NodeId::Container { config, instance } => {
            let name = names::container_name(&map.name, config, instance.as_deref());
            Ok(vec![planned(node, Op::RemoveContainer { container_name: name, force: false })])
        }
        NodeId::AttachedVolume { owner, alias } => {
            let name = names::attached_volume_name(&map.name, owner, alias, map.use_attached_parent_name);
            Ok(vec![planned(node, Op::RemoveContainer { container_name: name, force: false })])
        }
        NodeId::Network { name } => Ok(vec![planned(node, Op::RemoveNetwork { name: name.clone() })]),
    }
}

fn reconnect_missing_networks(
    map: &ContainerMap,
    node: &NodeId,
    config: &str,
    node_state: &NodeState,
) -> LandscapeResult<Vec<PlannedOp>> {
    if node_state.networks_match {
        return Ok(Vec::new());
    }
    let effective = expand(map, config)?;
    let NodeId::Container { instance, .. } = node else {
        return Ok(Vec::new());
    };
    let name = names::container_name(&map.name, config, instance.as_deref());
    Ok(effective
        .networks
        .iter()
        .filter(|endpoint| node_state.missing_networks.contains(&endpoint.network))
        .map(|endpoint| {
            planned(
                node,
                Op::ConnectNetwork {
                    container_name: name.clone(),
                    network: endpoint.network.clone(),
                    aliases: endpoint.aliases.clone(),
                },
            )
        })
        .collect())
}

fn rerun_missing_restart_execs(
    map: &ContainerMap,
    node: &NodeId,
    config: &str,
    instance: Option<&str>,
    node_state: &NodeState,
) -> LandscapeResult<Vec<PlannedOp>> {
    let effective = expand(map, config)?;
    let name = names::container_name(&map.name, config, instance);
    let mut ops = Vec::new();
    for (index, exec) in effective.exec_commands.iter().enumerate() {
        if !matches!(exec.policy, ExecPolicy::Restart) {
            continue;
        }
        if node_state.exec_present.contains(&index.to_string()) {
            continue;
        }
        if let Value::Constant(command) = &exec.command {
            ops.push(planned(
                node,
                Op::Exec {
                    container_name: name.clone(),
                    command: command.as_vec(),
                    user: exec.user.as_ref().map(Value::resolve),
                },
            ));
        }
    }
    Ok(ops)
}
