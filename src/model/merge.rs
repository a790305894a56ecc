//! Inheritance merge and post-merge integrity check (spec §4.1).

use std::collections::HashMap;

use crate::error::{LandscapeError, LandscapeResult};
use crate::model::container::{ContainerConfig, NetworkMode, UseTarget};
use crate::model::map::ContainerMap;
use crate::model::value::Value;

/// Merge two ordered lists of keyed records: later entries (by key)
/// override earlier ones, first-seen order is preserved (spec §4.1).
fn merge_keyed<T: Clone>(base: &[T], overlay: &[T], key_of: impl Fn(&T) -> String) -> Vec<T> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, T> = HashMap::new();
    for item in base.iter().chain(overlay.iter()) {
        let key = key_of(item);
        if !by_key.contains_key(&key) {
            order.push(key.clone());
        }
        by_key.insert(key, item.clone());
    }
    order
        .into_iter()
        .map(|key| by_key.remove(&key).expect("key was just inserted"))
        .collect()
}

/// Union of two scalar lists, preserving first-occurrence order (spec
/// §4.1 "list-of-scalars fields").
fn union_preserving_order(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    base.iter()
        .chain(overlay.iter())
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}

/// Key-wise merge of two JSON object dicts; only defined when both sides
/// are literal (`Value::Constant`) — a lazily-produced dict cannot be
/// inspected without evaluating it at merge time, which spec §4.1
/// forbids ("never at load time"), so a non-constant overlay simply
/// replaces the base outright.
fn merge_dict_values(
    base: &Option<Value<serde_json::Map<String, serde_json::Value>>>,
    overlay: &Option<Value<serde_json::Map<String, serde_json::Value>>>,
) -> Option<Value<serde_json::Map<String, serde_json::Value>>> {
    match (base, overlay) {
        (_, None) => base.clone(),
        (None, Some(_)) => overlay.clone(),
        (Some(Value::Constant(base_map)), Some(Value::Constant(overlay_map))) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                merged.insert(k.clone(), v.clone());
            }
            Some(Value::Constant(merged))
        }
        (Some(_), Some(_)) => overlay.clone(),
    }
}

fn merge_one(base: &ContainerConfig, overlay: &ContainerConfig) -> ContainerConfig {
    ContainerConfig {
        // `abstract` is never inherited: only the config actually loaded
        // carries it, and extends folding always ends at a concrete
        // config the caller asked to instantiate.
        is_abstract: overlay.is_abstract,
        extends: Vec::new(),
        image: overlay.image.clone().or_else(|| base.image.clone()),
        instances: if overlay.instances.is_empty() {
            base.instances.clone()
        } else {
            overlay.instances.clone()
        },
        clients: union_preserving_order(&base.clients, &overlay.clients),
        shares: union_preserving_order(&base.shares, &overlay.shares),
        binds: merge_keyed(&base.binds, &overlay.binds, |b| {
            b.container_path().unwrap_or_default().to_string()
        }),
        uses: merge_keyed(&base.uses, &overlay.uses, |u| use_target_key(&u.target)),
        attaches: merge_keyed(&base.attaches, &overlay.attaches, |a| a.alias.clone()),
        links: merge_keyed(&base.links, &overlay.links, |l| l.container.clone()),
        exposes: merge_keyed(&base.exposes, &overlay.exposes, |p| {
            format!(
                "{}/{}",
                p.container_port,
                p.interface_alias.clone().unwrap_or_default()
            )
        }),
        networks: ContainerConfig::merge_networks(&base.networks, &overlay.networks),
        network_mode: overlay
            .network_mode
            .clone()
            .or_else(|| base.network_mode.clone()),
        exec_commands: {
            let mut all: Vec<_> = base.exec_commands.clone();
            all.extend(overlay.exec_commands.clone());
            let mut order = Vec::new();
            let mut by_key = HashMap::new();
            for (i, item) in all.into_iter().enumerate() {
                let key = item.merge_key(i);
                if !by_key.contains_key(&key) {
                    order.push(key.clone());
                }
                by_key.insert(key, item);
            }
            order
                .into_iter()
                .map(|key| by_key.remove(&key).expect("key was just inserted"))
                .collect()
        },
        healthcheck: overlay
            .healthcheck
            .clone()
            .or_else(|| base.healthcheck.clone()),
        user: overlay.user.clone().or_else(|| base.user.clone()),
        permissions: overlay
            .permissions
            .clone()
            .or_else(|| base.permissions.clone()),
        stop_timeout: overlay.stop_timeout.or(base.stop_timeout),
        stop_signal: overlay
            .stop_signal
            .clone()
            .or_else(|| base.stop_signal.clone()),
        persistent: overlay.persistent || base.persistent,
        create_options: merge_dict_values(&base.create_options, &overlay.create_options),
        host_config: merge_dict_values(&base.host_config, &overlay.host_config),
    }
}

fn use_target_key(target: &UseTarget) -> String {
    match target {
        UseTarget::Container(name) => format!("container:{name}"),
        UseTarget::Attached(alias) => format!("attached:{alias}"),
        UseTarget::ParentAttached { parent, alias } => format!("parent:{parent}.{alias}"),
    }
}

/// Fold a configuration's `extends` chain left-to-right, then apply the
/// configuration's own fields last (spec §4.1 "Inheritance"). Cycles in
/// `extends` are reported as [`LandscapeError::Configuration`].
pub fn expand(map: &ContainerMap, config_name: &str) -> LandscapeResult<ContainerConfig> {
    let mut visiting = Vec::new();
    expand_inner(map, config_name, &mut visiting)
}

fn expand_inner(
    map: &ContainerMap,
    config_name: &str,
    visiting: &mut Vec<String>,
) -> LandscapeResult<ContainerConfig> {
    if visiting.contains(&config_name.to_string()) {
        visiting.push(config_name.to_string());
        return Err(LandscapeError::configuration(format!(
            "cycle in extends: {}",
            visiting.join(" -> ")
        )));
    }
    let config = map.containers.get(config_name).ok_or_else(|| {
        LandscapeError::configuration(format!("unknown configuration '{config_name}'"))
    })?;

    visiting.push(config_name.to_string());
    let mut effective = ContainerConfig::default();
    for parent in &config.extends {
        let parent_effective = expand_inner(map, parent, visiting)?;
        effective = merge_one(&effective, &parent_effective);
    }
    effective = merge_one(&effective, config);
    visiting.pop();
    Ok(effective)
}

/// Idempotence check helper: expanding an already-expanded config (no
/// `extends` left to fold) returns it unchanged (spec §8 invariant 3).
pub fn expand_is_noop_for_leaf(config: &ContainerConfig) -> bool {
    config.extends.is_empty()
}

/// Post-merge integrity check: every alias reference in every expanded
/// configuration resolves, and every `uses`/`links`/`network_mode`
/// target is a known configuration or an explicit escape hatch (spec
/// §4.1 "Integrity check").
pub fn integrity_check(map: &ContainerMap) -> LandscapeResult<()> {
    let known_aliases: std::collections::HashSet<&str> = map.known_volume_aliases().collect();
    let known_networks: std::collections::HashSet<&str> =
        map.networks.keys().map(String::as_str).collect();
    let known_configs: std::collections::HashSet<&str> =
        map.containers.keys().map(String::as_str).collect();

    for (name, config) in &map.containers {
        if config.is_abstract {
            continue;
        }
        let effective = expand(map, name)?;

        for attach in &effective.attaches {
            if !known_aliases.contains(attach.alias.as_str()) && map.volumes.contains_key(&attach.alias)
            {
                // declared via `attaches`, materialized rather than
                // pre-declared under `volumes`/`host` — always valid.
                continue;
            }
        }

        for bind in &effective.binds {
            if let crate::model::container::BindSpec::Alias { alias, .. } = bind {
                if !known_aliases.contains(alias.as_str()) {
                    return Err(LandscapeError::map_integrity(
                        &map.name,
                        format!("'{name}' binds unknown alias '{alias}'"),
                    ));
                }
            }
        }

        for use_spec in &effective.uses {
            match &use_spec.target {
                UseTarget::Container(target) => {
                    if !known_configs.contains(target.as_str()) {
                        return Err(LandscapeError::map_integrity(
                            &map.name,
                            format!("'{name}' uses unknown configuration '{target}'"),
                        ));
                    }
                }
                UseTarget::Attached(alias) => {
                    if !effective.attaches.iter().any(|a| &a.alias == alias) {
                        return Err(LandscapeError::map_integrity(
                            &map.name,
                            format!("'{name}' uses unknown attached alias '{alias}'"),
                        ));
                    }
                }
                UseTarget::ParentAttached { parent, alias } => {
                    let parent_config = map.containers.get(parent).ok_or_else(|| {
                        LandscapeError::map_integrity(
                            &map.name,
                            format!("'{name}' uses unknown parent configuration '{parent}'"),
                        )
                    })?;
                    if !parent_config.attaches.iter().any(|a| &a.alias == alias) {
                        return Err(LandscapeError::map_integrity(
                            &map.name,
                            format!("'{name}' uses unknown attached alias '{parent}.{alias}'"),
                        ));
                    }
                }
            }
        }

        for link in &effective.links {
            if !known_configs.contains(link.container.as_str()) {
                return Err(LandscapeError::map_integrity(
                    &map.name,
                    format!("'{name}' links to unknown configuration '{}'", link.container),
                ));
            }
        }

        for endpoint in &effective.networks {
            if !known_networks.contains(endpoint.network.as_str()) {
                return Err(LandscapeError::map_integrity(
                    &map.name,
                    format!("'{name}' attaches to unknown network '{}'", endpoint.network),
                ));
            }
        }

        if let Some(mode) = &effective.network_mode {
            if let NetworkMode::Config { name: target, instance } = mode {
                let target_config = map.containers.get(target).ok_or_else(|| {
                    LandscapeError::map_integrity(
                        &map.name,
                        format!("'{name}' network_mode references unknown configuration '{target}'"),
                    )
                })?;
                // Open question resolved per spec §9: an unlabeled
                // instance requires the target to have exactly one
                // instance.
                if instance.is_none() && target_config.instances.len() > 1 {
                    return Err(LandscapeError::map_integrity(
                        &map.name,
                        format!(
                            "'{name}' network_mode='{target}' is ambiguous: '{target}' has multiple instances and no instance label was given"
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::container::BindSpec;

    fn map_with_extends() -> ContainerMap {
        let mut map = ContainerMap::new("m");
        let mut base = ContainerConfig {
            is_abstract: true,
            ..Default::default()
        };
        base.shares.push("/data".to_string());
        base.binds.push(BindSpec::Alias {
            alias: "cache".to_string(),
            container_path: None,
            readonly: false,
        });
        map.containers.insert("base".to_string(), base);

        let mut child = ContainerConfig {
            extends: vec!["base".to_string()],
            image: Some("app:latest".to_string()),
            ..Default::default()
        };
        child.shares.push("/logs".to_string());
        map.containers.insert("child".to_string(), child);
        map.volumes
            .insert("cache".to_string(), crate::model::volume::VolumeConfig::default());
        map
    }

    #[test]
    fn extends_folds_left_to_right_and_unions_shares() {
        let map = map_with_extends();
        let effective = expand(&map, "child").unwrap();
        assert_eq!(effective.shares, vec!["/data".to_string(), "/logs".to_string()]);
        assert_eq!(effective.image.as_deref(), Some("app:latest"));
        assert_eq!(effective.binds.len(), 1);
    }

    #[test]
    fn expand_is_idempotent_on_a_leaf_config() {
        let map = map_with_extends();
        let effective = expand(&map, "child").unwrap();
        assert!(expand_is_noop_for_leaf(&effective));
    }

    #[test]
    fn cycle_in_extends_is_an_error() {
        let mut map = ContainerMap::new("m");
        map.containers.insert(
            "a".to_string(),
            ContainerConfig {
                extends: vec!["b".to_string()],
                ..Default::default()
            },
        );
        map.containers.insert(
            "b".to_string(),
            ContainerConfig {
                extends: vec!["a".to_string()],
                ..Default::default()
            },
        );
        let err = expand(&map, "a").unwrap_err();
        assert!(matches!(err, LandscapeError::Configuration { .. }));
    }

    #[test]
    fn integrity_check_rejects_dangling_bind_alias() {
        let mut map = ContainerMap::new("m");
        map.containers.insert(
            "app".to_string(),
            ContainerConfig {
                binds: vec![BindSpec::Alias {
                    alias: "missing".to_string(),
                    container_path: None,
                    readonly: false,
                }],
                ..Default::default()
            },
        );
        let err = integrity_check(&map).unwrap_err();
        assert!(matches!(err, LandscapeError::MapIntegrity { .. }));
    }
}
