//! The "clean" step: canonicalizing the loose surface-syntax shapes a
//! declarative input format may offer (a bare scalar, a two-element
//! tuple, a single-key mapping, …) into the canonical record types in
//! [`crate::model::container`] (spec §4.1).
//!
//! Every function here is a pure `serde_json::Value -> Vec<Record>`
//! (or `Value -> Record`) conversion. Cleaning happens once, during
//! [`crate::model::merge::expand`]; nothing downstream of that sees a
//! loose shape again (spec §8 invariant 4: `clean(clean(x)) == clean(x)`).

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::LandscapeError;
use crate::model::container::{
    AttachSpec, BindSpec, CommandSpec, EndpointSpec, ExecPolicy, ExecSpec, LinkSpec, PortSpec,
    UseSpec, UseTarget,
};
use crate::model::value::Value;
use crate::model::volume::HostVolumeEntry;

fn as_list(value: &Json) -> Vec<Json> {
    match value {
        Json::Array(items) => items.clone(),
        Json::Null => Vec::new(),
        scalar => vec![scalar.clone()],
    }
}

fn json_str(value: &Json) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// `clients`, `shares`, and similar list-of-scalar fields: a bare scalar
/// becomes a one-element list.
pub fn clean_scalar_list(value: &Json) -> Vec<String> {
    as_list(value)
        .into_iter()
        .filter_map(|v| json_str(&v))
        .collect()
}

/// `binds`: accepts a scalar alias, a `[alias, readonly]` two-tuple, a
/// `{alias: readonly}` single-key mapping, or the full canonical object.
pub fn clean_binds(value: &Json) -> Result<Vec<BindSpec>, LandscapeError> {
    as_list(value).iter().map(clean_one_bind).collect()
}

fn clean_one_bind(value: &Json) -> Result<BindSpec, LandscapeError> {
    match value {
        Json::String(alias) => Ok(BindSpec::Alias {
            alias: alias.clone(),
            container_path: None,
            readonly: false,
        }),
        Json::Array(items) if items.len() == 2 => {
            let alias = json_str(&items[0])
                .ok_or_else(|| LandscapeError::configuration("bind tuple alias must be a string"))?;
            let readonly = items[1].as_bool().unwrap_or(false);
            Ok(BindSpec::Alias {
                alias,
                container_path: None,
                readonly,
            })
        }
        Json::Object(map) if map.len() == 1 && !map.contains_key("alias") && !map.contains_key("host_path") => {
            let (alias, readonly_val) = map.iter().next().expect("len == 1");
            Ok(BindSpec::Alias {
                alias: alias.clone(),
                container_path: None,
                readonly: readonly_val.as_bool().unwrap_or(false),
            })
        }
        Json::Object(map) => {
            let readonly = map.get("readonly").and_then(Json::as_bool).unwrap_or(false);
            if let Some(host_path) = map.get("host_path") {
                let container_path = map
                    .get("container_path")
                    .and_then(Json::as_str)
                    .ok_or_else(|| {
                        LandscapeError::configuration("direct bind requires container_path")
                    })?
                    .to_string();
                Ok(BindSpec::Direct {
                    container_path,
                    host_path: Value::constant(
                        host_path
                            .as_str()
                            .ok_or_else(|| {
                                LandscapeError::configuration("bind host_path must be a string")
                            })?
                            .to_string(),
                    ),
                    readonly,
                })
            } else {
                let alias = map
                    .get("alias")
                    .and_then(Json::as_str)
                    .ok_or_else(|| LandscapeError::configuration("bind object requires alias"))?
                    .to_string();
                let container_path = map
                    .get("container_path")
                    .and_then(Json::as_str)
                    .map(str::to_string);
                Ok(BindSpec::Alias {
                    alias,
                    container_path,
                    readonly,
                })
            }
        }
        other => Err(LandscapeError::configuration(format!(
            "invalid bind shape: {other}"
        ))),
    }
}

/// `links`: a scalar container name, a `[container, alias]` two-tuple, or
/// the canonical object.
pub fn clean_links(value: &Json) -> Result<Vec<LinkSpec>, LandscapeError> {
    as_list(value)
        .iter()
        .map(|item| match item {
            Json::String(container) => Ok(LinkSpec {
                container: container.clone(),
                alias: None,
            }),
            Json::Array(items) if items.len() == 2 => Ok(LinkSpec {
                container: json_str(&items[0]).ok_or_else(|| {
                    LandscapeError::configuration("link tuple container must be a string")
                })?,
                alias: json_str(&items[1]),
            }),
            Json::Object(map) => Ok(LinkSpec {
                container: map
                    .get("container")
                    .and_then(Json::as_str)
                    .ok_or_else(|| LandscapeError::configuration("link object requires container"))?
                    .to_string(),
                alias: map.get("alias").and_then(Json::as_str).map(str::to_string),
            }),
            other => Err(LandscapeError::configuration(format!(
                "invalid link shape: {other}"
            ))),
        })
        .collect()
}

/// `uses`: a scalar `target` or `"parent.alias"`, or the canonical object
/// with an explicit `container_path`.
pub fn clean_uses(value: &Json) -> Result<Vec<UseSpec>, LandscapeError> {
    as_list(value)
        .iter()
        .map(|item| match item {
            Json::String(target) => Ok(UseSpec {
                target: parse_use_target(target),
                container_path: None,
            }),
            Json::Object(map) => {
                let target = map
                    .get("target")
                    .and_then(Json::as_str)
                    .ok_or_else(|| LandscapeError::configuration("uses object requires target"))?;
                Ok(UseSpec {
                    target: parse_use_target(target),
                    container_path: map
                        .get("container_path")
                        .and_then(Json::as_str)
                        .map(str::to_string),
                })
            }
            other => Err(LandscapeError::configuration(format!(
                "invalid uses shape: {other}"
            ))),
        })
        .collect()
}

fn parse_use_target(raw: &str) -> UseTarget {
    if let Some((parent, alias)) = raw.split_once('.') {
        UseTarget::ParentAttached {
            parent: parent.to_string(),
            alias: alias.to_string(),
        }
    } else {
        // Disambiguated against the map's known aliases/configs by the
        // integrity check; defaults to a plain container reference here
        // and is reclassified to `Attached` during merge if the name
        // matches one of the configuration's own `attaches` aliases.
        UseTarget::Container(raw.to_string())
    }
}

/// `attaches`: a scalar alias, or the canonical object with a
/// `default_path`.
pub fn clean_attaches(value: &Json) -> Result<Vec<AttachSpec>, LandscapeError> {
    as_list(value)
        .iter()
        .map(|item| match item {
            Json::String(alias) => Ok(AttachSpec {
                alias: alias.clone(),
                default_path: None,
            }),
            Json::Object(map) => Ok(AttachSpec {
                alias: map
                    .get("alias")
                    .and_then(Json::as_str)
                    .ok_or_else(|| LandscapeError::configuration("attach object requires alias"))?
                    .to_string(),
                default_path: map
                    .get("default_path")
                    .and_then(Json::as_str)
                    .map(str::to_string),
            }),
            other => Err(LandscapeError::configuration(format!(
                "invalid attach shape: {other}"
            ))),
        })
        .collect()
}

/// `exposes`: a scalar container port, a `[container_port, host_port]`
/// two-tuple, or the canonical object.
pub fn clean_exposes(value: &Json) -> Result<Vec<PortSpec>, LandscapeError> {
    as_list(value)
        .iter()
        .map(|item| match item {
            Json::Number(n) => Ok(PortSpec {
                container_port: port_of(n)?,
                host_port: None,
                interface_alias: None,
                ipv6: false,
            }),
            Json::Array(items) if items.len() == 2 => Ok(PortSpec {
                container_port: items[0]
                    .as_u64()
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or_else(|| LandscapeError::configuration("invalid container_port"))?,
                host_port: items[1].as_u64().and_then(|n| u16::try_from(n).ok()).map(Value::constant),
                interface_alias: None,
                ipv6: false,
            }),
            Json::Object(map) => Ok(PortSpec {
                container_port: map
                    .get("container_port")
                    .and_then(Json::as_u64)
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or_else(|| {
                        LandscapeError::configuration("expose object requires container_port")
                    })?,
                host_port: map
                    .get("host_port")
                    .and_then(Json::as_u64)
                    .and_then(|n| u16::try_from(n).ok())
                    .map(Value::constant),
                interface_alias: map
                    .get("interface")
                    .and_then(Json::as_str)
                    .map(str::to_string),
                ipv6: map.get("ipv6").and_then(Json::as_bool).unwrap_or(false),
            }),
            other => Err(LandscapeError::configuration(format!(
                "invalid expose shape: {other}"
            ))),
        })
        .collect()
}

fn port_of(n: &serde_json::Number) -> Result<u16, LandscapeError> {
    n.as_u64()
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| LandscapeError::configuration("port out of range"))
}

/// `networks`: a scalar network name, or the canonical object.
pub fn clean_endpoints(value: &Json) -> Result<Vec<EndpointSpec>, LandscapeError> {
    as_list(value)
        .iter()
        .map(|item| match item {
            Json::String(name) => Ok(EndpointSpec {
                network: name.clone(),
                aliases: Vec::new(),
                links: Vec::new(),
                ipv4: None,
                ipv6: None,
                link_local_ips: Vec::new(),
            }),
            Json::Object(map) => Ok(EndpointSpec {
                network: map
                    .get("network")
                    .and_then(Json::as_str)
                    .ok_or_else(|| LandscapeError::configuration("network object requires network"))?
                    .to_string(),
                aliases: map
                    .get("aliases")
                    .map(clean_scalar_list)
                    .unwrap_or_default(),
                links: map.get("links").map(clean_scalar_list).unwrap_or_default(),
                ipv4: map
                    .get("ipv4")
                    .and_then(Json::as_str)
                    .and_then(|s| s.parse().ok()),
                ipv6: map
                    .get("ipv6")
                    .and_then(Json::as_str)
                    .and_then(|s| s.parse().ok()),
                link_local_ips: map
                    .get("link_local_ips")
                    .map(clean_scalar_list)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|s| s.parse().ok())
                    .collect(),
            }),
            other => Err(LandscapeError::configuration(format!(
                "invalid network endpoint shape: {other}"
            ))),
        })
        .collect()
}

/// `exec_commands`: a scalar command string, or the canonical object.
pub fn clean_exec_commands(value: &Json) -> Result<Vec<ExecSpec>, LandscapeError> {
    as_list(value)
        .iter()
        .map(|item| match item {
            Json::String(cmd) => Ok(ExecSpec {
                command: Value::constant(CommandSpec::Scalar(cmd.clone())),
                user: None,
                policy: ExecPolicy::Restart,
            }),
            Json::Object(map) => {
                let command = map
                    .get("command")
                    .ok_or_else(|| LandscapeError::configuration("exec entry requires command"))?;
                let command = match command {
                    Json::String(s) => CommandSpec::Scalar(s.clone()),
                    Json::Array(_) => CommandSpec::List(clean_scalar_list(command)),
                    other => {
                        return Err(LandscapeError::configuration(format!(
                            "invalid exec command shape: {other}"
                        )));
                    }
                };
                let policy = match map.get("policy").and_then(Json::as_str) {
                    Some("INITIAL") => ExecPolicy::Initial,
                    _ => ExecPolicy::Restart,
                };
                Ok(ExecSpec {
                    command: Value::constant(command),
                    user: map
                        .get("user")
                        .and_then(Json::as_str)
                        .map(|s| Value::constant(s.to_string())),
                    policy,
                })
            }
            other => Err(LandscapeError::configuration(format!(
                "invalid exec_commands shape: {other}"
            ))),
        })
        .collect()
}

/// `host.<alias>`: a bare string applies to every instance; a mapping of
/// instance label to path is instance-indexed.
pub fn clean_host_entry(value: &Json) -> Result<HostVolumeEntry, LandscapeError> {
    match value {
        Json::String(path) => Ok(HostVolumeEntry::Single(Value::constant(path.clone()))),
        Json::Object(map) => {
            let mut per_instance = HashMap::new();
            for (instance, path) in map {
                let path = path
                    .as_str()
                    .ok_or_else(|| LandscapeError::configuration("host instance path must be a string"))?;
                per_instance.insert(instance.clone(), Value::constant(path.to_string()));
            }
            Ok(HostVolumeEntry::PerInstance(per_instance))
        }
        other => Err(LandscapeError::configuration(format!(
            "invalid host volume shape: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_is_idempotent_for_binds() {
        let raw = json!(["cache", ["logs", true]]);
        let first = clean_binds(&raw).unwrap();
        // Re-cleaning the canonical form (already-structured objects)
        // yields the same records.
        let canonical = json!([
            {"alias": "cache", "readonly": false},
            {"alias": "logs", "readonly": true},
        ]);
        let second = clean_binds(&canonical).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.container_path(), b.container_path());
            assert_eq!(a.readonly(), b.readonly());
        }
    }

    #[test]
    fn scalar_becomes_one_element_list() {
        assert_eq!(clean_scalar_list(&json!("solo")), vec!["solo".to_string()]);
    }

    #[test]
    fn link_tuple_widens_to_object() {
        let links = clean_links(&json!(["db", "database"])).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].container, "db");
        assert_eq!(links[0].effective_alias(), "database");
    }

    #[test]
    fn link_without_alias_defaults_to_stripped_container_name() {
        let links = clean_links(&json!("m.db")).unwrap();
        assert_eq!(links[0].effective_alias(), "db");
    }

    #[test]
    fn host_entry_dict_is_instance_indexed() {
        let entry = clean_host_entry(&json!({"i1": "cfg/a", "i2": "cfg/b"})).unwrap();
        match entry {
            HostVolumeEntry::PerInstance(map) => {
                assert_eq!(map.get("i1").unwrap().resolve(), "cfg/a");
                assert_eq!(map.get("i2").unwrap().resolve(), "cfg/b");
            }
            HostVolumeEntry::Single(_) => panic!("expected per-instance entry"),
        }
    }
}
