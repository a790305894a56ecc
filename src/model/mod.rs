//! The configuration model (spec §3, §C1 "Input model & inheritance
//! merge").
//!
//! A [`map::ContainerMap`] is built once, at load time, from a
//! `serde_json::Value` object tree (spec §6 "Configuration input"); the
//! [`clean`] step normalizes loose surface shapes into the canonical
//! record types in [`container`], [`volume`], [`network`], and
//! [`client`]; [`merge::expand`] resolves `extends` inheritance; and
//! [`merge::integrity_check`] validates every cross-reference before the
//! map is handed to the dependency resolver.

pub mod clean;
pub mod client;
pub mod container;
pub mod map;
pub mod merge;
pub mod network;
pub mod value;
pub mod volume;

pub use client::{ClientCapabilities, ClientSettings, RegistryAuthEntry};
pub use container::{
    AttachSpec, BindSpec, CommandSpec, ContainerConfig, EndpointSpec, ExecPolicy, ExecSpec,
    HealthCheckSpec, LinkSpec, NetworkMode, PortSpec, UseSpec, UseTarget,
};
pub use map::{ContainerMap, ALL_GROUP};
pub use merge::{expand, integrity_check};
pub use network::NetworkConfig;
pub use value::Value;
pub use volume::{HostVolumeEntry, HostVolumes, VolumeConfig};

use serde_json::Value as Json;

use crate::error::{LandscapeError, LandscapeResult};

/// The closed top-level key set (spec §6 "Configuration input"). Any key
/// not in this set is treated as a container name, and its value as a
/// `ContainerConfig`.
const RESERVED_TOP_LEVEL_KEYS: &[&str] = &[
    "name",
    "repository",
    "default_tag",
    "default_domain",
    "host_root",
    "set_hostname",
    "use_attached_parent_name",
    "containers",
    "volumes",
    "host",
    "networks",
    "groups",
    "clients",
];

impl ContainerMap {
    /// Parse a map description from a `serde_json::Value` object tree
    /// (spec §6). `explicit_name` (caller-supplied), then the document's
    /// own `name` key, decide the map's name, in that priority order —
    /// the "source base name" tier in spec §6's priority list applies
    /// only to named external sources (files/URLs), which are a surface
    /// concern outside this crate's scope.
    pub fn from_value(explicit_name: Option<&str>, value: &Json) -> LandscapeResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| LandscapeError::configuration("map document must be an object"))?;

        let name = explicit_name
            .map(str::to_string)
            .or_else(|| obj.get("name").and_then(Json::as_str).map(str::to_string))
            .ok_or_else(|| LandscapeError::configuration("map has no name"))?;

        let mut map = ContainerMap::new(name);
        map.repository = obj.get("repository").and_then(Json::as_str).map(str::to_string);
        map.default_tag = obj
            .get("default_tag")
            .and_then(Json::as_str)
            .unwrap_or("latest")
            .to_string();
        map.default_domain = obj
            .get("default_domain")
            .and_then(Json::as_str)
            .map(str::to_string);
        map.set_hostname = obj.get("set_hostname").and_then(Json::as_bool).unwrap_or(false);
        map.use_attached_parent_name = obj
            .get("use_attached_parent_name")
            .and_then(Json::as_bool)
            .unwrap_or(false);
        map.clients = obj.get("clients").map(clean::clean_scalar_list).unwrap_or_default();

        if let Some(host_root) = obj.get("host_root").and_then(Json::as_str) {
            map.host.root = Some(Value::constant(host_root.to_string()));
        }

        if let Some(Json::Object(host)) = obj.get("host") {
            for (alias, value) in host {
                if alias == "root" {
                    if let Some(root) = value.as_str() {
                        map.host.root = Some(Value::constant(root.to_string()));
                    }
                    continue;
                }
                map.host.entries.insert(alias.clone(), clean::clean_host_entry(value)?);
            }
        }

        if let Some(Json::Object(volumes)) = obj.get("volumes") {
            for (alias, value) in volumes {
                map.volumes.insert(alias.clone(), volume_config_from_value(value)?);
            }
        }

        if let Some(Json::Object(networks)) = obj.get("networks") {
            for (name, value) in networks {
                map.networks.insert(name.clone(), network_config_from_value(value)?);
            }
        }

        if let Some(Json::Object(groups)) = obj.get("groups") {
            for (name, value) in groups {
                map.groups.insert(name.clone(), clean::clean_scalar_list(value));
            }
        }

        if let Some(Json::Object(containers)) = obj.get("containers") {
            for (name, value) in containers {
                map.containers
                    .insert(name.clone(), container_config_from_value(value)?);
            }
        }

        // Any key outside the closed set is itself a container name
        // (spec §6): "Any key not in that closed set is treated as a
        // container name and its value as a ContainerConfig."
        for (key, value) in obj {
            if RESERVED_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                continue;
            }
            map.containers
                .insert(key.clone(), container_config_from_value(value)?);
        }

        merge::integrity_check(&map)?;

        Ok(map)
    }
}

fn volume_config_from_value(value: &Json) -> LandscapeResult<VolumeConfig> {
    let obj = value
        .as_object()
        .ok_or_else(|| LandscapeError::configuration("volume config must be an object"))?;
    Ok(VolumeConfig {
        default_path: obj.get("default_path").and_then(Json::as_str).map(str::to_string),
        driver: obj
            .get("driver")
            .and_then(Json::as_str)
            .unwrap_or("local")
            .to_string(),
        driver_options: obj
            .get("driver_options")
            .and_then(Json::as_object)
            .cloned()
            .unwrap_or_default(),
        create_options: obj
            .get("create_options")
            .and_then(Json::as_object)
            .cloned()
            .unwrap_or_default(),
        user: obj.get("user").and_then(Json::as_str).map(str::to_string),
        permissions: obj.get("permissions").and_then(Json::as_str).map(str::to_string),
    })
}

fn network_config_from_value(value: &Json) -> LandscapeResult<NetworkConfig> {
    let obj = value
        .as_object()
        .ok_or_else(|| LandscapeError::configuration("network config must be an object"))?;
    Ok(NetworkConfig {
        driver: obj
            .get("driver")
            .and_then(Json::as_str)
            .unwrap_or("bridge")
            .to_string(),
        driver_options: obj
            .get("driver_options")
            .and_then(Json::as_object)
            .cloned()
            .unwrap_or_default(),
        internal: obj.get("internal").and_then(Json::as_bool).unwrap_or(false),
        create_options: obj
            .get("create_options")
            .and_then(Json::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

fn container_config_from_value(value: &Json) -> LandscapeResult<ContainerConfig> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        // A bare string/array value for a container key is itself an
        // `image` shorthand.
        None => {
            let mut cfg = ContainerConfig::default();
            cfg.image = value.as_str().map(str::to_string);
            return Ok(cfg);
        }
    };

    let mut cfg = ContainerConfig {
        is_abstract: obj.get("abstract").and_then(Json::as_bool).unwrap_or(false),
        extends: obj.get("extends").map(clean::clean_scalar_list).unwrap_or_default(),
        image: obj.get("image").and_then(Json::as_str).map(str::to_string),
        instances: obj.get("instances").map(clean::clean_scalar_list).unwrap_or_default(),
        clients: obj.get("clients").map(clean::clean_scalar_list).unwrap_or_default(),
        shares: obj.get("shares").map(clean::clean_scalar_list).unwrap_or_default(),
        persistent: obj.get("persistent").and_then(Json::as_bool).unwrap_or(false),
        stop_signal: obj.get("stop_signal").and_then(Json::as_str).map(str::to_string),
        permissions: obj.get("permissions").and_then(Json::as_str).map(str::to_string),
        user: obj
            .get("user")
            .and_then(Json::as_str)
            .map(|s| Value::constant(s.to_string())),
        stop_timeout: obj
            .get("stop_timeout")
            .and_then(Json::as_u64)
            .map(std::time::Duration::from_secs),
        ..Default::default()
    };

    if let Some(binds) = obj.get("binds") {
        cfg.binds = clean::clean_binds(binds)?;
    }
    if let Some(uses) = obj.get("uses") {
        cfg.uses = clean::clean_uses(uses)?;
    }
    if let Some(attaches) = obj.get("attaches") {
        cfg.attaches = clean::clean_attaches(attaches)?;
    }
    if let Some(links) = obj.get("links") {
        cfg.links = clean::clean_links(links)?;
    }
    if let Some(exposes) = obj.get("exposes") {
        cfg.exposes = clean::clean_exposes(exposes)?;
    }
    if let Some(networks) = obj.get("networks") {
        cfg.networks = clean::clean_endpoints(networks)?;
    }
    if let Some(exec_commands) = obj.get("exec_commands") {
        cfg.exec_commands = clean::clean_exec_commands(exec_commands)?;
    }
    if let Some(mode) = obj.get("network_mode").and_then(Json::as_str) {
        cfg.network_mode = NetworkMode::parse(mode, &|_| true);
    }
    if let Some(create_options) = obj.get("create_options").and_then(Json::as_object) {
        cfg.create_options = Some(Value::constant(create_options.clone()));
    }
    if let Some(host_config) = obj.get("host_config").and_then(Json::as_object) {
        cfg.host_config = Some(Value::constant(host_config.clone()));
    }

    // Reclassify `uses` targets that actually name one of this
    // configuration's own `attaches` aliases (spec §3 `UseSpec.target`
    // resolution: container-name | attached-alias).
    for use_spec in &mut cfg.uses {
        if let UseTarget::Container(name) = &use_spec.target {
            if cfg.attaches.iter().any(|a| &a.alias == name) {
                use_spec.target = UseTarget::Attached(name.clone());
            }
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_map_parses() {
        let value = json!({
            "name": "m",
            "containers": {"a": {"image": "ubuntu"}}
        });
        let map = ContainerMap::from_value(None, &value).unwrap();
        assert_eq!(map.name, "m");
        assert_eq!(map.containers.len(), 1);
        assert_eq!(map.containers["a"].image.as_deref(), Some("ubuntu"));
    }

    #[test]
    fn bare_container_keys_outside_reserved_set_are_containers() {
        let value = json!({
            "name": "m",
            "web": {"image": "nginx"}
        });
        let map = ContainerMap::from_value(None, &value).unwrap();
        assert!(map.containers.contains_key("web"));
    }

    #[test]
    fn explicit_name_overrides_document_name() {
        let value = json!({"name": "doc-name", "containers": {}});
        let map = ContainerMap::from_value(Some("explicit"), &value).unwrap();
        assert_eq!(map.name, "explicit");
    }

    #[test]
    fn uses_reclassifies_to_attached_alias() {
        let value = json!({
            "name": "m",
            "containers": {
                "app": {
                    "image": "app",
                    "attaches": ["sock"],
                    "uses": ["sock"]
                }
            }
        });
        let map = ContainerMap::from_value(None, &value).unwrap();
        let app = &map.containers["app"];
        assert!(matches!(app.uses[0].target, UseTarget::Attached(ref a) if a == "sock"));
    }
}
