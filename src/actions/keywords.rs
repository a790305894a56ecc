//! Keyword-bundle assembly (spec §4.5 "Keyword assembly").
//!
//! Builds the `create`/`host-config` argument bundle the Runner hands to
//! the Docker backend, honoring the documented precedence: explicit
//! caller keywords, then `create_options`/`host_config` from the
//! configuration, then fields derived from the structured configuration.
//! Scalars in a higher-priority source win; dict keys merge key-wise.

use serde_json::{Map as JsonMap, Value as Json};

use crate::docker::backend::CreateContainerSpec;
use crate::model::container::{BindSpec, ContainerConfig};
use crate::model::map::ContainerMap;
use crate::model::value::Value;
use crate::names;

/// Explicit keyword overrides a caller passed to a top-level action
/// (highest precedence tier).
#[derive(Debug, Clone, Default)]
pub struct ExplicitOverrides {
    pub env: Vec<String>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
}

/// Assemble the full `create` bundle for one container instance.
pub fn assemble_create_spec(
    map: &ContainerMap,
    config_name: &str,
    instance: Option<&str>,
    effective: &ContainerConfig,
    volumes_from: Vec<String>,
    overrides: &ExplicitOverrides,
) -> CreateContainerSpec {
    let name = names::container_name(&map.name, config_name, instance);
    let image = names::resolve_image_for_map(map, config_name, effective.image.as_deref());

    let hostname = map.set_hostname.then(|| {
        let client = map.effective_clients(effective).first().copied();
        names::hostname_for(client, &name)
    });

    let mut binds = Vec::new();
    for bind in &effective.binds {
        match bind {
            BindSpec::Direct {
                container_path,
                host_path,
                readonly,
            } => {
                let resolved = map.host.apply_root(&host_path.resolve());
                binds.push((container_path.clone(), resolved, *readonly));
            }
            BindSpec::Alias {
                alias,
                container_path,
                readonly,
            } => {
                if let Some(resolved) = map.host.resolve(alias, instance) {
                    let container_path = container_path
                        .clone()
                        .or_else(|| map.volumes.get(alias).and_then(|v| v.default_path.clone()))
                        .unwrap_or_else(|| alias.clone());
                    binds.push((container_path, resolved, *readonly));
                } else if let Some(volume) = map.volumes.get(alias) {
                    let container_path = container_path
                        .clone()
                        .or_else(|| volume.default_path.clone())
                        .unwrap_or_else(|| alias.clone());
                    binds.push((container_path, alias.clone(), *readonly));
                }
            }
        }
    }

    let exposed_ports = effective.exposes.iter().map(|p| p.container_port).collect();

    let mut create_options = JsonMap::new();
    if let Some(options) = &effective.create_options {
        if let crate::model::value::Value::Constant(options) = options {
            create_options = options.clone();
        }
    }
    let mut host_config = JsonMap::new();
    if let Some(hc) = &effective.host_config {
        if let crate::model::value::Value::Constant(hc) = hc {
            host_config = hc.clone();
        }
    }

    let user = effective.user.as_ref().map(Value::resolve);

    let cmd = overrides.cmd.clone().unwrap_or_default();
    let entrypoint = overrides.entrypoint.clone().unwrap_or_default();
    let mut env = effective_env(&create_options);
    env.extend(overrides.env.clone());

    CreateContainerSpec {
        name,
        image,
        hostname,
        user,
        env,
        cmd,
        entrypoint,
        exposed_ports,
        binds,
        volumes_from,
        host_config,
        create_options,
    }
}

fn effective_env(create_options: &JsonMap<String, Json>) -> Vec<String> {
    create_options
        .get("Env")
        .and_then(Json::as_array)
        .map(|values| values.iter().filter_map(Json::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::container::ContainerConfig;
    use crate::model::volume::{HostVolumeEntry, VolumeConfig};

    #[test]
    fn bind_alias_resolves_through_host_entry_when_declared() {
        let mut map = ContainerMap::new("m");
        map.host.root = Some(Value::constant("/srv".to_string()));
        map.host.entries.insert(
            "cfg".to_string(),
            HostVolumeEntry::Single(Value::constant("cfg".to_string())),
        );
        let effective = ContainerConfig {
            image: Some("app".to_string()),
            binds: vec![BindSpec::Alias {
                alias: "cfg".to_string(),
                container_path: Some("/cfg".to_string()),
                readonly: false,
            }],
            ..Default::default()
        };

        let spec = assemble_create_spec(&map, "app", None, &effective, Vec::new(), &ExplicitOverrides::default());

        assert_eq!(spec.binds, vec![("/cfg".to_string(), "/srv/cfg".to_string(), false)]);
    }

    #[test]
    fn bind_alias_falls_back_to_named_volume_when_no_host_entry() {
        let mut map = ContainerMap::new("m");
        map.volumes.insert(
            "data".to_string(),
            VolumeConfig {
                default_path: Some("/var/lib/data".to_string()),
                ..Default::default()
            },
        );
        let effective = ContainerConfig {
            image: Some("app".to_string()),
            binds: vec![BindSpec::Alias {
                alias: "data".to_string(),
                container_path: None,
                readonly: true,
            }],
            ..Default::default()
        };

        let spec = assemble_create_spec(&map, "app", None, &effective, Vec::new(), &ExplicitOverrides::default());

        assert_eq!(
            spec.binds,
            vec![("/var/lib/data".to_string(), "data".to_string(), true)]
        );
    }

    #[test]
    fn env_merges_create_options_then_explicit_overrides() {
        let map = ContainerMap::new("m");
        let mut create_options = JsonMap::new();
        create_options.insert(
            "Env".to_string(),
            Json::Array(vec![Json::String("FROM_CONFIG=1".to_string())]),
        );
        let effective = ContainerConfig {
            image: Some("app".to_string()),
            create_options: Some(Value::constant(create_options)),
            ..Default::default()
        };
        let overrides = ExplicitOverrides {
            env: vec!["FROM_CALLER=2".to_string()],
            ..Default::default()
        };

        let spec = assemble_create_spec(&map, "app", None, &effective, Vec::new(), &overrides);

        assert_eq!(spec.env, vec!["FROM_CONFIG=1".to_string(), "FROM_CALLER=2".to_string()]);
    }

    #[test]
    fn hostname_only_set_when_map_requests_it() {
        let map = ContainerMap::new("m");
        let effective = ContainerConfig {
            image: Some("app".to_string()),
            ..Default::default()
        };

        let spec = assemble_create_spec(&map, "app", None, &effective, Vec::new(), &ExplicitOverrides::default());
        assert_eq!(spec.hostname, None);

        let mut with_hostname = ContainerMap::new("m");
        with_hostname.set_hostname = true;
        let spec = assemble_create_spec(&with_hostname, "app", None, &effective, Vec::new(), &ExplicitOverrides::default());
        assert_eq!(spec.hostname, Some("default-m-app".to_string()));
    }
}
