//! Volume and host-volume configuration records (spec §3).

use std::collections::HashMap;

use serde_json::Map as JsonMap;

use crate::model::value::Value;

/// A named volume configuration (the `volumes` map-level section).
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    pub default_path: Option<String>,
    pub driver: String,
    pub driver_options: JsonMap<String, serde_json::Value>,
    pub create_options: JsonMap<String, serde_json::Value>,
    pub user: Option<String>,
    pub permissions: Option<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            default_path: None,
            driver: "local".to_string(),
            driver_options: JsonMap::new(),
            create_options: JsonMap::new(),
            user: None,
            permissions: None,
        }
    }
}

/// A `host` entry: either one path shared by every instance, or a mapping
/// from instance label to path (spec §3 "Host-volume entry").
#[derive(Debug, Clone)]
pub enum HostVolumeEntry {
    Single(Value<String>),
    PerInstance(HashMap<String, Value<String>>),
}

impl HostVolumeEntry {
    /// Resolve the path declared for the given instance label (`None` for
    /// the default/only instance).
    pub fn path_for(&self, instance: Option<&str>) -> Option<String> {
        match self {
            Self::Single(value) => Some(value.resolve()),
            Self::PerInstance(map) => {
                let key = instance?;
                map.get(key).map(Value::resolve)
            }
        }
    }
}

/// The `host` section: a declared root prefix plus a set of aliased
/// entries.
#[derive(Debug, Clone, Default)]
pub struct HostVolumes {
    pub root: Option<Value<String>>,
    pub entries: HashMap<String, HostVolumeEntry>,
}

impl HostVolumes {
    /// Resolve an alias's path for the given instance, applying
    /// `host.root` when the resolved path is not already absolute.
    pub fn resolve(&self, alias: &str, instance: Option<&str>) -> Option<String> {
        let raw = self.entries.get(alias)?.path_for(instance)?;
        Some(self.apply_root(&raw))
    }

    /// Prefix a relative path with `host.root`; absolute paths pass
    /// through verbatim (spec §8 boundary behavior).
    pub fn apply_root(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            match &self.root {
                Some(root) => {
                    let root = root.resolve();
                    format!("{}/{}", root.trim_end_matches('/'), path)
                }
                None => path.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_root_passes_absolute_paths_through() {
        let host = HostVolumes {
            root: Some(Value::constant("/srv".to_string())),
            entries: HashMap::new(),
        };
        assert_eq!(host.apply_root("/already/absolute"), "/already/absolute");
    }

    #[test]
    fn apply_root_prefixes_relative_paths_and_trims_trailing_slash() {
        let host = HostVolumes {
            root: Some(Value::constant("/srv/".to_string())),
            entries: HashMap::new(),
        };
        assert_eq!(host.apply_root("cfg/a"), "/srv/cfg/a");
    }

    #[test]
    fn apply_root_with_no_declared_root_leaves_relative_path_untouched() {
        let host = HostVolumes::default();
        assert_eq!(host.apply_root("cfg/a"), "cfg/a");
    }

    #[test]
    fn resolve_single_entry_ignores_instance_label() {
        let mut entries = HashMap::new();
        entries.insert(
            "cfg".to_string(),
            HostVolumeEntry::Single(Value::constant("cfg".to_string())),
        );
        let host = HostVolumes { root: Some(Value::constant("/srv".to_string())), entries };
        assert_eq!(host.resolve("cfg", Some("i1")), Some("/srv/cfg".to_string()));
        assert_eq!(host.resolve("cfg", None), Some("/srv/cfg".to_string()));
    }

    #[test]
    fn resolve_per_instance_entry_requires_matching_label() {
        let mut per_instance = HashMap::new();
        per_instance.insert("i1".to_string(), Value::constant("cfg/a".to_string()));
        let mut entries = HashMap::new();
        entries.insert("cfg".to_string(), HostVolumeEntry::PerInstance(per_instance));
        let host = HostVolumes { root: Some(Value::constant("/srv".to_string())), entries };

        assert_eq!(host.resolve("cfg", Some("i1")), Some("/srv/cfg/a".to_string()));
        assert_eq!(host.resolve("cfg", Some("i2")), None);
        assert_eq!(host.resolve("cfg", None), None);
    }
}
