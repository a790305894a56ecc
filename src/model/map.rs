//! The container map: the root of the configuration model (spec §3
//! "Container map").

use indexmap::IndexMap;

use crate::model::client::ClientSettings;
use crate::model::container::ContainerConfig;
use crate::model::network::NetworkConfig;
use crate::model::volume::{HostVolumes, VolumeConfig};

/// The built-in group expanding to every non-abstract container
/// configuration on a map.
pub const ALL_GROUP: &str = "__all__";

/// A named bundle of container, volume, network, host-share, and client
/// definitions (spec §3 "Container map").
#[derive(Debug, Clone)]
pub struct ContainerMap {
    pub name: String,
    pub repository: Option<String>,
    pub default_tag: String,
    pub default_domain: Option<String>,
    pub set_hostname: bool,
    pub use_attached_parent_name: bool,
    pub clients: Vec<String>,
    pub containers: IndexMap<String, ContainerConfig>,
    pub volumes: IndexMap<String, VolumeConfig>,
    pub host: HostVolumes,
    pub networks: IndexMap<String, NetworkConfig>,
    pub groups: IndexMap<String, Vec<String>>,
    pub client_settings: IndexMap<String, ClientSettings>,
}

impl ContainerMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: None,
            default_tag: "latest".to_string(),
            default_domain: None,
            set_hostname: false,
            use_attached_parent_name: false,
            clients: Vec::new(),
            containers: IndexMap::new(),
            volumes: IndexMap::new(),
            host: HostVolumes::default(),
            networks: IndexMap::new(),
            groups: IndexMap::new(),
            client_settings: IndexMap::new(),
        }
    }

    /// The effective clients for a configuration: its own `clients`
    /// override, unioned with the map's `clients`, defaulting to a single
    /// implicit default client when both are empty.
    pub fn effective_clients<'a>(&'a self, config: &'a ContainerConfig) -> Vec<&'a str> {
        let source: &[String] = if config.clients.is_empty() {
            &self.clients
        } else {
            &config.clients
        };
        if source.is_empty() {
            vec!["default"]
        } else {
            source.iter().map(String::as_str).collect()
        }
    }

    /// Expand a group name (`__all__` or user-defined) into its declared
    /// member list. `__all__` expands to every non-abstract configuration
    /// in map declaration order.
    pub fn expand_group(&self, name: &str) -> Vec<String> {
        if name == ALL_GROUP {
            self.containers
                .iter()
                .filter(|(_, cfg)| !cfg.is_abstract)
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            self.groups.get(name).cloned().unwrap_or_default()
        }
    }

    /// Every alias a `binds`/`uses`/`attaches` entry may legally
    /// reference: `host` and `volumes` aliases together (used by the
    /// integrity check).
    pub fn known_volume_aliases(&self) -> impl Iterator<Item = &str> {
        self.volumes
            .keys()
            .map(String::as_str)
            .chain(self.host.entries.keys().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_clients_falls_back_to_implicit_default() {
        let map = ContainerMap::new("m");
        let config = ContainerConfig::default();
        assert_eq!(map.effective_clients(&config), vec!["default"]);
    }

    #[test]
    fn effective_clients_prefers_config_over_map() {
        let mut map = ContainerMap::new("m");
        map.clients = vec!["west".to_string()];
        let config = ContainerConfig {
            clients: vec!["east".to_string(), "south".to_string()],
            ..Default::default()
        };
        assert_eq!(map.effective_clients(&config), vec!["east", "south"]);
    }

    #[test]
    fn effective_clients_falls_back_to_map_default_when_config_unset() {
        let mut map = ContainerMap::new("m");
        map.clients = vec!["west".to_string()];
        let config = ContainerConfig::default();
        assert_eq!(map.effective_clients(&config), vec!["west"]);
    }

    #[test]
    fn expand_group_all_excludes_abstract_configs_in_declaration_order() {
        let mut map = ContainerMap::new("m");
        map.containers.insert("a".to_string(), ContainerConfig::default());
        map.containers.insert(
            "base".to_string(),
            ContainerConfig { is_abstract: true, ..Default::default() },
        );
        map.containers.insert("b".to_string(), ContainerConfig::default());

        assert_eq!(map.expand_group(ALL_GROUP), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn expand_group_unknown_name_is_empty() {
        let map = ContainerMap::new("m");
        assert!(map.expand_group("nonexistent").is_empty());
    }
}
