//! Client configuration records (spec §3 "Client configuration", §C7).

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::model::value::Value;

/// Registry authentication credentials for a single registry host.
#[derive(Debug, Clone)]
pub struct RegistryAuthEntry {
    pub username: String,
    pub password: Value<String>,
    pub email: Option<String>,
}

/// Capability flags probed once per client and cached (spec §4.6, §6).
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub supports_named_volumes: bool,
    pub supports_host_config_on_create: bool,
    pub supports_stop_signal_on_create: bool,
    pub supports_update_host_config: bool,
    pub api_version: Option<String>,
}

/// A named client's connection settings.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub stop_timeout: Option<Duration>,
    pub interfaces: HashMap<String, Value<Ipv4Addr>>,
    pub interfaces_ipv6: HashMap<String, Value<Ipv6Addr>>,
    pub auth_configs: HashMap<String, RegistryAuthEntry>,
    pub capabilities: ClientCapabilities,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: None,
            stop_timeout: None,
            interfaces: HashMap::new(),
            interfaces_ipv6: HashMap::new(),
            auth_configs: HashMap::new(),
            capabilities: ClientCapabilities::default(),
        }
    }
}

impl ClientSettings {
    /// The effective stop-timeout precedence described in spec §4.5:
    /// container setting > client setting > Docker's own default.
    pub fn effective_stop_timeout(&self, container_timeout: Option<Duration>) -> Duration {
        container_timeout
            .or(self.stop_timeout)
            .unwrap_or(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_timeout_wins_over_client_and_default() {
        let settings = ClientSettings {
            stop_timeout: Some(Duration::from_secs(20)),
            ..ClientSettings::default()
        };
        assert_eq!(
            settings.effective_stop_timeout(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn client_timeout_wins_over_default_when_container_unset() {
        let settings = ClientSettings {
            stop_timeout: Some(Duration::from_secs(20)),
            ..ClientSettings::default()
        };
        assert_eq!(settings.effective_stop_timeout(None), Duration::from_secs(20));
    }

    #[test]
    fn falls_back_to_docker_default_when_nothing_set() {
        let settings = ClientSettings::default();
        assert_eq!(settings.effective_stop_timeout(None), Duration::from_secs(10));
    }
}
