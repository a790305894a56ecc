//! Client registry (spec §4.6, §6, component C7).
//!
//! Resolves symbolic client names (as used in `ContainerConfig.clients`/
//! `ContainerMap.clients`) to live Docker connections plus their
//! per-client settings. Consulted by the [`crate::runner::Runner`] and by
//! the Name resolver (for client-scoped hostnames and interface
//! substitutions, spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use crate::docker::backend::DockerBackend;
use crate::error::{LandscapeError, LandscapeResult};
use crate::model::client::ClientSettings;

const DEFAULT_CLIENT: &str = "default";

/// One registered client: its backend connection and its settings.
pub struct ClientEntry {
    pub backend: Arc<dyn DockerBackend>,
    pub settings: ClientSettings,
}

/// A named set of Docker connections a [`ContainerMap`](crate::model::map::ContainerMap)
/// can address by name.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientEntry>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn DockerBackend>, settings: ClientSettings) {
        self.clients.insert(name.into(), ClientEntry { backend, settings });
    }

    /// Look up a client's backend, falling back to `"default"` when the
    /// requested name is absent and is itself `"default"` (a registry
    /// with exactly one client may leave it unnamed by convention).
    pub fn backend(&self, name: &str) -> LandscapeResult<&Arc<dyn DockerBackend>> {
        self.clients
            .get(name)
            .map(|entry| &entry.backend)
            .ok_or_else(|| LandscapeError::configuration(format!("no registered client named '{name}'")))
    }

    pub fn settings(&self, name: &str) -> LandscapeResult<&ClientSettings> {
        self.clients
            .get(name)
            .map(|entry| &entry.settings)
            .ok_or_else(|| LandscapeError::configuration(format!("no registered client named '{name}'")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn is_default_only(&self) -> bool {
        self.clients.len() == 1 && self.clients.contains_key(DEFAULT_CLIENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeDockerBackend;

    #[test]
    fn unregistered_client_is_a_configuration_error() {
        let registry = ClientRegistry::new();
        let err = registry.backend("default").unwrap_err();
        assert!(matches!(err, LandscapeError::Configuration { .. }));
    }

    #[test]
    fn registered_client_round_trips() {
        let mut registry = ClientRegistry::new();
        registry.register("default", Arc::new(FakeDockerBackend::new()), ClientSettings::default());
        assert!(registry.contains("default"));
        assert!(registry.is_default_only());
    }
}
