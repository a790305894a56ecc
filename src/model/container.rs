//! Container configuration records (spec §3 "Container configuration").

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use serde_json::Map as JsonMap;

use crate::model::value::Value;

/// A single host bind. The ambient "string or tuple or dict" ergonomics of
/// the surface syntax collapse into this explicit sum type during the
/// `clean` step (spec §9 Design Notes).
#[derive(Debug, Clone)]
pub enum BindSpec {
    /// References a `volumes`/`host` alias; `host_path` is resolved from
    /// that alias (plus `host.root`) at plan time.
    Alias {
        /// Alias name in `volumes` or `host`.
        alias: String,
        /// Container-side path, if distinct from the alias default path.
        container_path: Option<String>,
        /// Mount read-only.
        readonly: bool,
    },
    /// A literal container/host path pair, not resolved through any alias.
    Direct {
        /// Path inside the container.
        container_path: String,
        /// Path on the host; relative paths are resolved against
        /// `host.root` at plan time.
        host_path: Value<String>,
        /// Mount read-only.
        readonly: bool,
    },
}

impl BindSpec {
    /// The container-side path, if statically known without resolving an
    /// alias's default path.
    pub fn container_path(&self) -> Option<&str> {
        match self {
            Self::Alias { container_path, .. } => container_path.as_deref(),
            Self::Direct { container_path, .. } => Some(container_path),
        }
    }

    pub fn readonly(&self) -> bool {
        match self {
            Self::Alias { readonly, .. } | Self::Direct { readonly, .. } => *readonly,
        }
    }
}

/// The target of a `uses` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseTarget {
    /// Another container configuration in the same map.
    Container(String),
    /// An attached-volume alias owned by this configuration.
    Attached(String),
    /// An attached-volume alias owned by a named parent configuration,
    /// written `parent.alias`.
    ParentAttached {
        /// The owning configuration's name.
        parent: String,
        /// The attached alias on that configuration.
        alias: String,
    },
}

/// A `uses` entry: attach another container's volumes into this one via
/// `volumes_from`, or mount a specific path from it.
#[derive(Debug, Clone)]
pub struct UseSpec {
    pub target: UseTarget,
    pub container_path: Option<String>,
}

/// An `attaches` entry: this configuration owns and materializes a shared
/// volume under `alias`.
#[derive(Debug, Clone)]
pub struct AttachSpec {
    pub alias: String,
    pub default_path: Option<String>,
}

/// A `links` entry.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub container: String,
    pub alias: Option<String>,
}

impl LinkSpec {
    /// Effective link alias: the declared alias, or the container name
    /// with any map prefix stripped.
    pub fn effective_alias(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self
                .container
                .rsplit_once('.')
                .map_or(self.container.as_str(), |(_, tail)| tail),
        }
    }
}

/// An `exposes` entry.
#[derive(Debug, Clone)]
pub struct PortSpec {
    pub container_port: u16,
    pub host_port: Option<Value<u16>>,
    pub interface_alias: Option<String>,
    pub ipv6: bool,
}

/// A `networks` entry (an endpoint attachment on a user-defined network).
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub network: String,
    pub aliases: Vec<String>,
    pub links: Vec<String>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub link_local_ips: Vec<std::net::IpAddr>,
}

impl EndpointSpec {
    fn merge_key(&self) -> &str {
        &self.network
    }
}

/// `network_mode` (spec §3 and §4.3 "network_mode=<config>" relation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    Bridge,
    Host,
    Disabled,
    /// `container:<id>` or a bare `/<id>` escape hatch.
    Container(String),
    /// `<config-name>[.<instance>]`.
    Config {
        name: String,
        instance: Option<String>,
    },
}

impl NetworkMode {
    /// Parse the surface-syntax string form (spec §3).
    pub fn parse(raw: &str, known_configs: &dyn Fn(&str) -> bool) -> Option<Self> {
        match raw {
            "bridge" => Some(Self::Bridge),
            "host" => Some(Self::Host),
            "none" | "disabled" => Some(Self::Disabled),
            _ => {
                if let Some(id) = raw.strip_prefix("container:") {
                    Some(Self::Container(id.to_string()))
                } else if let Some(id) = raw.strip_prefix('/') {
                    Some(Self::Container(id.to_string()))
                } else if known_configs(raw.split('.').next().unwrap_or(raw)) {
                    let mut parts = raw.splitn(2, '.');
                    let name = parts.next().unwrap_or(raw).to_string();
                    let instance = parts.next().map(str::to_string);
                    Some(Self::Config { name, instance })
                } else {
                    None
                }
            }
        }
    }
}

/// Restart policy for an `exec_commands` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecPolicy {
    /// Re-run on every `start` after the initial creation.
    Restart,
    /// Run only once, at container creation.
    Initial,
}

/// A command given as a single string or an argv vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Scalar(String),
    List(Vec<String>),
}

impl CommandSpec {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            Self::Scalar(s) => vec!["/bin/sh".to_string(), "-c".to_string(), s.clone()],
            Self::List(v) => v.clone(),
        }
    }
}

/// An `exec_commands` entry.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub command: Value<CommandSpec>,
    pub user: Option<Value<String>>,
    pub policy: ExecPolicy,
}

impl ExecSpec {
    /// Merge key: command text (resolved once, eagerly, only for keying —
    /// values produced by `Lazy` producers are keyed by their source
    /// identity via the index position instead, since resolving a `Lazy`
    /// value at merge time would violate spec §4.1's "never at load time"
    /// rule). For `Constant`/`LazyOnce` values the literal command and
    /// user are used.
    pub fn merge_key(&self, index: usize) -> (String, String) {
        match (&self.command, &self.user) {
            (Value::Constant(c), user) => (
                format!("{:?}", c.as_vec()),
                user.as_ref().map_or(String::new(), |u| match u {
                    Value::Constant(s) => s.clone(),
                    _ => format!("<lazy#{index}>"),
                }),
            ),
            _ => (format!("<lazy#{index}>"), String::new()),
        }
    }
}

/// Healthcheck configuration.
#[derive(Debug, Clone, Default)]
pub struct HealthCheckSpec {
    pub test: Vec<String>,
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub start_period: Option<Duration>,
}

/// A single container configuration (spec §3).
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// If true, only instantiable via `extends`, never directly.
    pub is_abstract: bool,
    pub extends: Vec<String>,
    pub image: Option<String>,
    pub instances: Vec<String>,
    pub clients: Vec<String>,
    pub shares: Vec<String>,
    pub binds: Vec<BindSpec>,
    pub uses: Vec<UseSpec>,
    pub attaches: Vec<AttachSpec>,
    pub links: Vec<LinkSpec>,
    pub exposes: Vec<PortSpec>,
    pub networks: Vec<EndpointSpec>,
    pub network_mode: Option<NetworkMode>,
    pub exec_commands: Vec<ExecSpec>,
    pub healthcheck: Option<HealthCheckSpec>,
    pub user: Option<Value<String>>,
    pub permissions: Option<String>,
    pub stop_timeout: Option<Duration>,
    pub stop_signal: Option<String>,
    pub persistent: bool,
    pub create_options: Option<Value<JsonMap<String, serde_json::Value>>>,
    pub host_config: Option<Value<JsonMap<String, serde_json::Value>>>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            is_abstract: false,
            extends: Vec::new(),
            image: None,
            instances: Vec::new(),
            clients: Vec::new(),
            shares: Vec::new(),
            binds: Vec::new(),
            uses: Vec::new(),
            attaches: Vec::new(),
            links: Vec::new(),
            exposes: Vec::new(),
            networks: Vec::new(),
            network_mode: None,
            exec_commands: Vec::new(),
            healthcheck: None,
            user: None,
            permissions: None,
            stop_timeout: None,
            stop_signal: None,
            persistent: false,
            create_options: None,
            host_config: None,
        }
    }
}

impl ContainerConfig {
    /// Container instance names: `["".to_string()]`-equivalent single
    /// default instance when `instances` is empty (spec §8 boundary
    /// behavior).
    pub fn effective_instances(&self) -> Vec<Option<&str>> {
        if self.instances.is_empty() {
            vec![None]
        } else {
            self.instances.iter().map(|s| Some(s.as_str())).collect()
        }
    }

    /// Dedup a list of record fields by merge key, later entries override
    /// earlier ones, preserving first-seen order (spec §4.1).
    pub(crate) fn merge_networks(base: &[EndpointSpec], overlay: &[EndpointSpec]) -> Vec<EndpointSpec> {
        let mut order: Vec<String> = Vec::new();
        let mut by_key: BTreeMap<String, EndpointSpec> = BTreeMap::new();
        for item in base.iter().chain(overlay.iter()) {
            let key = item.merge_key().to_string();
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
}
