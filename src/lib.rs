//! # docker-landscape
//!
//! Declarative container-landscape orchestration over one or more Docker
//! daemons: load a map description, merge `extends` inheritance, resolve
//! a dependency graph across containers, attached volumes, and networks,
//! compare the graph against what's actually running, and emit the
//! ordered low-level Docker operations that close the gap.
//!
//! ## Architecture
//!
//! - [`model`] — the configuration model: `ContainerMap`/`ContainerConfig`
//!   parsed from a `serde_json::Value` tree, `extends` inheritance merge,
//!   and post-merge integrity checking.
//! - [`names`] — deterministic name derivation (container, attached-volume,
//!   hostname) shared by every other layer.
//! - [`graph`] — the dependency resolver: builds the DAG over containers,
//!   attached volumes, and networks, and produces forward/reverse
//!   topological orders.
//! - [`state`] — the state generator family: turns a traversal plus a live
//!   Docker snapshot into a `NodeState` per node.
//! - [`actions`] — the action generator family: maps `(intent, NodeState)`
//!   to an ordered list of low-level [`docker::DockerBackend`] operations,
//!   plus the `run_script` one-shot intent.
//! - [`runner`] — executes an emitted op list against one client,
//!   recording per-op outcomes and wrapping failures with partial results.
//! - [`registry`] — resolves symbolic client names to live Docker
//!   connections and their settings.
//! - [`docker`] — the Docker capability layer: the [`docker::DockerBackend`]
//!   trait, a CLI-backed [`docker::LiveBackend`], and an in-memory
//!   [`docker::FakeDockerBackend`] test double.
//! - [`error`] — the engine's error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod actions;
pub mod docker;
pub mod error;
pub mod graph;
pub mod model;
pub mod names;
pub mod registry;
pub mod runner;
pub mod state;

pub use docker::{ContainerInspect, CreateContainerSpec, DockerBackend, FakeDockerBackend, LiveBackend};
pub use error::{LandscapeError, LandscapeResult};
pub use graph::{DependencyGraph, NodeId};
pub use model::{ContainerMap, ALL_GROUP};
pub use registry::ClientRegistry;
pub use runner::{OpOutcome, Runner};
pub use state::{NodeKind, NodeState, PlanContext, UpdateOptions};

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The minimum supported Docker version (spec §6 "Docker client
/// contract").
pub const MIN_DOCKER_VERSION: &str = "20.10.0";

/// Default per-client RPC timeout, used when a `ClientSettings` leaves
/// `timeout` unset.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Default `stop` signal wait before the daemon escalates to `SIGKILL`
/// (spec §4.5 "stop").
pub const DEFAULT_STOP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_info_is_populated() {
        assert!(!VERSION.is_empty());
        assert!(!MIN_DOCKER_VERSION.is_empty());
    }

    #[test]
    fn timeout_constants_are_positive() {
        assert!(DEFAULT_TIMEOUT > std::time::Duration::from_secs(0));
        assert!(DEFAULT_STOP_TIMEOUT > std::time::Duration::from_secs(0));
    }
}
