//! The Docker client capability layer.
//!
//! This is the "opaque capability" the rest of the crate treats the daemon
//! as providing: container/volume/network/image CRUD, inspect, logs, wait,
//! stop-with-signal-and-timeout. The orchestration layers (`crate::model`,
//! `crate::graph`, `crate::state`, `crate::actions`, `crate::runner`) never
//! talk to `tokio::process` directly; they go through the
//! [`backend::DockerBackend`] trait, implemented by [`backend::LiveBackend`]
//! (via [`client::DockerClient`]) or [`fake::FakeDockerBackend`] in tests.
//!
//! Backed by the `docker` CLI binary via async subprocess execution
//! (`executor`) rather than the HTTP API or a UNIX socket client — the
//! same approach as a thin CLI wrapper.

pub mod backend;
pub mod client;
pub mod errors;
pub mod executor;
pub mod fake;
pub mod types;

pub use backend::{
    ContainerInspect, CreateContainerSpec, DockerBackend, ExecOutcome, ExecRequest, LiveBackend,
};
pub use client::{ClientConfig as BackendClientConfig, DockerClient, DockerInfo, DockerVersion};
pub use errors::{DockerError, DockerResult};
pub use fake::FakeDockerBackend;
pub use types::ContainerId;
