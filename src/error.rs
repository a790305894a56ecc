//! The orchestration-engine error taxonomy (spec §7).
//!
//! Mirrors the layered approach of [`crate::docker::errors::DockerError`]:
//! one enum, one variant per failure mode, `thiserror`-derived messages,
//! and constructor helpers for the call sites that raise them. Docker
//! client failures are carried through as a `#[source]` rather than
//! flattened, so callers can always recover the original transport error.

use thiserror::Error;

use crate::docker::errors::DockerError;
use crate::runner::OpOutcome;

/// Result type alias used throughout the orchestration layers.
pub type LandscapeResult<T> = Result<T, LandscapeError>;

/// The engine's error taxonomy.
#[derive(Debug, Error)]
pub enum LandscapeError {
    /// Load-time error: unknown alias, cycle in `extends`, or invalid
    /// field shape after the `clean` step.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the invalid configuration.
        message: String,
    },

    /// Post-merge error: a dangling reference in `uses`/`links`/`binds`/
    /// `attaches`/`network_mode`/`networks`.
    #[error("map integrity error in map '{map}': {message}")]
    MapIntegrity {
        /// The map the violation was found in.
        map: String,
        /// Details about the dangling reference.
        message: String,
    },

    /// Planning-time error: a cycle in the dependency DAG.
    #[error("circular dependency: {}", .nodes.join(" -> "))]
    CircularDependency {
        /// The node names forming the cycle, in traversal order.
        nodes: Vec<String>,
    },

    /// `run_script` intent error: a pre-existing container without
    /// `remove_existing_before`, or a wait timeout.
    #[error("script action failed: {message}")]
    ScriptAction {
        /// Details about the failure.
        message: String,
    },

    /// Execution error: wraps a Docker-client failure (or an internal
    /// invariant violation) with the client name, the op that failed, and
    /// every op that completed before it.
    #[error("action runner failed on client '{client}' during {failed_op}")]
    ActionRunner {
        /// The client the failing op was addressed to.
        client: String,
        /// A human-readable description of the op that failed.
        failed_op: String,
        /// The underlying failure.
        #[source]
        source: Box<LandscapeError>,
        /// Every op that completed successfully before the failure.
        partial_results: Vec<OpOutcome>,
    },

    /// Raised by direct utility-client calls (e.g. batch cleanup) that
    /// share the partial-results mixin without being a full planning
    /// cycle.
    #[error("{completed} of {total} operations completed before failure")]
    PartialResults {
        /// Number of ops that completed successfully.
        completed: usize,
        /// Total ops attempted.
        total: usize,
        /// The completed ops, in execution order.
        partial_results: Vec<OpOutcome>,
    },

    /// A Docker client (transport/process) failure with no partial-result
    /// context to attach (e.g. a single inspect call during state
    /// generation).
    #[error(transparent)]
    Docker(#[from] DockerError),
}

impl LandscapeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn map_integrity(map: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MapIntegrity {
            map: map.into(),
            message: message.into(),
        }
    }

    pub fn circular_dependency(nodes: Vec<String>) -> Self {
        Self::CircularDependency { nodes }
    }

    pub fn script_action(message: impl Into<String>) -> Self {
        Self::ScriptAction {
            message: message.into(),
        }
    }

    pub fn action_runner(
        client: impl Into<String>,
        failed_op: impl Into<String>,
        source: LandscapeError,
        partial_results: Vec<OpOutcome>,
    ) -> Self {
        Self::ActionRunner {
            client: client.into(),
            failed_op: failed_op.into(),
            source: Box::new(source),
            partial_results,
        }
    }

    /// Return the original, unwrapped source error, for callers that want
    /// to match on or re-raise the underlying failure rather than the
    /// `ActionRunner` wrapper (spec §7 "callers can inspect partial
    /// results and re-raise the original traceback").
    pub fn reraise(&self) -> &LandscapeError {
        match self {
            Self::ActionRunner { source, .. } => source.reraise(),
            other => other,
        }
    }

    /// The partial-results list carried by this error, if any.
    pub fn partial_results(&self) -> Option<&[OpOutcome]> {
        match self {
            Self::ActionRunner {
                partial_results, ..
            }
            | Self::PartialResults {
                partial_results, ..
            } => Some(partial_results),
            _ => None,
        }
    }

    /// Coarse-grained category, mirroring
    /// [`crate::docker::errors::DockerError::category`], used for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::MapIntegrity { .. } => "map_integrity",
            Self::CircularDependency { .. } => "circular_dependency",
            Self::ScriptAction { .. } => "script_action",
            Self::ActionRunner { .. } => "action_runner",
            Self::PartialResults { .. } => "partial_results",
            Self::Docker(_) => "docker",
        }
    }
}
