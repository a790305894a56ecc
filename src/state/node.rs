//! The `NodeState` record produced by every generator (spec §4.4).

use std::collections::HashSet;

/// What kind of dependency-graph node a [`NodeState`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Attached,
    Network,
    Volume,
}

/// Live-state classification for one node, as produced by a state
/// generator and consumed by an action generator.
///
/// The `*_match` fields are meaningful only after the [`Update`](
/// super::update) generator has populated them; the cheaper generators
/// ([`Single`](super::single), [`ForwardDependency`](super::forward),
/// [`ReverseDependency`](super::reverse)) leave them at their default
/// (`true`, i.e. "no mismatch known") since they never inspect those
/// fields.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub kind: NodeKind,
    pub present: bool,
    pub running: bool,
    pub exit_code: Option<i64>,
    pub pid: Option<u32>,
    pub image_matches: bool,
    pub links_match: bool,
    pub volumes_match: bool,
    pub env_matches: bool,
    pub cmd_matches: bool,
    pub entrypoint_matches: bool,
    pub exposes_match: bool,
    pub networks_match: bool,
    pub missing_networks: HashSet<String>,
    pub exec_present: HashSet<String>,
    pub limits_match: bool,
    pub driver_matches: bool,
    pub force_update: bool,
}

impl NodeState {
    pub fn absent(kind: NodeKind) -> Self {
        Self {
            kind,
            present: false,
            running: false,
            exit_code: None,
            pid: None,
            image_matches: true,
            links_match: true,
            volumes_match: true,
            env_matches: true,
            cmd_matches: true,
            entrypoint_matches: true,
            exposes_match: true,
            networks_match: true,
            missing_networks: HashSet::new(),
            exec_present: HashSet::new(),
            limits_match: true,
            driver_matches: true,
            force_update: false,
        }
    }

    pub fn present_not_running(kind: NodeKind) -> Self {
        Self {
            present: true,
            ..Self::absent(kind)
        }
    }

    pub fn running(kind: NodeKind, pid: Option<u32>) -> Self {
        Self {
            present: true,
            running: true,
            pid,
            ..Self::absent(kind)
        }
    }

    /// All update-relevant comparisons passed and no forced/nonrecoverable
    /// override applies (spec §4.5 "update", first bullet).
    pub fn fully_matches(&self) -> bool {
        self.image_matches
            && self.links_match
            && self.volumes_match
            && self.env_matches
            && self.cmd_matches
            && self.entrypoint_matches
            && self.exposes_match
            && self.driver_matches
            && self.limits_match
            && !self.force_update
    }

    /// Every comparison matches except `limits_match` (spec §4.5, second
    /// bullet: fixable in place via `update-host-config` when the daemon
    /// supports it and `skip_limit_reset` is not set).
    pub fn only_limits_mismatch(&self) -> bool {
        !self.limits_match
            && self.image_matches
            && self.links_match
            && self.volumes_match
            && self.env_matches
            && self.cmd_matches
            && self.entrypoint_matches
            && self.exposes_match
            && self.driver_matches
    }
}

/// A container is nonrecoverable if its exit code is in the configured
/// set (default `{-127, -1}`, spec §4.4).
pub fn is_nonrecoverable(exit_code: Option<i64>, nonrecoverable_exit_codes: &HashSet<i64>) -> bool {
    exit_code.is_some_and(|code| nonrecoverable_exit_codes.contains(&code))
}

pub fn default_nonrecoverable_exit_codes() -> HashSet<i64> {
    [-127, -1].into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_matching() -> NodeState {
        NodeState::running(NodeKind::Container, Some(1))
    }

    #[test]
    fn fully_matches_requires_every_field_and_no_force() {
        assert!(all_matching().fully_matches());

        let mut forced = all_matching();
        forced.force_update = true;
        assert!(!forced.fully_matches());

        let mut mismatched = all_matching();
        mismatched.image_matches = false;
        assert!(!mismatched.fully_matches());
    }

    #[test]
    fn only_limits_mismatch_requires_exactly_that_one_field_false() {
        let mut limits_only = all_matching();
        limits_only.limits_match = false;
        assert!(limits_only.only_limits_mismatch());
        // fully_matches and only_limits_mismatch are mutually exclusive.
        assert!(!limits_only.fully_matches());

        let mut two_mismatches = all_matching();
        two_mismatches.limits_match = false;
        two_mismatches.image_matches = false;
        assert!(!two_mismatches.only_limits_mismatch());

        // limits already matching is not "only limits mismatch".
        assert!(!all_matching().only_limits_mismatch());
    }

    #[test]
    fn absent_state_has_no_mismatches_and_is_not_running() {
        let state = NodeState::absent(NodeKind::Container);
        assert!(!state.present);
        assert!(!state.running);
        assert!(state.fully_matches());
        assert!(!state.only_limits_mismatch());
    }

    #[test]
    fn is_nonrecoverable_checks_configured_set_only() {
        let set = default_nonrecoverable_exit_codes();
        assert!(is_nonrecoverable(Some(-127), &set));
        assert!(is_nonrecoverable(Some(-1), &set));
        assert!(!is_nonrecoverable(Some(0), &set));
        assert!(!is_nonrecoverable(None, &set));

        let empty: HashSet<i64> = HashSet::new();
        assert!(!is_nonrecoverable(Some(-127), &empty));
    }
}
