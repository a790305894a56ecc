//! `run-script` intent (spec §4.5 "run-script").
//!
//! Unlike the other intents this one does not hand an op list to the
//! Runner: it needs to observe the one-shot container's exit before
//! deciding what to do next, so it drives the backend directly and
//! returns a result the caller can inspect synchronously.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::docker::backend::CreateContainerSpec;
use crate::error::{LandscapeError, LandscapeResult};
use crate::state::PlanContext;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to run and how to clean up after it.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub image: String,
    pub host_script_path: String,
    pub container_script_path: String,
    /// Entrypoint/cmd template; any element equal to `{script_path}` is
    /// substituted with `container_script_path` before the container is
    /// created.
    pub entrypoint: Vec<String>,
    pub command: Vec<String>,
    pub wait_timeout: Duration,
    pub remove_existing_before: bool,
    pub remove_existing_after: bool,
}

/// Outcome of a completed script run.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub exit_code: i64,
    pub logs: String,
}

/// Create a one-shot container from `request`, run it to completion, and
/// collect its logs and exit code (spec §4.5 "run-script").
pub async fn run_script(
    ctx: &PlanContext<'_>,
    container_name: &str,
    request: ScriptRequest,
) -> LandscapeResult<ScriptOutcome> {
    if let Some(_existing) = ctx.backend.inspect_container(container_name).await? {
        if !request.remove_existing_before {
            return Err(LandscapeError::script_action(format!(
                "container '{container_name}' already exists; pass remove_existing_before to replace it"
            )));
        }
        let id = ctx
            .backend
            .inspect_container(container_name)
            .await?
            .expect("just observed present")
            .id;
        ctx.backend.remove_container(&id, true).await?;
    }

    let spec = CreateContainerSpec {
        name: container_name.to_string(),
        image: request.image.clone(),
        entrypoint: substitute(&request.entrypoint, &request.container_script_path),
        cmd: substitute(&request.command, &request.container_script_path),
        binds: vec![(
            request.container_script_path.clone(),
            request.host_script_path.clone(),
            true,
        )],
        ..Default::default()
    };
    let id = ctx.backend.create_container(spec).await?;
    ctx.backend.start_container(&id).await?;

    let deadline = Instant::now() + request.wait_timeout;
    let exit_code = loop {
        let inspect = ctx
            .backend
            .inspect_container(container_name)
            .await?
            .ok_or_else(|| LandscapeError::script_action(format!("container '{container_name}' vanished while running")))?;
        if !inspect.running {
            break inspect.exit_code.unwrap_or(0);
        }
        if Instant::now() >= deadline {
            return Err(LandscapeError::script_action(format!(
                "script container '{container_name}' did not exit within {:?}",
                request.wait_timeout
            )));
        }
        sleep(POLL_INTERVAL).await;
    };

    let logs = ctx.backend.container_logs(&id).await?;

    if request.remove_existing_after {
        ctx.backend.remove_container(&id, true).await?;
    }

    Ok(ScriptOutcome { exit_code, logs })
}

fn substitute(template: &[String], script_path: &str) -> Vec<String> {
    template
        .iter()
        .map(|part| {
            if part == "{script_path}" {
                script_path.to_string()
            } else {
                part.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeDockerBackend;
    use crate::graph::DependencyGraph;
    use crate::model::map::ContainerMap;

    fn empty_map() -> ContainerMap {
        ContainerMap::new("scripts".to_string())
    }

    #[tokio::test]
    async fn refuses_to_clobber_an_existing_container_without_override() {
        let map = empty_map();
        let graph = DependencyGraph::default();
        let backend = FakeDockerBackend::new();
        backend.seed_container(
            "scripts.migrate",
            crate::docker::backend::ContainerInspect {
                id: crate::docker::types::ContainerId::new("deadbeef").unwrap(),
                running: false,
                exit_code: Some(0),
                pid: None,
                image_id: "img".to_string(),
                mounts: Default::default(),
                env: vec![],
                cmd: vec![],
                entrypoint: vec![],
                exposed_ports: vec![],
                networks: Default::default(),
                links: Default::default(),
                limits: Default::default(),
                running_processes: vec![],
            },
        );
        let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };
        let request = ScriptRequest {
            image: "alpine:latest".to_string(),
            host_script_path: "/host/migrate.sh".to_string(),
            container_script_path: "/script.sh".to_string(),
            entrypoint: vec![],
            command: vec!["/bin/sh".to_string(), "{script_path}".to_string()],
            wait_timeout: Duration::from_secs(1),
            remove_existing_before: false,
            remove_existing_after: true,
        };
        let err = run_script(&ctx, "scripts.migrate", request).await.unwrap_err();
        assert!(matches!(err, LandscapeError::ScriptAction { .. }));
    }

    #[tokio::test]
    async fn a_container_that_never_exits_times_out() {
        // FakeDockerBackend never transitions a started container back to
        // stopped on its own, so this exercises the wait-timeout path
        // rather than a real exit.
        let map = empty_map();
        let graph = DependencyGraph::default();
        let backend = FakeDockerBackend::new();
        let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };
        let request = ScriptRequest {
            image: "alpine:latest".to_string(),
            host_script_path: "/host/migrate.sh".to_string(),
            container_script_path: "/script.sh".to_string(),
            entrypoint: vec![],
            command: vec!["/bin/sh".to_string(), "{script_path}".to_string()],
            wait_timeout: Duration::from_millis(50),
            remove_existing_before: false,
            remove_existing_after: true,
        };
        let err = run_script(&ctx, "scripts.migrate", request).await.unwrap_err();
        assert!(matches!(err, LandscapeError::ScriptAction { .. }));
    }
}
