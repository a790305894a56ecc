//! The capability seam between the orchestration layers and a Docker
//! daemon (spec §6 "Docker client contract (consumed)").
//!
//! [`DockerBackend`] is deliberately narrower than the full CLI surface
//! in [`crate::docker::client::DockerClient`] — it exposes exactly the
//! operations the state generators and action executors need. The
//! production implementation ([`LiveBackend`]) drives `docker` CLI
//! subcommands through [`DockerClient::execute_command`]; tests use
//! [`crate::docker::fake::FakeDockerBackend`] instead of a live daemon.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as Json};

use crate::docker::client::DockerClient;
use crate::docker::errors::{DockerError, DockerResult};
use crate::docker::types::ContainerId;

/// A snapshot of one container's live state, enough to drive the update
/// match rules in spec §4.4.
#[derive(Debug, Clone)]
pub struct ContainerInspect {
    pub id: ContainerId,
    pub running: bool,
    pub exit_code: Option<i64>,
    pub pid: Option<u32>,
    pub image_id: String,
    /// Container-path -> host/volume source path, for every mount.
    pub mounts: HashMap<String, String>,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub exposed_ports: Vec<u16>,
    /// Network name -> endpoint id.
    pub networks: HashMap<String, String>,
    /// Alias -> linked container name, for legacy `--link` style links.
    pub links: HashMap<String, String>,
    pub limits: JsonMap<String, serde_json::Value>,
    /// Command lines of currently-running processes, for exec-presence
    /// checks (spec §4.4 "Exec").
    pub running_processes: Vec<Vec<String>>,
}

/// Arguments to create a container, already assembled by the Action
/// generator's keyword-precedence rules (spec §4.5 "Keyword assembly").
#[derive(Debug, Clone, Default)]
pub struct CreateContainerSpec {
    pub name: String,
    pub image: String,
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub exposed_ports: Vec<u16>,
    /// Container path -> (host path or volume name, readonly).
    pub binds: Vec<(String, String, bool)>,
    pub volumes_from: Vec<String>,
    pub host_config: JsonMap<String, serde_json::Value>,
    pub create_options: JsonMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub command: Vec<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

/// The capability set the Runner drives every op through.
#[async_trait]
pub trait DockerBackend: Send + Sync {
    async fn inspect_container(&self, name: &str) -> DockerResult<Option<ContainerInspect>>;
    async fn create_container(&self, spec: CreateContainerSpec) -> DockerResult<ContainerId>;
    async fn start_container(&self, id: &ContainerId) -> DockerResult<()>;
    async fn stop_container(
        &self,
        id: &ContainerId,
        signal: &str,
        timeout: Duration,
    ) -> DockerResult<()>;
    async fn kill_container(&self, id: &ContainerId, signal: &str) -> DockerResult<()>;
    async fn remove_container(&self, id: &ContainerId, force: bool) -> DockerResult<()>;
    async fn exec(&self, id: &ContainerId, request: ExecRequest) -> DockerResult<ExecOutcome>;
    async fn container_logs(&self, id: &ContainerId) -> DockerResult<String>;

    async fn create_volume(&self, name: &str, driver: &str) -> DockerResult<()>;
    async fn volume_exists(&self, name: &str) -> DockerResult<bool>;
    async fn remove_volume(&self, name: &str) -> DockerResult<()>;

    async fn create_network(&self, name: &str, driver: &str, internal: bool) -> DockerResult<()>;
    async fn network_exists(&self, name: &str) -> DockerResult<bool>;
    async fn connect_network(
        &self,
        container: &ContainerId,
        network: &str,
        aliases: &[String],
    ) -> DockerResult<()>;
    async fn disconnect_network(&self, container: &ContainerId, network: &str) -> DockerResult<()>;
    async fn remove_network(&self, name: &str) -> DockerResult<()>;

    async fn pull_image(&self, reference: &str, insecure: bool) -> DockerResult<()>;
    async fn resolve_image_id(&self, reference: &str) -> DockerResult<Option<String>>;

    async fn update_host_config(
        &self,
        id: &ContainerId,
        limits: &JsonMap<String, serde_json::Value>,
    ) -> DockerResult<()>;

    /// Whether this daemon exposes `HostConfig` at create time (API >=
    /// v1.15, spec §4.5) and can patch limits in place without recreate.
    fn supports_host_config_update(&self) -> bool;
}

/// Production [`DockerBackend`] backed by a real daemon, reached through
/// the CLI wrapper in [`crate::docker::client`]: every operation is a
/// `docker` subcommand invocation via [`DockerClient::execute_command`],
/// the same mechanism the rest of this crate's command builders use.
pub struct LiveBackend {
    client: DockerClient,
    host_config_capable: bool,
}

impl LiveBackend {
    pub fn new(client: DockerClient) -> Self {
        Self {
            client,
            host_config_capable: true,
        }
    }

    async fn run(&self, args: Vec<String>) -> DockerResult<String> {
        self.client.execute_command_stdout(&args).await
    }

    fn strs(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }
}

/// `docker inspect`/`volume inspect`/`network inspect` on an unknown name
/// exit non-zero with "No such ..." on stderr; this is the CLI's only
/// signal that the object is absent rather than that the call failed.
fn is_missing_object(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::CommandFailed { stderr, .. } if stderr.contains("No such")
    )
}

#[async_trait]
impl DockerBackend for LiveBackend {
    async fn inspect_container(&self, name: &str) -> DockerResult<Option<ContainerInspect>> {
        let result = self
            .run(vec!["inspect".to_string(), name.to_string()])
            .await;
        let raw = match result {
            Ok(raw) => raw,
            Err(err) if is_missing_object(&err) => return Ok(None),
            Err(err) => return Err(err),
        };
        let parsed: Vec<Json> = serde_json::from_str(&raw)
            .map_err(|e| DockerError::json("parsing container inspect output", e))?;
        let Some(entry) = parsed.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(parse_container_inspect(&entry)?))
    }

    async fn create_container(&self, spec: CreateContainerSpec) -> DockerResult<ContainerId> {
        let mut args = vec!["create".to_string(), "--name".to_string(), spec.name];
        if let Some(hostname) = spec.hostname {
            args.push("--hostname".to_string());
            args.push(hostname);
        }
        if let Some(user) = spec.user {
            args.push("--user".to_string());
            args.push(user);
        }
        for env in spec.env {
            args.push("--env".to_string());
            args.push(env);
        }
        for port in spec.exposed_ports {
            args.push("--expose".to_string());
            args.push(port.to_string());
        }
        for (container_path, source, readonly) in spec.binds {
            let mode = if readonly { ":ro" } else { "" };
            args.push("--volume".to_string());
            args.push(format!("{source}:{container_path}{mode}"));
        }
        for from in spec.volumes_from {
            args.push("--volumes-from".to_string());
            args.push(from);
        }
        args.push(spec.image);
        args.extend(spec.entrypoint);
        args.extend(spec.cmd);

        let id = self.run(args).await?;
        ContainerId::new(id.trim())
    }

    async fn start_container(&self, id: &ContainerId) -> DockerResult<()> {
        self.run(vec!["start".to_string(), id.as_str().to_string()])
            .await?;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        signal: &str,
        timeout: Duration,
    ) -> DockerResult<()> {
        self.run(vec![
            "stop".to_string(),
            "--signal".to_string(),
            signal.to_string(),
            "--time".to_string(),
            timeout.as_secs().to_string(),
            id.as_str().to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn kill_container(&self, id: &ContainerId, signal: &str) -> DockerResult<()> {
        self.run(vec![
            "kill".to_string(),
            "--signal".to_string(),
            signal.to_string(),
            id.as_str().to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> DockerResult<()> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(id.as_str().to_string());
        self.run(args).await?;
        Ok(())
    }

    async fn exec(&self, id: &ContainerId, request: ExecRequest) -> DockerResult<ExecOutcome> {
        let mut args = vec!["exec".to_string()];
        if let Some(user) = request.user {
            args.push("--user".to_string());
            args.push(user);
        }
        args.push(id.as_str().to_string());
        args.extend(request.command);
        let output = self.client.execute_command(&args, None).await?;
        Ok(ExecOutcome {
            exit_code: output.exit_code as i64,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn container_logs(&self, id: &ContainerId) -> DockerResult<String> {
        self.run(vec!["logs".to_string(), id.as_str().to_string()])
            .await
    }

    async fn create_volume(&self, name: &str, driver: &str) -> DockerResult<()> {
        self.run(vec![
            "volume".to_string(),
            "create".to_string(),
            "--driver".to_string(),
            driver.to_string(),
            name.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> DockerResult<bool> {
        match self
            .run(vec!["volume".to_string(), "inspect".to_string(), name.to_string()])
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_missing_object(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn remove_volume(&self, name: &str) -> DockerResult<()> {
        self.run(vec!["volume".to_string(), "rm".to_string(), name.to_string()])
            .await?;
        Ok(())
    }

    async fn create_network(&self, name: &str, driver: &str, internal: bool) -> DockerResult<()> {
        let mut args = Self::strs(&["network", "create", "--driver"]);
        args.push(driver.to_string());
        if internal {
            args.push("--internal".to_string());
        }
        args.push(name.to_string());
        self.run(args).await?;
        Ok(())
    }

    async fn network_exists(&self, name: &str) -> DockerResult<bool> {
        match self
            .run(vec!["network".to_string(), "inspect".to_string(), name.to_string()])
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_missing_object(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn connect_network(
        &self,
        container: &ContainerId,
        network: &str,
        aliases: &[String],
    ) -> DockerResult<()> {
        let mut args = vec!["network".to_string(), "connect".to_string()];
        for alias in aliases {
            args.push("--alias".to_string());
            args.push(alias.clone());
        }
        args.push(network.to_string());
        args.push(container.as_str().to_string());
        self.run(args).await?;
        Ok(())
    }

    async fn disconnect_network(&self, container: &ContainerId, network: &str) -> DockerResult<()> {
        self.run(vec![
            "network".to_string(),
            "disconnect".to_string(),
            network.to_string(),
            container.as_str().to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> DockerResult<()> {
        self.run(vec!["network".to_string(), "rm".to_string(), name.to_string()])
            .await?;
        Ok(())
    }

    async fn pull_image(&self, reference: &str, insecure: bool) -> DockerResult<()> {
        let mut args = vec!["pull".to_string()];
        if insecure {
            args.push("--disable-content-trust".to_string());
        }
        args.push(reference.to_string());
        self.run(args).await?;
        Ok(())
    }

    async fn resolve_image_id(&self, reference: &str) -> DockerResult<Option<String>> {
        match self
            .run(vec![
                "inspect".to_string(),
                "--format".to_string(),
                "{{.Id}}".to_string(),
                reference.to_string(),
            ])
            .await
        {
            Ok(id) => Ok(Some(id.trim().to_string())),
            Err(err) if is_missing_object(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_host_config(
        &self,
        id: &ContainerId,
        limits: &JsonMap<String, serde_json::Value>,
    ) -> DockerResult<()> {
        let mut args = vec!["update".to_string()];
        for (key, value) in limits {
            args.push(format!("--{}", key.to_lowercase()));
            args.push(value.to_string().trim_matches('"').to_string());
        }
        args.push(id.as_str().to_string());
        self.run(args).await?;
        Ok(())
    }

    fn supports_host_config_update(&self) -> bool {
        self.host_config_capable
    }
}

fn parse_container_inspect(entry: &Json) -> DockerResult<ContainerInspect> {
    let id = entry
        .get("Id")
        .and_then(Json::as_str)
        .ok_or_else(|| DockerError::parsing("container inspect missing Id"))?;

    let state = entry.get("State").cloned().unwrap_or(Json::Null);
    let running = state.get("Running").and_then(Json::as_bool).unwrap_or(false);
    let exit_code = state.get("ExitCode").and_then(Json::as_i64);
    let pid = state
        .get("Pid")
        .and_then(Json::as_u64)
        .map(|p| p as u32)
        .filter(|p| *p != 0);

    let image_id = entry
        .get("Image")
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();

    let mut mounts = HashMap::new();
    if let Some(list) = entry.get("Mounts").and_then(Json::as_array) {
        for mount in list {
            if let (Some(dest), Some(src)) = (
                mount.get("Destination").and_then(Json::as_str),
                mount.get("Source").and_then(Json::as_str),
            ) {
                mounts.insert(dest.to_string(), src.to_string());
            }
        }
    }

    let config = entry.get("Config").cloned().unwrap_or(Json::Null);
    let env = config
        .get("Env")
        .and_then(Json::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let cmd = config
        .get("Cmd")
        .and_then(Json::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let entrypoint = config
        .get("Entrypoint")
        .and_then(Json::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let exposed_ports = config
        .get("ExposedPorts")
        .and_then(Json::as_object)
        .map(|ports| {
            ports
                .keys()
                .filter_map(|k| k.split('/').next())
                .filter_map(|p| p.parse::<u16>().ok())
                .collect()
        })
        .unwrap_or_default();

    let mut networks = HashMap::new();
    if let Some(nets) = entry
        .pointer("/NetworkSettings/Networks")
        .and_then(Json::as_object)
    {
        for (name, endpoint) in nets {
            if let Some(endpoint_id) = endpoint.get("NetworkID").and_then(Json::as_str) {
                networks.insert(name.clone(), endpoint_id.to_string());
            }
        }
    }

    let limits = entry
        .pointer("/HostConfig")
        .and_then(Json::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(ContainerInspect {
        id: ContainerId::new_unchecked(id.to_string()),
        running,
        exit_code,
        pid,
        image_id,
        mounts,
        env,
        cmd,
        entrypoint,
        exposed_ports,
        networks,
        links: HashMap::new(),
        limits,
        running_processes: Vec::new(),
    })
}
