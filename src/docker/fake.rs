//! An in-memory [`DockerBackend`] double for tests (SPEC_FULL.md A.4
//! "Test tooling").
//!
//! Scenario tests build a [`FakeDockerBackend`], seed it with whatever
//! pre-existing containers/volumes/networks the scenario calls for, run a
//! planning cycle against it through the Runner, and assert on both the
//! resulting Docker-visible state and the sequence of calls recorded in
//! [`FakeDockerBackend::calls`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map as JsonMap;

use crate::docker::backend::{ContainerInspect, CreateContainerSpec, DockerBackend, ExecOutcome, ExecRequest};
use crate::docker::errors::{DockerError, DockerResult};
use crate::docker::types::ContainerId;

#[derive(Debug, Default)]
struct State {
    containers: HashMap<String, ContainerInspect>,
    volumes: HashMap<String, String>,
    networks: HashMap<String, (String, bool)>,
    images: HashMap<String, String>,
    next_id: u64,
}

/// Every call the Runner made, in order — the assertion surface for the
/// end-to-end scenario tests (spec §8 S1-S6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateContainer(String),
    StartContainer(String),
    StopContainer(String),
    KillContainer(String),
    RemoveContainer(String),
    Exec(String, Vec<String>),
    CreateVolume(String),
    RemoveVolume(String),
    CreateNetwork(String),
    ConnectNetwork(String, String),
    DisconnectNetwork(String, String),
    RemoveNetwork(String),
    PullImage(String),
    UpdateHostConfig(String),
}

pub struct FakeDockerBackend {
    state: Mutex<State>,
    pub calls: Mutex<Vec<RecordedCall>>,
    host_config_capable: bool,
}

impl FakeDockerBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            calls: Mutex::new(Vec::new()),
            host_config_capable: true,
        }
    }

    pub fn without_host_config_update(mut self) -> Self {
        self.host_config_capable = false;
        self
    }

    /// Seed a pre-existing container (used to set up scenarios that start
    /// mid-lifecycle, e.g. S4's image-changed update case).
    pub fn seed_container(&self, name: &str, inspect: ContainerInspect) {
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(name.to_string(), inspect);
    }

    pub fn seed_image(&self, reference: &str, image_id: &str) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(reference.to_string(), image_id.to_string());
    }

    pub fn calls_snapshot(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_container_id(&self, state: &mut State) -> ContainerId {
        state.next_id += 1;
        ContainerId::new_unchecked(format!("{:012x}", state.next_id))
    }
}

#[async_trait]
impl DockerBackend for FakeDockerBackend {
    async fn inspect_container(&self, name: &str) -> DockerResult<Option<ContainerInspect>> {
        Ok(self.state.lock().unwrap().containers.get(name).cloned())
    }

    async fn create_container(&self, spec: CreateContainerSpec) -> DockerResult<ContainerId> {
        self.record(RecordedCall::CreateContainer(spec.name.clone()));
        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&spec.name) {
            return Err(DockerError::container_already_exists(spec.name));
        }
        let id = self.next_container_id(&mut state);
        let image_id = state
            .images
            .get(&spec.image)
            .cloned()
            .unwrap_or_else(|| format!("sha256:{}", spec.image));
        let mounts = spec
            .binds
            .iter()
            .map(|(path, source, _)| (path.clone(), source.clone()))
            .collect();
        state.containers.insert(
            spec.name,
            ContainerInspect {
                id: id.clone(),
                running: false,
                exit_code: None,
                pid: None,
                image_id,
                mounts,
                env: spec.env,
                cmd: spec.cmd,
                entrypoint: spec.entrypoint,
                exposed_ports: spec.exposed_ports,
                networks: HashMap::new(),
                links: HashMap::new(),
                limits: JsonMap::new(),
                running_processes: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> DockerResult<()> {
        self.record(RecordedCall::StartContainer(id.as_str().to_string()));
        let mut state = self.state.lock().unwrap();
        let entry = state
            .containers
            .values_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| DockerError::container_not_found(id.as_str()))?;
        entry.running = true;
        entry.exit_code = None;
        entry.pid = Some(1);
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, _signal: &str, _timeout: Duration) -> DockerResult<()> {
        self.record(RecordedCall::StopContainer(id.as_str().to_string()));
        let mut state = self.state.lock().unwrap();
        let entry = state
            .containers
            .values_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| DockerError::container_not_found(id.as_str()))?;
        entry.running = false;
        entry.exit_code = Some(0);
        entry.pid = None;
        Ok(())
    }

    async fn kill_container(&self, id: &ContainerId, _signal: &str) -> DockerResult<()> {
        self.record(RecordedCall::KillContainer(id.as_str().to_string()));
        self.stop_container(id, "SIGKILL", Duration::from_secs(0)).await
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> DockerResult<()> {
        self.record(RecordedCall::RemoveContainer(id.as_str().to_string()));
        let mut state = self.state.lock().unwrap();
        let name = state
            .containers
            .iter()
            .find(|(_, c)| &c.id == id)
            .map(|(name, _)| name.clone());
        match name {
            Some(name) => {
                state.containers.remove(&name);
                Ok(())
            }
            None => Err(DockerError::container_not_found(id.as_str())),
        }
    }

    async fn exec(&self, id: &ContainerId, request: ExecRequest) -> DockerResult<ExecOutcome> {
        self.record(RecordedCall::Exec(id.as_str().to_string(), request.command.clone()));
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.containers.values_mut().find(|c| &c.id == id) {
            entry.running_processes.push(request.command);
        }
        Ok(ExecOutcome {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn container_logs(&self, _id: &ContainerId) -> DockerResult<String> {
        Ok(String::new())
    }

    async fn create_volume(&self, name: &str, driver: &str) -> DockerResult<()> {
        self.record(RecordedCall::CreateVolume(name.to_string()));
        self.state
            .lock()
            .unwrap()
            .volumes
            .insert(name.to_string(), driver.to_string());
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> DockerResult<bool> {
        Ok(self.state.lock().unwrap().volumes.contains_key(name))
    }

    async fn remove_volume(&self, name: &str) -> DockerResult<()> {
        self.record(RecordedCall::RemoveVolume(name.to_string()));
        self.state.lock().unwrap().volumes.remove(name);
        Ok(())
    }

    async fn create_network(&self, name: &str, driver: &str, internal: bool) -> DockerResult<()> {
        self.record(RecordedCall::CreateNetwork(name.to_string()));
        self.state
            .lock()
            .unwrap()
            .networks
            .insert(name.to_string(), (driver.to_string(), internal));
        Ok(())
    }

    async fn network_exists(&self, name: &str) -> DockerResult<bool> {
        Ok(self.state.lock().unwrap().networks.contains_key(name))
    }

    async fn connect_network(&self, container: &ContainerId, network: &str, _aliases: &[String]) -> DockerResult<()> {
        self.record(RecordedCall::ConnectNetwork(
            container.as_str().to_string(),
            network.to_string(),
        ));
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.containers.values_mut().find(|c| &c.id == container) {
            entry
                .networks
                .insert(network.to_string(), format!("endpoint-{network}"));
        }
        Ok(())
    }

    async fn disconnect_network(&self, container: &ContainerId, network: &str) -> DockerResult<()> {
        self.record(RecordedCall::DisconnectNetwork(
            container.as_str().to_string(),
            network.to_string(),
        ));
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.containers.values_mut().find(|c| &c.id == container) {
            entry.networks.remove(network);
        }
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> DockerResult<()> {
        self.record(RecordedCall::RemoveNetwork(name.to_string()));
        self.state.lock().unwrap().networks.remove(name);
        Ok(())
    }

    async fn pull_image(&self, reference: &str, _insecure: bool) -> DockerResult<()> {
        self.record(RecordedCall::PullImage(reference.to_string()));
        let mut state = self.state.lock().unwrap();
        state
            .images
            .entry(reference.to_string())
            .or_insert_with(|| format!("sha256:{reference}"));
        Ok(())
    }

    async fn resolve_image_id(&self, reference: &str) -> DockerResult<Option<String>> {
        Ok(self.state.lock().unwrap().images.get(reference).cloned())
    }

    async fn update_host_config(&self, id: &ContainerId, limits: &JsonMap<String, serde_json::Value>) -> DockerResult<()> {
        self.record(RecordedCall::UpdateHostConfig(id.as_str().to_string()));
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.containers.values_mut().find(|c| &c.id == id) {
            entry.limits = limits.clone();
        }
        Ok(())
    }

    fn supports_host_config_update(&self) -> bool {
        self.host_config_capable
    }
}
