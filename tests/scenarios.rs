//! End-to-end scenario tests driving the full planning pipeline
//! (model → graph → state → actions → runner) against
//! [`docker_landscape::FakeDockerBackend`], with no live Docker daemon.

use serde_json::json;

use docker_landscape::actions::{plan_create, plan_startup, plan_stop, plan_update};
use docker_landscape::docker::backend::ContainerInspect;
use docker_landscape::docker::types::ContainerId;
use docker_landscape::graph::{DependencyGraph, NodeId};
use docker_landscape::model::container::{BindSpec, ContainerConfig};
use docker_landscape::model::volume::HostVolumeEntry;
use docker_landscape::model::value::Value;
use docker_landscape::runner::Runner;
use docker_landscape::{ContainerMap, FakeDockerBackend, PlanContext, UpdateOptions};

fn container_root(config: &str) -> NodeId {
    NodeId::Container {
        config: config.to_string(),
        instance: None,
    }
}

fn seeded_running(image_id: &str) -> ContainerInspect {
    ContainerInspect {
        id: ContainerId::new("running-container").unwrap(),
        running: true,
        exit_code: None,
        pid: Some(4242),
        image_id: image_id.to_string(),
        mounts: Default::default(),
        env: vec![],
        cmd: vec![],
        entrypoint: vec![],
        exposed_ports: vec![],
        networks: Default::default(),
        links: Default::default(),
        limits: Default::default(),
        running_processes: vec![],
    }
}

/// S1 — minimal create: an empty daemon and a single-container map emit
/// exactly one `create-container`.
#[tokio::test]
async fn s1_minimal_create() {
    let value = json!({"name": "m", "containers": {"a": {"image": "ubuntu"}}});
    let map = ContainerMap::from_value(None, &value).unwrap();
    let graph = DependencyGraph::build(&map).unwrap();
    let backend = FakeDockerBackend::new();
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };

    let ops = plan_create(&ctx, &[container_root("a")]).await.unwrap();

    assert_eq!(ops.len(), 1);
    match &ops[0].op {
        docker_landscape::actions::Op::CreateContainer { spec } => {
            assert_eq!(spec.name, "m.a");
            assert_eq!(spec.image, "ubuntu:latest");
        }
        other => panic!("expected CreateContainer, got {other:?}"),
    }
}

/// S2 — attached-volume prep with permissions: `startup("app")` on an
/// empty daemon creates and starts the attached-volume holder, then
/// creates and starts `app` with a permission-prep step bracketed around
/// its own start (our simplification: permission prep execs into the
/// freshly-created owner container rather than a separate transient
/// container per alias, see DESIGN.md).
#[tokio::test]
async fn s2_attached_volume_prep_with_permissions() {
    let mut map = ContainerMap::new("m");
    map.volumes.insert(
        "sock".to_string(),
        docker_landscape::model::volume::VolumeConfig {
            default_path: Some("/var/run/app".to_string()),
            ..Default::default()
        },
    );
    map.containers.insert(
        "app".to_string(),
        ContainerConfig {
            image: Some("app".to_string()),
            attaches: vec![docker_landscape::model::container::AttachSpec {
                alias: "sock".to_string(),
                default_path: Some("/var/run/app".to_string()),
            }],
            user: Some(Value::constant("2000".to_string())),
            permissions: Some("u=rwX,g=rX,o=".to_string()),
            ..Default::default()
        },
    );

    let graph = DependencyGraph::build(&map).unwrap();
    let backend = FakeDockerBackend::new();
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };

    let ops = plan_startup(&ctx, &[container_root("app")], &UpdateOptions::default())
        .await
        .unwrap();

    let descriptions: Vec<String> = ops.iter().map(|p| format!("{:?}", p.op)).collect();
    assert!(descriptions[0].contains("CreateContainer") && descriptions[0].contains("m.sock"));
    assert!(descriptions[1].contains("StartContainer") && descriptions[1].contains("m.sock"));
    assert!(descriptions[2].contains("CreateContainer") && descriptions[2].contains("m.app"));
    assert!(descriptions.last().unwrap().contains("StartContainer") && descriptions.last().unwrap().contains("m.app"));

    let prep = ops
        .iter()
        .find_map(|p| match &p.op {
            docker_landscape::actions::Op::PreparePermissions { container_name, user, permissions, path } => {
                Some((container_name.clone(), user.clone(), permissions.clone(), path.clone()))
            }
            _ => None,
        })
        .expect("expected a PreparePermissions op");
    assert_eq!(prep.0, "m.app");
    assert_eq!(prep.1, "2000");
    assert_eq!(prep.2, "u=rwX,g=rX,o=");
    assert_eq!(prep.3, "/var/run/app");
}

/// S3 — dependency ordering: `web` uses `app`. `create("web")` must
/// process `app` before `web`; `stop("web")` must stop `web` before
/// `app`.
#[tokio::test]
async fn s3_dependency_ordering() {
    let mut map = ContainerMap::new("m");
    map.containers.insert(
        "app".to_string(),
        ContainerConfig {
            image: Some("app".to_string()),
            ..Default::default()
        },
    );
    map.containers.insert(
        "web".to_string(),
        ContainerConfig {
            image: Some("web".to_string()),
            uses: vec![docker_landscape::model::container::UseSpec {
                target: docker_landscape::model::container::UseTarget::Container("app".to_string()),
                container_path: None,
            }],
            ..Default::default()
        },
    );
    let graph = DependencyGraph::build(&map).unwrap();

    let backend = FakeDockerBackend::new();
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };
    let ops = plan_create(&ctx, &[container_root("web")]).await.unwrap();
    let app_index = ops.iter().position(|p| format!("{:?}", p.op).contains("m.app")).unwrap();
    let web_index = ops.iter().position(|p| format!("{:?}", p.op).contains("m.web")).unwrap();
    assert!(app_index < web_index);

    // Now both are running; stop("web") must stop web before app.
    let backend = FakeDockerBackend::new();
    backend.seed_container("m.app", seeded_running("sha256:app"));
    backend.seed_container("m.web", seeded_running("sha256:web"));
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };
    let ops = plan_stop(&ctx, &[container_root("web")]).await.unwrap();
    let app_index = ops.iter().position(|p| format!("{:?}", p.op).contains("m.app")).unwrap();
    let web_index = ops.iter().position(|p| format!("{:?}", p.op).contains("m.web")).unwrap();
    assert!(web_index < app_index);
}

/// S4 — update on image change: a running container whose live image id
/// no longer matches the resolved image emits stop → remove → create →
/// start.
#[tokio::test]
async fn s4_update_on_image_change() {
    let mut map = ContainerMap::new("m");
    map.containers.insert(
        "app".to_string(),
        ContainerConfig {
            image: Some("app".to_string()),
            ..Default::default()
        },
    );
    let graph = DependencyGraph::build(&map).unwrap();
    let backend = FakeDockerBackend::new();
    backend.seed_container("m.app", seeded_running("sha256:stale"));
    backend.seed_image("app:latest", "sha256:fresh");
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };

    let ops = plan_update(&ctx, &[container_root("app")], &UpdateOptions::default())
        .await
        .unwrap();

    let kinds: Vec<&str> = ops
        .iter()
        .map(|p| match &p.op {
            docker_landscape::actions::Op::StopContainer { .. } => "stop",
            docker_landscape::actions::Op::RemoveContainer { .. } => "remove",
            docker_landscape::actions::Op::CreateContainer { .. } => "create",
            docker_landscape::actions::Op::StartContainer { .. } => "start",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["stop", "remove", "create", "start"]);
}

/// S5 — instances with per-instance host paths: two declared instances
/// bind-mount an alias resolving to a distinct host path each.
#[tokio::test]
async fn s5_instances_with_per_instance_host_paths() {
    let mut map = ContainerMap::new("m");
    map.host.root = Some(Value::constant("/srv".to_string()));
    map.host.entries.insert(
        "cfg".to_string(),
        HostVolumeEntry::PerInstance(
            [
                ("i1".to_string(), Value::constant("cfg/a".to_string())),
                ("i2".to_string(), Value::constant("cfg/b".to_string())),
            ]
            .into_iter()
            .collect(),
        ),
    );
    map.containers.insert(
        "app".to_string(),
        ContainerConfig {
            image: Some("app".to_string()),
            instances: vec!["i1".to_string(), "i2".to_string()],
            binds: vec![BindSpec::Alias {
                alias: "cfg".to_string(),
                container_path: Some("/cfg".to_string()),
                readonly: false,
            }],
            ..Default::default()
        },
    );
    let graph = DependencyGraph::build(&map).unwrap();
    let backend = FakeDockerBackend::new();
    let roots = vec![
        NodeId::Container { config: "app".to_string(), instance: Some("i1".to_string()) },
        NodeId::Container { config: "app".to_string(), instance: Some("i2".to_string()) },
    ];
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };
    let ops = plan_create(&ctx, &roots).await.unwrap();

    assert_eq!(ops.len(), 2);
    let mut names_and_binds: Vec<(String, String)> = ops
        .iter()
        .map(|p| match &p.op {
            docker_landscape::actions::Op::CreateContainer { spec } => {
                (spec.name.clone(), spec.binds[0].1.clone())
            }
            other => panic!("expected CreateContainer, got {other:?}"),
        })
        .collect();
    names_and_binds.sort();
    assert_eq!(
        names_and_binds,
        vec![
            ("m.app.i1".to_string(), "/srv/cfg/a".to_string()),
            ("m.app.i2".to_string(), "/srv/cfg/b".to_string()),
        ]
    );
}

/// S6 — partial failure: starting three independent containers where the
/// second `start-container` fails leaves exactly one successful outcome
/// in the runner's partial-results, and `reraise()` surfaces the
/// underlying error rather than the `ActionRunner` wrapper.
#[tokio::test]
async fn s6_partial_failure_preserves_results_and_reraises() {
    use docker_landscape::actions::{Op, PlannedOp};
    use docker_landscape::docker::backend::CreateContainerSpec;
    use docker_landscape::error::LandscapeError;
    use docker_landscape::DockerBackend;

    let backend = FakeDockerBackend::new();
    backend
        .create_container(CreateContainerSpec {
            name: "m.a".to_string(),
            image: "img".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    backend
        .create_container(CreateContainerSpec {
            name: "m.c".to_string(),
            image: "img".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    // m.b is deliberately never created, so its start fails.

    let mut runner = Runner::new("default", &backend);
    let node = |c: &str| NodeId::Container { config: c.to_string(), instance: None };
    let ops = vec![
        PlannedOp { node: node("a"), op: Op::StartContainer { container_name: "m.a".to_string() } },
        PlannedOp { node: node("b"), op: Op::StartContainer { container_name: "m.b".to_string() } },
        PlannedOp { node: node("c"), op: Op::StartContainer { container_name: "m.c".to_string() } },
    ];

    let err = runner.run(ops).await.unwrap_err();
    let partial = err.partial_results().expect("ActionRunner carries partial results");
    assert_eq!(partial.len(), 1);
    assert!(partial[0].succeeded);
    assert!(matches!(err.reraise(), LandscapeError::MapIntegrity { .. }));
}

/// Invariant 6 (spec §8): running `update` against a daemon already in
/// sync with the map emits zero mutating ops — no stop/remove/create/
/// start/pull/update-host-config, just the read-only inspect/resolve
/// calls a state generator needs to decide there is nothing to do.
#[tokio::test]
async fn update_on_steady_state_emits_no_mutating_ops() {
    let mut map = ContainerMap::new("m");
    map.containers.insert(
        "app".to_string(),
        ContainerConfig {
            image: Some("app".to_string()),
            ..Default::default()
        },
    );
    let graph = DependencyGraph::build(&map).unwrap();
    let backend = FakeDockerBackend::new();
    // Seed the resolved image id up front so the id the container is
    // created with and the id `resolve_image_id` later returns agree —
    // mirroring a daemon that already has the image pulled.
    backend.seed_image("app:latest", "sha256:app-steady");
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };

    // Bring the container to the state the map describes by actually
    // running create+start through the Runner first.
    let create_ops = plan_create(&ctx, &[container_root("app")]).await.unwrap();
    let mut runner = Runner::new("default", &backend);
    runner.run(create_ops).await.unwrap();
    let start_ops = plan_startup(&ctx, &[container_root("app")], &UpdateOptions::default())
        .await
        .unwrap();
    runner.run(start_ops).await.unwrap();

    let ops = plan_update(&ctx, &[container_root("app")], &UpdateOptions::default())
        .await
        .unwrap();

    assert!(
        ops.is_empty(),
        "expected no ops on an already-in-sync container, got {ops:?}"
    );

    let mutating: Vec<_> = backend
        .calls_snapshot()
        .into_iter()
        .filter(|call| {
            !matches!(
                call,
                docker_landscape::docker::fake::RecordedCall::CreateContainer(_)
                    | docker_landscape::docker::fake::RecordedCall::StartContainer(_)
            )
        })
        .collect();
    assert!(
        mutating.is_empty(),
        "update must not issue any further mutating calls beyond the initial create+start, got {mutating:?}"
    );
}

/// Invariant 6 still holds for a config with a `networks` endpoint: once
/// the container is actually connected, a further `update` must not
/// reconnect it (regression for a prior bug that unconditionally emitted
/// `connect-network` for every configured endpoint regardless of live state).
#[tokio::test]
async fn update_on_steady_state_with_networks_does_not_reconnect() {
    let mut map = ContainerMap::new("m");
    map.networks.insert("front".to_string(), Default::default());
    map.containers.insert(
        "app".to_string(),
        ContainerConfig {
            image: Some("app".to_string()),
            networks: vec![docker_landscape::model::container::EndpointSpec {
                network: "front".to_string(),
                aliases: vec![],
                links: vec![],
                ipv4: None,
                ipv6: None,
                link_local_ips: vec![],
            }],
            ..Default::default()
        },
    );
    let graph = DependencyGraph::build(&map).unwrap();
    let backend = FakeDockerBackend::new();
    backend.seed_image("app:latest", "sha256:app-steady");
    let ctx = PlanContext { map: &map, graph: &graph, backend: &backend };

    let create_ops = plan_create(&ctx, &[container_root("app")]).await.unwrap();
    let mut runner = Runner::new("default", &backend);
    runner.run(create_ops).await.unwrap();
    let start_ops = plan_startup(&ctx, &[container_root("app")], &UpdateOptions::default())
        .await
        .unwrap();
    runner.run(start_ops).await.unwrap();

    let connects_during_start = backend
        .calls_snapshot()
        .into_iter()
        .filter(|c| matches!(c, docker_landscape::docker::fake::RecordedCall::ConnectNetwork(..)))
        .count();
    assert_eq!(connects_during_start, 1, "start should connect the endpoint exactly once");

    let ops = plan_update(&ctx, &[container_root("app")], &UpdateOptions::default())
        .await
        .unwrap();
    assert!(
        ops.is_empty(),
        "expected no ops once the endpoint is already connected, got {ops:?}"
    );
}
