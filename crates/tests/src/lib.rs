//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 示例配置文档的合约测试
//! - 场景生命周期 + publish loop 的 e2e 测试（mock 引擎）
//! - JSON-lines TCP 服务端点的 e2e 测试

#[cfg(test)]
mod support {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use bridge::ScenarioController;
    use config_loader::DocumentResolver;
    use contracts::{RoadEdge, RoadInfo, SensorDefinitionCatalog};
    use sim_client::{MockConfig, MockRoad, MockSimClient, SensorRegistry, SimClient};

    /// Path of a document under the repository's `config/` directory
    pub fn config_path(relative: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../config")
            .join(relative)
    }

    pub fn catalog() -> SensorDefinitionCatalog {
        DocumentResolver::new(None)
            .load_catalog(&[config_path("sensors.json")])
            .unwrap()
    }

    /// One drivable road with two edges and one decoration
    pub fn roads() -> Vec<MockRoad> {
        let edge = |x: f64| RoadEdge {
            left: [x, 1.0, 0.0],
            middle: [x, 0.0, 0.0],
            right: [x, -1.0, 0.0],
        };
        vec![
            MockRoad {
                info: RoadInfo {
                    id: "main".into(),
                    drivability: "1".into(),
                },
                edges: vec![edge(0.0), edge(10.0)],
            },
            MockRoad {
                info: RoadInfo {
                    id: "fence".into(),
                    drivability: RoadInfo::NOT_DRIVABLE.into(),
                },
                edges: vec![edge(5.0)],
            },
        ]
    }

    pub async fn controller(
        config: MockConfig,
    ) -> (Arc<MockSimClient>, Arc<ScenarioController<MockSimClient>>) {
        let mock = Arc::new(MockSimClient::with_config(MockConfig {
            roads: roads(),
            ..config
        }));
        bridge::connect_engine(mock.as_ref(), "localhost", 64256)
            .await
            .unwrap();
        let controller = ScenarioController::new(
            Arc::clone(&mock),
            SensorRegistry::with_defaults(),
            catalog(),
            DocumentResolver::new(None),
        );
        (mock, Arc::new(controller))
    }

    pub async fn disconnect(mock: &MockSimClient) {
        mock.disconnect().await.unwrap();
    }
}

#[cfg(test)]
mod contract_tests {
    use super::support::{catalog, config_path};
    use bridge::SensorAssembler;
    use config_loader::{ConfigLoader, DocumentResolver};
    use sim_client::SensorRegistry;

    #[test]
    fn sample_documents_are_valid() {
        let registry = SensorRegistry::with_defaults();
        let catalog = catalog();
        registry.validate_catalog(&catalog).unwrap();

        let resolver = DocumentResolver::new(None);
        let scenario = resolver
            .load_scenario(&config_path("scenarios/example.json"))
            .unwrap();
        let vehicle = resolver
            .load_vehicle(&config_path("vehicles/etk800.json"))
            .unwrap();

        let assembler = SensorAssembler::new(&registry, &catalog);
        for spec in scenario.vehicles.iter().chain([&vehicle]) {
            assembler.check_vehicle(spec).unwrap();
        }
        assert!(scenario.network_visualization_enabled());
        assert!(!scenario.starts_paused());
    }

    #[test]
    fn sample_settings_load() {
        let settings = ConfigLoader::load_from_path(&config_path("bridge.toml")).unwrap();
        assert_eq!(settings.engine.port, 64256);
        assert_eq!(settings.sinks.len(), 1);
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::support::{config_path, controller, disconnect};
    use bridge::LifecycleState;
    use serde_json::json;
    use sim_client::MockConfig;

    #[tokio::test]
    async fn example_scenario_builds_full_session() {
        let (mock, controller) = controller(MockConfig::default()).await;
        let session = controller
            .start_scenario(&config_path("scenarios/example.json"))
            .await
            .unwrap();

        assert_eq!(controller.state(), LifecycleState::Running);
        assert!(session.is_running());
        assert_eq!(session.scenario_name(), Some("example"));
        assert_eq!(
            session.topics(),
            [
                "sim_bridge/ego_vehicle/state",
                "sim_bridge/traffic_1/state",
                "sim_bridge/ego_vehicle/front_cam",
                "sim_bridge/ego_vehicle/lidar0",
                "sim_bridge/ego_vehicle/imu0",
                // derived sensors attach after every primary
                "sim_bridge/ego_vehicle/front_cam_noise",
                "sim_bridge/road_network",
            ]
        );
        // derived sensors get no mount transform
        assert_eq!(session.static_transforms().len(), 3);

        assert_eq!(mock.weather().as_deref(), Some("sunny_noon"));
        assert_eq!(mock.time_of_day(), Some(0.5));
        assert!(!mock.is_paused());

        let attached = mock.attached_sensors();
        let handle_of = |name: &str| {
            attached
                .iter()
                .find(|(_, _, config)| config.name == name)
                .map(|(handle, _, config)| (*handle, config.clone()))
                .unwrap()
        };
        let (cam_handle, _) = handle_of("front_cam");
        let (_, noise) = handle_of("front_cam_noise");
        assert_eq!(noise.base_handle, Some(cam_handle));

        // spec properties win over catalog defaults
        let (_, lidar) = handle_of("lidar0");
        assert_eq!(lidar.properties["vertical_resolution"], json!(32));
        assert_eq!(lidar.properties["frequency"], json!(20));

        disconnect(&mock).await;
    }

    #[tokio::test]
    async fn second_scenario_replaces_the_first() {
        let (mock, controller) = controller(MockConfig::default()).await;
        controller
            .start_scenario(&config_path("scenarios/example.json"))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second.json");
        std::fs::write(
            &second,
            json!({
                "level": "gridmap",
                "name": "second",
                "mode": "paused",
                "vehicles": [{
                    "name": "solo",
                    "model": "pickup",
                    "position": [0, 0, 0],
                    "rotation": [0, 0, 0, 1],
                    "sensors_automation": [
                        { "name": "cam", "type": "Camera.default", "position": [0, 0, 2], "rotation": [0, -1] }
                    ]
                }]
            })
            .to_string(),
        )
        .unwrap();

        let session = controller.start_scenario(&second).await.unwrap();
        assert_eq!(session.scenario_name(), Some("second"));
        assert_eq!(session.topics(), ["sim_bridge/solo/state", "sim_bridge/solo/cam"]);
        assert_eq!(controller.slot().current().topics(), session.topics());
        assert!(mock.is_paused());
        assert_eq!(mock.last_scenario().map(|s| s.name), Some("second".to_string()));
    }

    #[tokio::test]
    async fn failed_start_keeps_running_session() {
        let (_mock, controller) = controller(MockConfig::default()).await;
        controller
            .start_scenario(&config_path("scenarios/example.json"))
            .await
            .unwrap();

        assert!(controller
            .start_scenario(&config_path("scenarios/missing.json"))
            .await
            .is_err());
        let current = controller.slot().current();
        assert_eq!(current.scenario_name(), Some("example"));
        assert!(current.is_running());
        assert_eq!(controller.state(), LifecycleState::Running);
    }
}

#[cfg(test)]
mod publish_tests {
    use std::time::Duration;

    use super::support::{config_path, controller};
    use bridge::{MemorySink, PublishLoop, SinkHandle, SinkSet};
    use contracts::{Publication, PublicationKind};
    use sim_client::MockConfig;
    use tokio::sync::watch;

    /// End-to-end: ScenarioController -> BridgeSession -> PublishLoop -> MemorySink
    #[tokio::test]
    async fn publish_loop_streams_running_scenario() {
        let (mock, controller) = controller(MockConfig::default()).await;
        controller
            .start_scenario(&config_path("scenarios/example.json"))
            .await
            .unwrap();

        let memory = MemorySink::new("memory");
        let sinks = SinkSet::new(vec![SinkHandle::spawn(memory.clone(), 1024)]);
        let publish = PublishLoop::new(mock, controller.slot(), sinks, 100.0).unwrap();

        let (tx, rx) = watch::channel(false);
        let runner = tokio::spawn(publish.run(rx));
        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(true).unwrap();
        let summary = runner.await.unwrap();
        assert!(summary.active_ticks >= 1);
        assert_eq!(summary.active_ticks, summary.total_ticks);

        let publications = memory.publications();
        let count = |kind: PublicationKind| publications.iter().filter(|p| p.kind() == kind).count() as u64;
        assert_eq!(count(PublicationKind::StaticTransform), 3 * summary.active_ticks);
        assert_eq!(count(PublicationKind::VehicleState), 2 * summary.active_ticks);
        // the engine never steps here, so each sensor has exactly one frame
        assert_eq!(count(PublicationKind::SensorSample), 4);
        assert_eq!(count(PublicationKind::RoadNetwork), 1);

        let network = publications
            .iter()
            .find_map(|p| match p {
                Publication::RoadNetwork(sample) => Some(sample),
                _ => None,
            })
            .unwrap();
        assert_eq!(network.polylines.len(), 2);
        assert!(network.polylines.iter().all(|l| l.road_id == "main" && l.points.len() == 2));

        // every tick opens with its transforms
        assert_eq!(publications[0].kind(), PublicationKind::StaticTransform);
    }
}

#[cfg(test)]
mod service_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::support::{config_path, controller};
    use bridge::{BridgeServices, ServiceServer};
    use contracts::{ReplyBody, ReplyEnvelope, ServiceResponse, StepFeedback, StepResult};
    use serde_json::{json, Value};
    use sim_client::{MockConfig, MockSimClient};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::watch;

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        write: OwnedWriteHalf,
    }

    impl Client {
        async fn send(&mut self, value: Value) {
            let mut line = value.to_string();
            line.push('\n');
            self.write.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> ReplyEnvelope {
            let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn call(&mut self, id: u64, request: Value) -> ServiceResponse {
            let mut request = request;
            request["id"] = json!(id);
            self.send(request).await;
            let reply = self.recv().await;
            assert_eq!(reply.id, id);
            match reply.body {
                ReplyBody::Response(response) => response,
                other => panic!("unexpected reply {other:?}"),
            }
        }
    }

    async fn serve(config: MockConfig) -> (Client, Arc<MockSimClient>, watch::Sender<bool>) {
        let (mock, controller) = controller(config).await;
        let server = ServiceServer::new(BridgeServices::new(controller));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(server.serve(listener, rx));

        let (read, write) = TcpStream::connect(addr).await.unwrap().into_split();
        let client = Client {
            lines: BufReader::new(read).lines(),
            write,
        };
        (client, mock, tx)
    }

    fn example() -> String {
        config_path("scenarios/example.json").display().to_string()
    }

    #[tokio::test]
    async fn scenario_control_over_tcp() {
        let (mut client, mock, _shutdown) = serve(MockConfig::default()).await;

        let response = client
            .call(1, json!({ "service": "start_scenario", "path_to_scenario_definition": example() }))
            .await;
        assert!(matches!(response, ServiceResponse::StartScenario(r) if r.success));

        match client.call(2, json!({ "service": "get_scenario_state" })).await {
            ServiceResponse::GetScenarioState(r) => {
                assert!(r.state.loaded && r.state.running);
                assert_eq!(r.state.scenario_name, "example");
                assert_eq!(r.state.level_name, "italy");
                assert_eq!(r.state.vehicle_ids, ["ego_vehicle", "traffic_1"]);
            }
            other => panic!("unexpected response {other:?}"),
        }

        let spawn = json!({
            "service": "spawn_vehicle",
            "name": "late",
            "pos": [1.0, 2.0, 0.5],
            "rot_quat": [0.0, 0.0, 0.0, 1.0],
            "path_to_vehicle_config_file": config_path("vehicles/etk800.json").display().to_string(),
        });
        assert!(matches!(client.call(3, spawn).await, ServiceResponse::SpawnVehicle(r) if r.success));

        match client.call(4, json!({ "service": "get_current_vehicles" })).await {
            ServiceResponse::GetCurrentVehicles(r) => {
                let ids: Vec<_> = r.vehicles.iter().map(|v| v.vehicle_id.as_str()).collect();
                assert_eq!(ids, ["ego_vehicle", "traffic_1", "late"]);
            }
            other => panic!("unexpected response {other:?}"),
        }

        let teleport = json!({
            "service": "teleport_vehicle",
            "vehicle_id": "nobody",
            "pos": [0.0, 0.0, 0.0],
            "rot_quat": [0.0, 0.0, 0.0, 1.0],
        });
        assert!(matches!(client.call(5, teleport).await, ServiceResponse::TeleportVehicle(r) if !r.success));

        assert!(matches!(client.call(6, json!({ "service": "pause" })).await, ServiceResponse::Pause(r) if r.success));
        assert!(mock.is_paused());
        assert!(matches!(client.call(7, json!({ "service": "resume" })).await, ServiceResponse::Resume(r) if r.success));
        assert!(!mock.is_paused());
    }

    #[tokio::test]
    async fn step_streams_feedback_then_result() {
        let (mut client, mock, _shutdown) = serve(MockConfig::default()).await;
        client
            .call(1, json!({ "service": "start_scenario", "path_to_scenario_definition": example() }))
            .await;

        client
            .send(json!({ "id": 2, "service": "step", "total_number_of_steps": 25, "feedback_cycle_size": 10 }))
            .await;

        let mut feedback = Vec::new();
        let result = loop {
            let reply = client.recv().await;
            assert_eq!(reply.id, 2);
            match reply.body {
                ReplyBody::Feedback(StepFeedback { steps_completed }) => feedback.push(steps_completed),
                ReplyBody::Result(result) => break result,
                other => panic!("unexpected reply {other:?}"),
            }
        };

        assert_eq!(feedback, [10, 20, 25]);
        assert_eq!(
            result,
            StepResult {
                success: true,
                steps_completed: 25
            }
        );
        assert_eq!(mock.step_log(), [10, 10, 5]);
        assert_eq!(mock.frame(), 25);
    }

    #[tokio::test]
    async fn cancel_preempts_running_step() {
        let (mut client, mock, _shutdown) = serve(MockConfig {
            step_delay: Some(Duration::from_millis(50)),
            ..MockConfig::default()
        })
        .await;
        client
            .call(1, json!({ "service": "start_scenario", "path_to_scenario_definition": example() }))
            .await;

        client
            .send(json!({ "id": 2, "service": "step", "total_number_of_steps": 100, "feedback_cycle_size": 10 }))
            .await;
        let first = client.recv().await;
        assert_eq!(first.body, ReplyBody::Feedback(StepFeedback { steps_completed: 10 }));

        client.send(json!({ "id": 3, "service": "cancel_step" })).await;

        let mut accepted = None;
        let preempted = loop {
            let reply = client.recv().await;
            match (reply.id, reply.body) {
                (3, ReplyBody::Response(ServiceResponse::CancelStep { accepted: a })) => accepted = Some(a),
                (2, ReplyBody::Feedback(_)) => {}
                (2, ReplyBody::Preempted(result)) => break result,
                (id, body) => panic!("unexpected reply {id}: {body:?}"),
            }
        };
        if accepted.is_none() {
            let reply = client.recv().await;
            assert_eq!(reply.id, 3);
            accepted = match reply.body {
                ReplyBody::Response(ServiceResponse::CancelStep { accepted }) => Some(accepted),
                other => panic!("unexpected reply {other:?}"),
            };
        }

        assert_eq!(accepted, Some(true));
        assert!(!preempted.success);
        assert!(preempted.steps_completed < 100);
        assert_eq!(mock.step_log().iter().sum::<u32>(), preempted.steps_completed);
    }
}
