use approx::assert_relative_eq;
use armature_core::{NodeContext, NodeOptions, ReconnectStrategy, UdpLink};
use armature_library::messages::{MarkerAction, MarkerPacket, SceneDraw, SceneLoad};
use armature_sim::prelude::*;
use armature_sim::visualization::{SCENE_DRAW_TOPIC, SCENE_LOAD_TOPIC};
use nalgebra::Isometry3;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PENDULUM_SDF: &str = r#"<?xml version="1.0"?>
<sdf version="1.7">
  <model name="pendulum">
    <link name="base">
      <inertial><mass>1</mass></inertial>
      <visual name="base_visual">
        <geometry><box><size>0.2 0.2 0.2</size></box></geometry>
      </visual>
    </link>
    <link name="pole">
      <pose>0 0 1 0 0 0</pose>
      <inertial>
        <pose>0.5 0 0 0 0 0</pose>
        <mass>1</mass>
        <inertia><ixx>0.001</ixx><iyy>0.02</iyy><izz>0.02</izz></inertia>
      </inertial>
      <visual name="pole_visual">
        <pose>0.5 0 0 0 1.5708 0</pose>
        <geometry><cylinder><radius>0.02</radius><length>1</length></cylinder></geometry>
      </visual>
    </link>
    <joint name="hinge" type="revolute">
      <parent>base</parent>
      <child>pole</child>
      <axis>
        <xyz>0 1 0</xyz>
        <limit><lower>-1e16</lower><upper>1e16</upper></limit>
      </axis>
    </joint>
  </model>
</sdf>"#;

fn node(name: &str) -> NodeContext {
    NodeContext::init(NodeOptions::new(name).disable_signals(true)).unwrap()
}

fn pendulum_builder() -> (DiagramBuilder, ModelInstanceIndex) {
    let mut builder = DiagramBuilder::new();
    let plant = builder
        .add_multibody_plant_scene_graph(PlantConfig::default())
        .unwrap();
    let model = Parser::new(plant)
        .add_model_from_string(PENDULUM_SDF, ModelFormat::Sdf)
        .unwrap();
    let base = plant.get_frame_by_name("base").unwrap();
    let world = plant.world_frame();
    plant.weld_frames(world, base, Isometry3::identity()).unwrap();
    plant.finalize().unwrap();
    no_control(&mut builder, model).unwrap();
    (builder, model)
}

fn unthrottled(mode: RunMode, steps: usize) -> DriverConfig {
    DriverConfig {
        mode,
        steps,
        realtime_rate: 0.0,
        readiness: ReadinessPolicy {
            require_all: false,
            strategy: ReconnectStrategy::testing(),
        },
        ..DriverConfig::default()
    }
}

#[test]
fn test_unactuated_pendulum_falls_under_gravity() {
    let (builder, model) = pendulum_builder();
    let diagram = builder.build().unwrap();
    let plant = diagram.plant();
    let hinge = plant.get_joint_by_name("hinge", model).unwrap();
    let base = plant.get_frame_by_name("base").unwrap();

    let mut simulator = Simulator::new(&diagram).unwrap();
    let start = plant.get_joint_position(simulator.get_context(), hinge).unwrap();
    simulator.advance_to(0.5).unwrap();
    let end = plant.get_joint_position(simulator.get_context(), hinge).unwrap();

    assert_relative_eq!(start, 0.0, epsilon = 1e-6);
    assert!(end.abs() > 0.05, "hinge stayed at {}", end);
    let x_wb = plant.calc_relative_transform(simulator.get_context(), plant.world_frame(), base);
    assert_relative_eq!(x_wb, Isometry3::identity(), epsilon = 1e-6);
}

#[test]
fn test_scene_topics_receive_load_once_and_periodic_draws() {
    let node = node("scene_topics");
    let loads = node.subscribe::<SceneLoad>(SCENE_LOAD_TOPIC).unwrap();
    let draws = node.subscribe::<SceneDraw>(SCENE_DRAW_TOPIC).unwrap();

    let (mut builder, _) = pendulum_builder();
    connect_scene_visualizer(&mut builder, &node, VisualizerConfig::default().with_publish_period(0.25))
        .unwrap();
    let diagram = builder.build().unwrap();

    let report = run_simulation(&diagram, &node, &unthrottled(RunMode::Iterative, 10)).unwrap();
    assert_relative_eq!(report.final_time, 1.0, epsilon = 1e-9);

    let loads = loads.drain();
    assert_eq!(loads.len(), 1);
    let frames: Vec<&str> = loads[0]
        .geometries
        .iter()
        .map(|g| g.frame_name.as_str())
        .collect();
    assert_eq!(frames, vec!["pendulum::base", "pendulum::pole"]);

    let stamps: Vec<f64> = draws.drain().iter().map(|d| d.timestamp).collect();
    assert_eq!(stamps.len(), 5);
    for (k, stamp) in stamps.iter().enumerate() {
        assert_relative_eq!(*stamp, k as f64 * 0.25, epsilon = 1e-9);
    }
    assert_eq!(report.listeners[0].stats.publishes, 5);
    assert_eq!(report.listeners[0].stats.send_failures, 0);
}

#[test]
fn test_single_shot_draws_exactly_once() {
    let node = node("scene_single_shot");
    let draws = node.subscribe::<SceneDraw>(SCENE_DRAW_TOPIC).unwrap();

    let (mut builder, _) = pendulum_builder();
    connect_scene_visualizer(&mut builder, &node, VisualizerConfig::default()).unwrap();
    let diagram = builder.build().unwrap();

    let report = run_simulation(&diagram, &node, &unthrottled(RunMode::SingleShot, 1000)).unwrap();

    assert_eq!(report.final_time, 0.0);
    assert_eq!(report.forced_publishes, 1);
    assert_eq!(report.steps, 0);
    let draws = draws.drain();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].timestamp, 0.0);
}

#[test]
fn test_marker_listener_handshake_and_traffic() {
    let stop = Arc::new(AtomicBool::new(false));
    let link = UdpLink::<MarkerPacket>::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)).unwrap();
    let addr = link.local_addr().unwrap();
    let listener = {
        let stop = stop.clone();
        thread::spawn(move || {
            let mut packets = Vec::new();
            while !stop.load(Ordering::Relaxed) {
                if let Ok(Some((packet, from))) = link.recv_timeout(Duration::from_millis(20)) {
                    if let MarkerPacket::Probe { nonce } = packet {
                        let _ = link.send_to(&MarkerPacket::Ack { nonce }, from);
                    } else {
                        packets.push(packet);
                    }
                }
            }
            packets
        })
    };

    let node = node("marker_traffic");
    let (mut builder, _) = pendulum_builder();
    connect_marker_visualizer(
        &mut builder,
        &node,
        addr,
        VisualizerConfig::default().with_publish_period(0.5),
    )
    .unwrap();
    let diagram = builder.build().unwrap();

    let mut config = unthrottled(RunMode::Iterative, 10);
    config.readiness.require_all = true;
    let report = run_simulation(&diagram, &node, &config).unwrap();
    assert!(report.listeners[0].ready);

    thread::sleep(Duration::from_millis(100));
    stop.store(true, Ordering::Relaxed);
    let packets = listener.join().unwrap();

    let MarkerPacket::Markers(first) = &packets[0] else {
        panic!("expected markers first, got {:?}", packets[0]);
    };
    assert_eq!(first.markers[0].action, MarkerAction::DeleteAll);
    assert_eq!(first.markers.len(), 3);

    let transforms: Vec<_> = packets
        .iter()
        .filter_map(|p| match p {
            MarkerPacket::Transforms(tf) => Some(tf),
            _ => None,
        })
        .collect();
    // t = 0, 0.5, 1.0
    assert_eq!(transforms.len(), 3);
    assert_eq!(transforms[0].transforms.len(), 2);
}

#[test]
fn test_required_listener_missing_aborts() {
    // Bound but never answering
    let silent = UdpLink::<MarkerPacket>::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)).unwrap();
    let node = node("marker_missing");
    let (mut builder, _) = pendulum_builder();
    connect_marker_visualizer(
        &mut builder,
        &node,
        silent.local_addr().unwrap(),
        VisualizerConfig::default(),
    )
    .unwrap();
    let diagram = builder.build().unwrap();

    let mut config = unthrottled(RunMode::Iterative, 10);
    config.readiness.require_all = true;
    assert!(matches!(
        run_simulation(&diagram, &node, &config),
        Err(SimError::ListenerNotReady(_))
    ));

    config.readiness.require_all = false;
    let report = run_simulation(&diagram, &node, &config).unwrap();
    assert!(!report.listeners[0].ready);
    assert_eq!(report.advance_calls, 10);
}
