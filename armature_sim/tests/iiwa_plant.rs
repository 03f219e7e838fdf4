use approx::assert_relative_eq;
use armature_sim::prelude::*;
use nalgebra::Isometry3;

const IIWA: &str = "armature/manipulation/models/iiwa_description/iiwa7/iiwa7_no_collision.sdf";

fn iiwa_builder() -> (DiagramBuilder, ModelInstanceIndex) {
    let mut builder = DiagramBuilder::new();
    let plant = builder
        .add_multibody_plant_scene_graph(PlantConfig::default())
        .unwrap();
    let path = ResourceLocator::standard(&[]).find_resource(IIWA).unwrap();
    let arm = Parser::new(plant).add_model_from_file(&path).unwrap();
    let base = plant.get_frame_by_name("iiwa_link_0").unwrap();
    let world = plant.world_frame();
    plant.weld_frames(world, base, Isometry3::identity()).unwrap();
    plant.finalize().unwrap();
    (builder, arm)
}

#[test]
fn test_bundled_iiwa_topology() {
    let (builder, arm) = iiwa_builder();
    let plant = builder.plant().unwrap();

    assert_eq!(plant.model_instance(arm).unwrap().name, "iiwa7");
    assert_eq!(plant.num_actuated_dofs(arm).unwrap(), 7);
    assert_eq!(plant.num_positions().unwrap(), 7);
    assert_eq!(plant.num_velocities().unwrap(), 7);
    // world + 8 links
    assert_eq!(plant.num_bodies(), 9);
    // 7 revolute joints + the base weld
    assert_eq!(plant.num_joints(), 8);
    assert!(plant.get_joint_by_name("iiwa_joint_7", arm).is_ok());
}

#[test]
fn test_lifecycle_is_irreversible() {
    let (mut builder, _) = iiwa_builder();
    let plant = builder.plant_mut().unwrap();

    assert!(matches!(plant.finalize(), Err(SimError::PlantFinalized(_))));

    let path = ResourceLocator::standard(&[]).find_resource(IIWA).unwrap();
    assert!(matches!(
        Parser::new(plant).add_model_from_file(&path),
        Err(SimError::PlantFinalized(_))
    ));
}

#[test]
fn test_missing_resource_fails_before_construction() {
    let result = resolve_resource("armature/manipulation/models/does_not_exist.sdf");
    assert!(matches!(result, Err(SimError::ResourceNotFound { .. })));
}

#[test]
fn test_unknown_base_frame() {
    let mut builder = DiagramBuilder::new();
    let plant = builder
        .add_multibody_plant_scene_graph(PlantConfig::default())
        .unwrap();
    let path = resolve_resource(IIWA).unwrap();
    Parser::new(plant).add_model_from_file(&path).unwrap();
    assert!(matches!(
        plant.get_frame_by_name("iiwa_link_base"),
        Err(SimError::FrameNotFound(_))
    ));
}

#[test]
fn test_welded_base_stays_at_world_origin() {
    let (mut builder, arm) = iiwa_builder();
    no_control(&mut builder, arm).unwrap();
    let diagram = builder.build().unwrap();
    let plant = diagram.plant();
    let world = plant.world_frame();
    let base = plant.get_frame_by_name("iiwa_link_0").unwrap();

    let mut simulator = Simulator::new(&diagram).unwrap();
    for k in 1..=10 {
        simulator.advance_to(k as f64 * 0.1).unwrap();
        let x_wb = plant.calc_relative_transform(simulator.get_context(), world, base);
        assert_relative_eq!(x_wb, Isometry3::identity(), epsilon = 1e-6);
        assert_eq!(
            diagram
                .eval_actuation_input(simulator.get_context(), arm)
                .unwrap()
                .len(),
            7
        );
    }

    let q = plant.get_positions(simulator.get_context());
    assert_eq!(q.len(), 7);
    assert!(q.iter().all(|v| v.is_finite()));
    assert_eq!(simulator.get_context().step_count(), 100);

    // Offset link COMs put a gravity torque on the horizontal joints, so the
    // unactuated arm drifts away from its upright start
    let v = plant.get_velocities(simulator.get_context());
    assert!(q.amax() > 1e-6, "q = {}", q.transpose());
    assert!(v.amax() > 1e-6, "v = {}", v.transpose());
}
