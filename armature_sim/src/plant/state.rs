//! Engine-side plant state backed by rapier3d.
//!
//! Every plant body is one rigid body. Bodies welded (directly or through a
//! chain of fixed joints) to the world are `fixed`; everything else is
//! dynamic and held together by impulse joints whose free axis is aligned
//! with the joint axis. The engine works in f32; the plant API stays f64.

use super::{BodyIndex, Joint, ModelInstanceIndex, MultibodyPlant};
use crate::parsing::description::{Inertial, JointKind};
use nalgebra::{DVector, Isometry3, Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;
use std::collections::HashMap;
use std::fmt;

const MIN_MASS: f32 = 1e-3;
const MIN_INERTIA: f64 = 1e-6;

pub struct PlantState {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd: CCDSolver,
    params: IntegrationParameters,
    gravity: Vector3<f32>,
    /// Rigid body per plant body, indexed by `BodyIndex`
    handles: Vec<RigidBodyHandle>,
    /// Engine joint per plant joint; `None` when both sides are fixed
    joint_handles: Vec<Option<ImpulseJointHandle>>,
}

impl fmt::Debug for PlantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlantState")
            .field("bodies", &self.bodies.len())
            .field("joints", &self.impulse_joints.len())
            .field("dt", &self.params.dt)
            .finish()
    }
}

impl PlantState {
    pub(crate) fn new(plant: &MultibodyPlant) -> Self {
        let anchored = anchored_bodies(plant);

        let mut bodies = RigidBodySet::new();
        let mut handles = Vec::with_capacity(plant.num_bodies());
        for (i, body) in plant.bodies().iter().enumerate() {
            let builder = if anchored[i] {
                RigidBodyBuilder::fixed()
            } else {
                RigidBodyBuilder::dynamic().additional_mass_properties(mass_properties(body.inertial.as_ref()))
            };
            let rigid_body = builder
                .position(body.default_pose.cast::<f32>())
                .can_sleep(false)
                .build();
            handles.push(bodies.insert(rigid_body));
        }

        let mut impulse_joints = ImpulseJointSet::new();
        let mut joint_handles = Vec::with_capacity(plant.num_joints());
        for joint in plant.joints() {
            if anchored[joint.child.0] {
                joint_handles.push(None);
                continue;
            }
            let handle = impulse_joints.insert(
                handles[joint.parent.0],
                handles[joint.child.0],
                engine_joint(joint),
                true,
            );
            joint_handles.push(Some(handle));
        }

        let gravity = plant.config().gravity;
        let state = Self {
            bodies,
            colliders: ColliderSet::new(),
            impulse_joints,
            multibody_joints: MultibodyJointSet::new(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd: CCDSolver::new(),
            params: IntegrationParameters {
                dt: plant.time_step() as f32,
                ..Default::default()
            },
            gravity: Vector3::new(gravity[0] as f32, gravity[1] as f32, gravity[2] as f32),
            handles,
            joint_handles,
        };
        tracing::debug!("Created plant state: {:?}", state);
        state
    }

    /// Replace last step's efforts with the commanded ones.
    pub(crate) fn apply_actuation(
        &mut self,
        plant: &MultibodyPlant,
        actuation: &HashMap<ModelInstanceIndex, DVector<f64>>,
    ) {
        for handle in &self.handles {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.reset_forces(false);
                body.reset_torques(false);
            }
        }

        for (model, efforts) in actuation {
            let Ok(instance) = plant.model_instance(*model) else {
                continue;
            };
            for (k, actuator_index) in instance.actuators.iter().enumerate() {
                let actuator = plant.actuators()[*actuator_index];
                let effort = actuator.clamp(efforts.get(k).copied().unwrap_or(0.0));
                if effort == 0.0 {
                    continue;
                }
                let joint = plant.joint(actuator.joint);
                let wrench = (self.axis_in_world(joint) * effort).cast::<f32>();
                let (parent, child) = (self.handles[joint.parent.0], self.handles[joint.child.0]);
                match joint.kind {
                    JointKind::Prismatic => {
                        self.bodies[child].add_force(wrench, true);
                        self.bodies[parent].add_force(-wrench, true);
                    }
                    _ => {
                        self.bodies[child].add_torque(wrench, true);
                        self.bodies[parent].add_torque(-wrench, true);
                    }
                }
            }
        }
    }

    pub(crate) fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &(),
        );
    }

    /// X_WB
    pub fn body_pose(&self, body: BodyIndex) -> Isometry3<f64> {
        self.bodies[self.handles[body.0]].position().cast::<f64>()
    }

    pub fn num_engine_joints(&self) -> usize {
        self.joint_handles.iter().flatten().count()
    }

    pub fn is_body_fixed(&self, body: BodyIndex) -> bool {
        self.bodies[self.handles[body.0]].is_fixed()
    }

    pub(crate) fn positions(&self, plant: &MultibodyPlant) -> DVector<f64> {
        self.collect(plant, |joint| self.joint_position(joint))
    }

    pub(crate) fn velocities(&self, plant: &MultibodyPlant) -> DVector<f64> {
        self.collect(plant, |joint| self.joint_velocity(joint))
    }

    fn collect(&self, plant: &MultibodyPlant, value: impl Fn(&Joint) -> f64) -> DVector<f64> {
        let size = plant
            .joints()
            .iter()
            .filter(|j| j.position_start.is_some())
            .count();
        let mut out = DVector::zeros(size);
        for joint in plant.joints() {
            if let Some(start) = joint.position_start {
                out[start] = value(joint);
            }
        }
        out
    }

    /// Relative displacement of the child joint frame along or about the axis.
    pub(crate) fn joint_position(&self, joint: &Joint) -> f64 {
        let x_wjp = self.body_pose(joint.parent) * joint.frame_on_parent;
        let x_wjc = self.body_pose(joint.child) * joint.frame_on_child;
        let relative = x_wjp.inverse() * x_wjc;
        let axis = joint.axis.into_inner();
        match joint.kind {
            JointKind::Revolute | JointKind::Continuous => relative.rotation.scaled_axis().dot(&axis),
            JointKind::Prismatic => relative.translation.vector.dot(&axis),
            JointKind::Fixed => 0.0,
        }
    }

    fn joint_velocity(&self, joint: &Joint) -> f64 {
        let parent = &self.bodies[self.handles[joint.parent.0]];
        let child = &self.bodies[self.handles[joint.child.0]];
        let axis = self.axis_in_world(joint);
        match joint.kind {
            JointKind::Revolute | JointKind::Continuous => {
                (child.angvel() - parent.angvel()).cast::<f64>().dot(&axis)
            }
            JointKind::Prismatic => {
                let origin = (self.body_pose(joint.child) * joint.frame_on_child).translation.vector;
                let point = Point3::from(origin.cast::<f32>());
                (child.velocity_at_point(&point) - parent.velocity_at_point(&point))
                    .cast::<f64>()
                    .dot(&axis)
            }
            JointKind::Fixed => 0.0,
        }
    }

    fn axis_in_world(&self, joint: &Joint) -> Vector3<f64> {
        let r_wj = self.body_pose(joint.parent).rotation * joint.frame_on_parent.rotation;
        r_wj * joint.axis.into_inner()
    }
}

/// Bodies that reach the world through fixed joints only.
fn anchored_bodies(plant: &MultibodyPlant) -> Vec<bool> {
    (0..plant.num_bodies())
        .map(|b| {
            let mut body = BodyIndex(b);
            loop {
                if body.0 == 0 {
                    return true;
                }
                match plant.body(body).parent_joint {
                    Some(j) if plant.joint(j).kind == JointKind::Fixed => body = plant.joint(j).parent,
                    _ => return false,
                }
            }
        })
        .collect()
}

fn mass_properties(inertial: Option<&Inertial>) -> MassProperties {
    match inertial {
        Some(inertial) if inertial.mass > 0.0 => {
            let rotation = inertial.pose.rotation.to_rotation_matrix();
            let mut inertia = rotation.matrix() * inertial.inertia * rotation.matrix().transpose();
            for k in 0..3 {
                inertia[(k, k)] = inertia[(k, k)].max(MIN_INERTIA);
            }
            MassProperties::with_inertia_matrix(
                Point3::from(inertial.pose.translation.vector.cast::<f32>()),
                inertial.mass as f32,
                inertia.cast::<f32>(),
            )
        }
        _ => MassProperties::new(
            Point3::origin(),
            MIN_MASS,
            Vector3::repeat(MIN_INERTIA as f32),
        ),
    }
}

/// Rotation taking the x axis onto `axis`.
fn axis_alignment(axis: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::rotation_between(&Vector3::x(), axis).unwrap_or_else(|| {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI)
    })
}

fn engine_joint(joint: &Joint) -> GenericJoint {
    let align = axis_alignment(&joint.axis.into_inner());
    let frame1 = (joint.frame_on_parent * align).cast::<f32>();
    let frame2 = (joint.frame_on_child * align).cast::<f32>();

    let (mask, free_axis) = match joint.kind {
        JointKind::Revolute | JointKind::Continuous => {
            (JointAxesMask::LOCKED_REVOLUTE_AXES, Some(JointAxis::AngX))
        }
        JointKind::Prismatic => (JointAxesMask::LOCKED_PRISMATIC_AXES, Some(JointAxis::LinX)),
        JointKind::Fixed => (JointAxesMask::LOCKED_FIXED_AXES, None),
    };

    let mut builder = GenericJointBuilder::new(mask)
        .local_frame1(frame1)
        .local_frame2(frame2)
        .contacts_enabled(false);
    if let Some(axis) = free_axis {
        if joint.kind != JointKind::Continuous && joint.limits.has_position_limits() {
            builder = builder.limits(
                axis,
                [joint.limits.lower as f32, joint.limits.upper as f32],
            );
        }
    }

    let mut data = builder.build();
    if let Some(axis) = free_axis {
        if joint.damping > 0.0 {
            data.set_motor_model(axis, MotorModel::ForceBased);
            data.set_motor(axis, 0.0, 0.0, 0.0, joint.damping as f32);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::description::fixtures::two_link;
    use crate::plant::{FrameIndex, PlantConfig};
    use approx::assert_relative_eq;

    /// Base welded to world, arm swinging about y with its COM off the axis.
    fn pendulum(gravity: [f64; 3]) -> (MultibodyPlant, ModelInstanceIndex) {
        pendulum_with_range(gravity, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn pendulum_with_range(
        gravity: [f64; 3],
        lower: f64,
        upper: f64,
    ) -> (MultibodyPlant, ModelInstanceIndex) {
        let mut description = two_link("pendulum");
        description.joints[0].axis = Vector3::y();
        description.joints[0].limits.lower = lower;
        description.joints[0].limits.upper = upper;
        if let Some(inertial) = description.links[1].inertial.as_mut() {
            inertial.pose = Isometry3::translation(0.3, 0.0, 0.0);
        }

        let mut plant = MultibodyPlant::new(PlantConfig::default().with_gravity(gravity));
        let model = plant.add_model(description).unwrap();
        let base = plant.get_frame_by_name_in("base", model).unwrap();
        plant
            .weld_frames(FrameIndex(0), base, Isometry3::identity())
            .unwrap();
        plant.finalize().unwrap();
        (plant, model)
    }

    #[test]
    fn test_initial_state_matches_default_poses() {
        let (plant, _) = pendulum([0.0, 0.0, -9.81]);
        let state = plant.create_state().unwrap();

        assert!(state.is_body_fixed(BodyIndex(1)));
        assert!(!state.is_body_fixed(BodyIndex(2)));
        assert_eq!(state.num_engine_joints(), 1);
        assert_relative_eq!(state.body_pose(BodyIndex(2)).translation.z, 0.5, epsilon = 1e-6);
        assert_relative_eq!(state.positions(&plant)[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pendulum_swings_under_gravity() {
        let (plant, _) = pendulum([0.0, 0.0, -9.81]);
        let mut state = plant.create_state().unwrap();
        let base_before = state.body_pose(BodyIndex(1));

        for _ in 0..20 {
            plant.step(&mut state, &HashMap::new());
        }

        // COM at +x falls toward -z: positive rotation about y
        let q = state.positions(&plant)[0];
        assert!(q > 0.01, "q = {}", q);
        assert!(state.velocities(&plant)[0] > 0.0);
        assert_eq!(state.body_pose(BodyIndex(1)), base_before);
    }

    #[test]
    fn test_locked_joint_holds_under_gravity() {
        let (plant, _) = pendulum_with_range([0.0, 0.0, -9.81], 0.0, 0.0);
        let mut state = plant.create_state().unwrap();

        for _ in 0..20 {
            plant.step(&mut state, &HashMap::new());
        }

        let q = state.positions(&plant)[0];
        assert!(q.abs() < 1e-3, "q = {}", q);
    }

    #[test]
    fn test_torque_drives_joint_without_gravity() {
        let (plant, model) = pendulum([0.0, 0.0, 0.0]);
        let mut state = plant.create_state().unwrap();

        let mut actuation = HashMap::new();
        actuation.insert(model, DVector::from_element(1, 2.0));
        for _ in 0..10 {
            plant.step(&mut state, &actuation);
        }
        assert!(state.positions(&plant)[0] > 0.0);

        let mut idle = plant.create_state().unwrap();
        for _ in 0..10 {
            plant.step(&mut idle, &HashMap::new());
        }
        assert_relative_eq!(idle.positions(&plant)[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_axis_alignment() {
        for axis in [Vector3::x(), Vector3::y(), Vector3::z(), -Vector3::x()] {
            let rotated = axis_alignment(&axis) * Vector3::x();
            assert_relative_eq!(rotated, axis, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_massless_body_gets_minimum_mass() {
        let props = mass_properties(None);
        assert_relative_eq!(props.mass(), MIN_MASS);
    }
}
