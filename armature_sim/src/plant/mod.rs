//! Multibody plant: bodies, frames, joints and actuators of every model.
//!
//! A plant is built in two phases. While [`PlantPhase::Building`] models can
//! be added and frames welded; [`MultibodyPlant::finalize`] fixes the
//! topology and state layout, after which engine state can be created and
//! stepped.

mod state;
mod tree;

pub use state::PlantState;
pub use tree::{
    Actuator, Body, BodyIndex, Frame, FrameIndex, Joint, JointIndex, ModelInstance,
    ModelInstanceIndex, WORLD_BODY_NAME, WORLD_FRAME_NAME, WORLD_MODEL_NAME,
};

use crate::error::{SimError, SimResult};
use crate::geometry::{GeometryId, GeometryInstance};
use crate::parsing::description::{normalized_axis, JointKind, JointLimits, ModelDescription};
use crate::systems::Context;
use armature_library::messages::GeometryDescription;
use nalgebra::{DVector, Isometry3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Plant construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    /// Discrete update period in seconds
    pub time_step: f64,
    /// Gravity in the world frame (m/s^2)
    pub gravity: [f64; 3],
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            gravity: [0.0, 0.0, -9.81],
        }
    }
}

impl PlantConfig {
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_gravity(mut self, gravity: [f64; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantPhase {
    Building,
    Finalized,
}

/// Handle to a model's actuation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationPort {
    pub model: ModelInstanceIndex,
    pub size: usize,
}

pub struct MultibodyPlant {
    config: PlantConfig,
    phase: PlantPhase,
    models: Vec<ModelInstance>,
    bodies: Vec<Body>,
    frames: Vec<Frame>,
    joints: Vec<Joint>,
    actuators: Vec<Actuator>,
    geometries: Vec<GeometryInstance>,
    num_positions: usize,
}

impl MultibodyPlant {
    pub fn new(config: PlantConfig) -> Self {
        let world_body = Body {
            name: WORLD_BODY_NAME.to_string(),
            model: ModelInstanceIndex(0),
            inertial: None,
            model_pose: Isometry3::identity(),
            default_pose: Isometry3::identity(),
            parent_joint: None,
            body_frame: FrameIndex(0),
        };
        let world_frame = Frame {
            name: WORLD_FRAME_NAME.to_string(),
            body: BodyIndex(0),
            model: ModelInstanceIndex(0),
            pose_in_body: Isometry3::identity(),
        };
        let mut world_model = ModelInstance::new(WORLD_MODEL_NAME);
        world_model.bodies.push(BodyIndex(0));

        Self {
            config,
            phase: PlantPhase::Building,
            models: vec![world_model],
            bodies: vec![world_body],
            frames: vec![world_frame],
            joints: Vec::new(),
            actuators: Vec::new(),
            geometries: Vec::new(),
            num_positions: 0,
        }
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn time_step(&self) -> f64 {
        self.config.time_step
    }

    pub fn phase(&self) -> PlantPhase {
        self.phase
    }

    pub fn is_finalized(&self) -> bool {
        self.phase == PlantPhase::Finalized
    }

    fn require_building(&self, operation: &'static str) -> SimResult<()> {
        match self.phase {
            PlantPhase::Building => Ok(()),
            PlantPhase::Finalized => Err(SimError::PlantFinalized(operation)),
        }
    }

    fn require_finalized(&self, operation: &'static str) -> SimResult<()> {
        match self.phase {
            PlantPhase::Finalized => Ok(()),
            PlantPhase::Building => Err(SimError::PlantNotFinalized(operation)),
        }
    }

    /// Add a parsed model. Every link becomes a body with a body frame of the
    /// same name; movable joints with a non-zero effort limit get an actuator.
    pub fn add_model(&mut self, description: ModelDescription) -> SimResult<ModelInstanceIndex> {
        self.require_building("add_model")?;
        description.validate()?;
        if self.models.iter().any(|m| m.name == description.name) {
            return Err(SimError::DuplicateModel(description.name));
        }

        let model_index = ModelInstanceIndex(self.models.len());
        let mut model = ModelInstance::new(&description.name);
        let mut link_bodies: HashMap<&str, BodyIndex> = HashMap::new();

        for link in &description.links {
            let body_index = BodyIndex(self.bodies.len());
            let frame_index = FrameIndex(self.frames.len());
            self.frames.push(Frame {
                name: link.name.clone(),
                body: body_index,
                model: model_index,
                pose_in_body: Isometry3::identity(),
            });
            self.bodies.push(Body {
                name: link.name.clone(),
                model: model_index,
                inertial: link.inertial.clone(),
                model_pose: link.pose,
                default_pose: link.pose,
                parent_joint: None,
                body_frame: frame_index,
            });
            link_bodies.insert(link.name.as_str(), body_index);
            model.bodies.push(body_index);

            for visual in &link.visuals {
                let id = GeometryId(self.geometries.len());
                self.geometries.push(GeometryInstance {
                    id,
                    body: body_index,
                    description: GeometryDescription {
                        name: scoped_name(&description.name, &visual.name),
                        frame_name: scoped_name(&description.name, &link.name),
                        shape: visual.shape.clone(),
                        pose: visual.pose.into(),
                        color: visual.color,
                    },
                });
            }
        }

        for joint in &description.joints {
            let parent = link_bodies[joint.parent.as_str()];
            let child = link_bodies[joint.child.as_str()];
            let x_mp = self.bodies[parent.0].model_pose;
            let x_mc = self.bodies[child.0].model_pose;
            let axis = normalized_axis(&joint.axis).unwrap_or_else(Vector3::x_axis);

            let joint_index = JointIndex(self.joints.len());
            self.joints.push(Joint {
                name: joint.name.clone(),
                model: model_index,
                kind: joint.kind,
                parent,
                child,
                frame_on_parent: x_mp.inverse() * x_mc * joint.pose,
                frame_on_child: joint.pose,
                axis,
                limits: joint.limits.clone(),
                damping: joint.damping,
                position_start: None,
                is_weld: false,
            });
            self.bodies[child.0].parent_joint = Some(joint_index);
            model.joints.push(joint_index);

            if joint.is_actuated() {
                model.actuators.push(self.actuators.len());
                self.actuators.push(Actuator {
                    joint: joint_index,
                    model: model_index,
                    effort_limit: joint.limits.effort,
                });
            }
        }

        tracing::info!(
            "Added model '{}': {} bodies, {} joints, {} actuators, {} visuals",
            model.name,
            model.bodies.len(),
            model.joints.len(),
            model.actuators.len(),
            description.links.iter().map(|l| l.visuals.len()).sum::<usize>()
        );
        self.models.push(model);
        Ok(model_index)
    }

    pub fn num_model_instances(&self) -> usize {
        self.models.len()
    }

    pub fn model_instance(&self, model: ModelInstanceIndex) -> SimResult<&ModelInstance> {
        self.models
            .get(model.0)
            .ok_or(SimError::UnknownModel(model.0))
    }

    pub fn get_model_instance_by_name(&self, name: &str) -> Option<ModelInstanceIndex> {
        self.models
            .iter()
            .position(|m| m.name == name)
            .map(ModelInstanceIndex)
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn body(&self, body: BodyIndex) -> &Body {
        &self.bodies[body.0]
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn world_body(&self) -> BodyIndex {
        BodyIndex(0)
    }

    pub fn get_body_by_name(&self, name: &str, model: ModelInstanceIndex) -> SimResult<BodyIndex> {
        let instance = self.model_instance(model)?;
        instance
            .bodies
            .iter()
            .copied()
            .find(|b| self.bodies[b.0].name == name)
            .ok_or_else(|| SimError::FrameNotFound(scoped_name(&instance.name, name)))
    }

    pub fn frame(&self, frame: FrameIndex) -> &Frame {
        &self.frames[frame.0]
    }

    pub fn world_frame(&self) -> FrameIndex {
        FrameIndex(0)
    }

    /// Find a frame by name across every model.
    pub fn get_frame_by_name(&self, name: &str) -> SimResult<FrameIndex> {
        let matches: Vec<usize> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name == name)
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => Err(SimError::FrameNotFound(name.to_string())),
            [only] => Ok(FrameIndex(*only)),
            many => Err(SimError::AmbiguousFrame {
                name: name.to_string(),
                models: many
                    .iter()
                    .map(|i| self.models[self.frames[*i].model.0].name.clone())
                    .collect(),
            }),
        }
    }

    /// Find a frame by name within one model.
    pub fn get_frame_by_name_in(
        &self,
        name: &str,
        model: ModelInstanceIndex,
    ) -> SimResult<FrameIndex> {
        let instance = self.model_instance(model)?;
        self.frames
            .iter()
            .position(|f| f.model == model && f.name == name)
            .map(FrameIndex)
            .ok_or_else(|| SimError::FrameNotFound(scoped_name(&instance.name, name)))
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn joint(&self, joint: JointIndex) -> &Joint {
        &self.joints[joint.0]
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn get_joint_by_name(&self, name: &str, model: ModelInstanceIndex) -> SimResult<JointIndex> {
        let instance = self.model_instance(model)?;
        instance
            .joints
            .iter()
            .copied()
            .find(|j| self.joints[j.0].name == name)
            .ok_or_else(|| SimError::JointNotFound(scoped_name(&instance.name, name)))
    }

    /// Rigidly attach `child` to `parent` with `X_PC` between the frames.
    ///
    /// The child frame must belong to a root body, one with no inboard joint.
    /// Welding to the world frame makes that body fixed.
    pub fn weld_frames(
        &mut self,
        parent: FrameIndex,
        child: FrameIndex,
        x_pc: Isometry3<f64>,
    ) -> SimResult<JointIndex> {
        self.require_building("weld_frames")?;
        for frame in [parent, child] {
            if frame.0 >= self.frames.len() {
                return Err(SimError::FrameNotFound(frame.to_string()));
            }
        }

        let parent_frame = &self.frames[parent.0];
        let child_frame = &self.frames[child.0];
        let invalid = |reason: &str| SimError::InvalidWeld {
            parent: parent_frame.name.clone(),
            child: child_frame.name.clone(),
            reason: reason.to_string(),
        };

        let (parent_body, child_body) = (parent_frame.body, child_frame.body);
        if child_body.0 == 0 {
            return Err(invalid("the world body cannot be welded to another frame"));
        }
        if parent_body == child_body {
            return Err(invalid("both frames are on the same body"));
        }
        if let Some(existing) = self.bodies[child_body.0].parent_joint {
            let reason = if self.joints[existing.0].is_weld {
                format!("body is already welded by '{}'", self.joints[existing.0].name)
            } else {
                format!("body already has inboard joint '{}'", self.joints[existing.0].name)
            };
            return Err(invalid(&reason));
        }
        if self.is_ancestor(child_body, parent_body) {
            return Err(invalid("weld would close a kinematic loop"));
        }

        let joint_index = JointIndex(self.joints.len());
        let name = format!("{}_welds_to_{}", parent_frame.name, child_frame.name);
        let model = child_frame.model;
        let joint = Joint {
            name,
            model,
            kind: JointKind::Fixed,
            parent: parent_body,
            child: child_body,
            frame_on_parent: parent_frame.pose_in_body * x_pc,
            frame_on_child: child_frame.pose_in_body,
            axis: Vector3::x_axis(),
            limits: JointLimits::default(),
            damping: 0.0,
            position_start: None,
            is_weld: true,
        };

        tracing::info!("Welded '{}' to '{}'", child_frame.name, parent_frame.name);
        self.joints.push(joint);
        self.bodies[child_body.0].parent_joint = Some(joint_index);
        self.models[model.0].joints.push(joint_index);
        Ok(joint_index)
    }

    fn is_ancestor(&self, ancestor: BodyIndex, mut body: BodyIndex) -> bool {
        loop {
            if body == ancestor {
                return true;
            }
            match self.bodies[body.0].parent_joint {
                Some(joint) => body = self.joints[joint.0].parent,
                None => return false,
            }
        }
    }

    /// Fix the topology. Assigns state offsets and the zero-configuration
    /// world pose of every body.
    pub fn finalize(&mut self) -> SimResult<()> {
        self.require_building("finalize")?;
        self.config.validate()?;

        let mut offset = 0;
        for joint in &mut self.joints {
            if joint.num_positions() > 0 {
                joint.position_start = Some(offset);
                offset += joint.num_positions();
            }
        }
        self.num_positions = offset;

        let mut outboard: HashMap<BodyIndex, Vec<JointIndex>> = HashMap::new();
        for (i, joint) in self.joints.iter().enumerate() {
            outboard.entry(joint.parent).or_default().push(JointIndex(i));
        }

        // Roots keep their model pose (model placed at the world origin)
        let mut queue: VecDeque<BodyIndex> = (0..self.bodies.len())
            .map(BodyIndex)
            .filter(|b| self.bodies[b.0].parent_joint.is_none())
            .collect();
        while let Some(parent) = queue.pop_front() {
            let x_wp = self.bodies[parent.0].default_pose;
            for joint_index in outboard.get(&parent).into_iter().flatten() {
                let joint = &self.joints[joint_index.0];
                let x_wc = x_wp * joint.frame_on_parent * joint.frame_on_child.inverse();
                let child = joint.child;
                self.bodies[child.0].default_pose = x_wc;
                queue.push_back(child);
            }
        }

        let floating = (1..self.bodies.len())
            .filter(|b| self.bodies[*b].parent_joint.is_none())
            .count();
        if floating > 0 {
            tracing::warn!("{} body(ies) are not attached to the world and will fall freely", floating);
        }

        self.phase = PlantPhase::Finalized;
        tracing::info!(
            "Plant finalized: {} bodies, {} joints, {} positions, {} actuators (time_step = {}s)",
            self.bodies.len(),
            self.joints.len(),
            self.num_positions,
            self.actuators.len(),
            self.config.time_step
        );
        Ok(())
    }

    /// Actuator count of a model. Available in either phase.
    pub fn num_actuated_dofs(&self, model: ModelInstanceIndex) -> SimResult<usize> {
        Ok(self.model_instance(model)?.num_actuated_dofs())
    }

    pub fn num_actuators(&self) -> usize {
        self.actuators.len()
    }

    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    pub fn num_positions(&self) -> SimResult<usize> {
        self.require_finalized("num_positions")?;
        Ok(self.num_positions)
    }

    pub fn num_velocities(&self) -> SimResult<usize> {
        self.require_finalized("num_velocities")?;
        Ok(self.num_positions)
    }

    pub fn get_actuation_input_port(&self, model: ModelInstanceIndex) -> SimResult<ActuationPort> {
        self.require_finalized("get_actuation_input_port")?;
        Ok(ActuationPort {
            model,
            size: self.num_actuated_dofs(model)?,
        })
    }

    /// Visual geometry registered while adding models
    pub fn geometries(&self) -> &[GeometryInstance] {
        &self.geometries
    }

    /// Scene frame name of a body, `<model>::<body>`.
    pub fn body_frame_name(&self, body: BodyIndex) -> String {
        if body.0 == 0 {
            return WORLD_FRAME_NAME.to_string();
        }
        let body = &self.bodies[body.0];
        scoped_name(&self.models[body.model.0].name, &body.name)
    }

    /// Build engine state at the zero configuration.
    pub fn create_state(&self) -> SimResult<PlantState> {
        self.require_finalized("create_state")?;
        Ok(PlantState::new(self))
    }

    /// Advance engine state by one time step with the given per-model efforts.
    pub(crate) fn step(
        &self,
        state: &mut PlantState,
        actuation: &HashMap<ModelInstanceIndex, DVector<f64>>,
    ) {
        state.apply_actuation(self, actuation);
        state.step();
    }

    pub fn get_positions(&self, context: &Context) -> DVector<f64> {
        context.plant_state().positions(self)
    }

    pub fn get_velocities(&self, context: &Context) -> DVector<f64> {
        context.plant_state().velocities(self)
    }

    /// q of one joint, `None` for fixed joints
    pub fn get_joint_position(&self, context: &Context, joint: JointIndex) -> Option<f64> {
        let joint_ref = &self.joints[joint.0];
        joint_ref
            .position_start
            .map(|_| context.plant_state().joint_position(joint_ref))
    }

    /// X_WB
    pub fn eval_body_pose_in_world(&self, context: &Context, body: BodyIndex) -> Isometry3<f64> {
        context.plant_state().body_pose(body)
    }

    /// X_AB, the pose of frame B in frame A.
    pub fn calc_relative_transform(
        &self,
        context: &Context,
        frame_a: FrameIndex,
        frame_b: FrameIndex,
    ) -> Isometry3<f64> {
        let state = context.plant_state();
        let x_wa = self.frame_pose_in_world(state, frame_a);
        let x_wb = self.frame_pose_in_world(state, frame_b);
        x_wa.inverse() * x_wb
    }

    pub(crate) fn frame_pose_in_world(&self, state: &PlantState, frame: FrameIndex) -> Isometry3<f64> {
        let frame = &self.frames[frame.0];
        state.body_pose(frame.body) * frame.pose_in_body
    }
}

pub(crate) fn scoped_name(model: &str, element: &str) -> String {
    format!("{}::{}", model, element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::description::fixtures::two_link;
    use approx::assert_relative_eq;

    fn welded_plant() -> (MultibodyPlant, ModelInstanceIndex) {
        let mut plant = MultibodyPlant::new(PlantConfig::default());
        let model = plant.add_model(two_link("arm")).unwrap();
        let base = plant.get_frame_by_name("base").unwrap();
        plant
            .weld_frames(plant.world_frame(), base, Isometry3::identity())
            .unwrap();
        (plant, model)
    }

    #[test]
    fn test_world_elements() {
        let plant = MultibodyPlant::new(PlantConfig::default());
        assert_eq!(plant.num_bodies(), 1);
        assert_eq!(plant.frame(plant.world_frame()).name, "world");
        assert_eq!(plant.get_frame_by_name("world").unwrap(), FrameIndex(0));
        assert_eq!(plant.phase(), PlantPhase::Building);
    }

    #[test]
    fn test_actuated_dofs_before_finalize() {
        let (plant, model) = welded_plant();
        assert_eq!(plant.num_actuated_dofs(model).unwrap(), 1);
        assert!(matches!(
            plant.num_positions(),
            Err(SimError::PlantNotFinalized(_))
        ));
        assert!(matches!(
            plant.get_actuation_input_port(model),
            Err(SimError::PlantNotFinalized(_))
        ));
    }

    #[test]
    fn test_finalize_lifecycle() {
        let (mut plant, model) = welded_plant();
        plant.finalize().unwrap();
        assert!(plant.is_finalized());
        assert_eq!(plant.num_positions().unwrap(), 1);
        assert_eq!(plant.get_actuation_input_port(model).unwrap().size, 1);

        assert!(matches!(plant.finalize(), Err(SimError::PlantFinalized(_))));
        assert!(matches!(
            plant.add_model(two_link("other")),
            Err(SimError::PlantFinalized(_))
        ));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut plant = MultibodyPlant::new(PlantConfig::default());
        plant.add_model(two_link("arm")).unwrap();
        assert!(matches!(
            plant.add_model(two_link("arm")),
            Err(SimError::DuplicateModel(name)) if name == "arm"
        ));
    }

    #[test]
    fn test_frame_lookup_scoping() {
        let mut plant = MultibodyPlant::new(PlantConfig::default());
        let first = plant.add_model(two_link("left")).unwrap();
        plant.add_model(two_link("right")).unwrap();

        assert!(matches!(
            plant.get_frame_by_name("base"),
            Err(SimError::AmbiguousFrame { models, .. }) if models == vec!["left", "right"]
        ));
        let frame = plant.get_frame_by_name_in("base", first).unwrap();
        assert_eq!(plant.frame(frame).model, first);
        assert!(matches!(
            plant.get_frame_by_name("elbow"),
            Err(SimError::FrameNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_welds() {
        let (mut plant, model) = welded_plant();
        let base = plant.get_frame_by_name_in("base", model).unwrap();
        let arm = plant.get_frame_by_name_in("arm", model).unwrap();

        // already welded
        assert!(matches!(
            plant.weld_frames(plant.world_frame(), base, Isometry3::identity()),
            Err(SimError::InvalidWeld { .. })
        ));
        // has an inboard joint
        assert!(matches!(
            plant.weld_frames(plant.world_frame(), arm, Isometry3::identity()),
            Err(SimError::InvalidWeld { .. })
        ));
        // world as child
        assert!(matches!(
            plant.weld_frames(arm, plant.world_frame(), Isometry3::identity()),
            Err(SimError::InvalidWeld { .. })
        ));
    }

    #[test]
    fn test_default_poses_follow_weld_offset() {
        let mut plant = MultibodyPlant::new(PlantConfig::default());
        let model = plant.add_model(two_link("arm")).unwrap();
        let base = plant.get_frame_by_name_in("base", model).unwrap();
        plant
            .weld_frames(
                plant.world_frame(),
                base,
                Isometry3::translation(1.0, 0.0, 0.0),
            )
            .unwrap();
        plant.finalize().unwrap();

        let arm = plant.get_body_by_name("arm", model).unwrap();
        let pose = plant.body(arm).default_pose;
        assert_relative_eq!(pose.translation.x, 1.0);
        assert_relative_eq!(pose.translation.z, 0.5);
    }

    #[test]
    fn test_invalid_time_step() {
        let mut plant = MultibodyPlant::new(PlantConfig::default().with_time_step(0.0));
        assert!(matches!(plant.finalize(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_geometry_frames_are_scoped() {
        let mut description = two_link("arm");
        description.links[1].visuals.push(crate::parsing::description::VisualDescription {
            name: "arm_visual".to_string(),
            pose: Isometry3::identity(),
            shape: armature_library::messages::Shape::Sphere { radius: 0.1 },
            color: [1.0, 0.0, 0.0, 1.0],
        });
        let mut plant = MultibodyPlant::new(PlantConfig::default());
        plant.add_model(description).unwrap();
        let geometry = &plant.geometries()[0];
        assert_eq!(geometry.description.frame_name, "arm::arm");
        assert_eq!(plant.body_frame_name(geometry.body), "arm::arm");
    }
}
