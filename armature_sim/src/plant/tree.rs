//! Topology elements owned by a [`MultibodyPlant`](super::MultibodyPlant).

use crate::parsing::description::{Inertial, JointKind, JointLimits};
use nalgebra::{Isometry3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_index!(
    /// One parsed model inside a plant. Index 0 is the world model.
    ModelInstanceIndex
);
define_index!(
    /// Index 0 is the world body.
    BodyIndex
);
define_index!(
    /// Index 0 is the world frame.
    FrameIndex
);
define_index!(JointIndex);

pub const WORLD_MODEL_NAME: &str = "WorldModelInstance";
pub const WORLD_BODY_NAME: &str = "world";
pub const WORLD_FRAME_NAME: &str = "world";

#[derive(Debug, Clone)]
pub struct ModelInstance {
    pub name: String,
    pub bodies: Vec<BodyIndex>,
    pub joints: Vec<JointIndex>,
    /// Indices into the plant actuator list, in joint order
    pub actuators: Vec<usize>,
}

impl ModelInstance {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bodies: Vec::new(),
            joints: Vec::new(),
            actuators: Vec::new(),
        }
    }

    pub fn num_actuated_dofs(&self) -> usize {
        self.actuators.len()
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub name: String,
    pub model: ModelInstanceIndex,
    pub inertial: Option<Inertial>,
    /// X_MB as described by the model
    pub model_pose: Isometry3<f64>,
    /// X_WB at the zero configuration, computed by finalize
    pub default_pose: Isometry3<f64>,
    /// Inboard joint (or weld), `None` for roots
    pub parent_joint: Option<JointIndex>,
    pub body_frame: FrameIndex,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    pub body: BodyIndex,
    pub model: ModelInstanceIndex,
    /// X_BF
    pub pose_in_body: Isometry3<f64>,
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub model: ModelInstanceIndex,
    pub kind: JointKind,
    pub parent: BodyIndex,
    pub child: BodyIndex,
    /// Joint frame on the parent body, X_PJ
    pub frame_on_parent: Isometry3<f64>,
    /// Joint frame on the child body, X_CJ
    pub frame_on_child: Isometry3<f64>,
    /// Motion axis in the joint frame
    pub axis: Unit<Vector3<f64>>,
    pub limits: JointLimits,
    pub damping: f64,
    /// Offset into q and v, assigned by finalize
    pub position_start: Option<usize>,
    /// True for joints created by `weld_frames`
    pub is_weld: bool,
}

impl Joint {
    pub fn num_positions(&self) -> usize {
        self.kind.num_dofs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuator {
    pub joint: JointIndex,
    pub model: ModelInstanceIndex,
    /// `None` means unbounded
    pub effort_limit: Option<f64>,
}

impl Actuator {
    /// Clamp a commanded effort to the joint effort limit.
    pub fn clamp(&self, effort: f64) -> f64 {
        match self.effort_limit {
            Some(limit) => effort.clamp(-limit, limit),
            None => effort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_display() {
        assert_eq!(BodyIndex(3).to_string(), "BodyIndex(3)");
        assert_eq!(ModelInstanceIndex(1).index(), 1);
    }

    #[test]
    fn test_actuator_clamp() {
        let actuator = Actuator {
            joint: JointIndex(0),
            model: ModelInstanceIndex(1),
            effort_limit: Some(300.0),
        };
        assert_eq!(actuator.clamp(500.0), 300.0);
        assert_eq!(actuator.clamp(-500.0), -300.0);
        assert_eq!(actuator.clamp(12.5), 12.5);

        let unbounded = Actuator {
            effort_limit: None,
            ..actuator
        };
        assert_eq!(unbounded.clamp(1e9), 1e9);
    }
}
