//! Format-neutral robot description produced by the SDF and URDF readers.

use crate::error::{SimError, SimResult};
use armature_library::messages::Shape;
use nalgebra::{Isometry3, Matrix3, Unit, Vector3};
use std::collections::{HashMap, HashSet};

/// Default illustration color when a description has none
pub const DEFAULT_VISUAL_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Revolute,
    Continuous,
    Prismatic,
    Fixed,
}

impl JointKind {
    pub fn num_dofs(&self) -> usize {
        match self {
            JointKind::Fixed => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
    /// `None` means unbounded effort
    pub effort: Option<f64>,
    pub velocity: Option<f64>,
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            effort: None,
            velocity: None,
        }
    }
}

impl JointLimits {
    /// Finite range; `lower == upper` locks the joint
    pub fn has_position_limits(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inertial {
    pub mass: f64,
    /// Center-of-mass frame in the link frame
    pub pose: Isometry3<f64>,
    /// Rotational inertia about the COM, in the COM frame
    pub inertia: Matrix3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualDescription {
    pub name: String,
    /// X_LG
    pub pose: Isometry3<f64>,
    pub shape: Shape,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescription {
    pub name: String,
    /// Link frame in the model frame at the zero configuration (X_ML)
    pub pose: Isometry3<f64>,
    pub inertial: Option<Inertial>,
    pub visuals: Vec<VisualDescription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointDescription {
    pub name: String,
    pub kind: JointKind,
    pub parent: String,
    pub child: String,
    /// Joint frame in the child link frame (X_CJ)
    pub pose: Isometry3<f64>,
    /// Motion axis in the joint frame
    pub axis: Vector3<f64>,
    pub limits: JointLimits,
    pub damping: f64,
}

impl JointDescription {
    /// Actuated when it moves and its effort limit is not exactly zero
    pub fn is_actuated(&self) -> bool {
        self.kind != JointKind::Fixed && self.limits.effort != Some(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescription {
    pub name: String,
    pub links: Vec<LinkDescription>,
    pub joints: Vec<JointDescription>,
}

impl ModelDescription {
    pub fn link(&self, name: &str) -> Option<&LinkDescription> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Links that are not the child of any joint
    pub fn root_links(&self) -> Vec<&LinkDescription> {
        let children: HashSet<&str> = self.joints.iter().map(|j| j.child.as_str()).collect();
        self.links
            .iter()
            .filter(|l| !children.contains(l.name.as_str()))
            .collect()
    }

    /// Structural checks shared by every format.
    pub fn validate(&self) -> SimResult<()> {
        let fail = |message: String| Err(SimError::validation(&self.name, message));

        if self.name.is_empty() {
            return fail("model has no name".to_string());
        }
        if self.links.is_empty() {
            return fail("model has no links".to_string());
        }

        let mut link_names = HashSet::new();
        for link in &self.links {
            if !link_names.insert(link.name.as_str()) {
                return fail(format!("duplicate link name '{}'", link.name));
            }
            if let Some(inertial) = &link.inertial {
                if !(inertial.mass.is_finite() && inertial.mass >= 0.0) {
                    return fail(format!("link '{}' has invalid mass {}", link.name, inertial.mass));
                }
            }
        }

        let mut joint_names = HashSet::new();
        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for joint in &self.joints {
            if !joint_names.insert(joint.name.as_str()) {
                return fail(format!("duplicate joint name '{}'", joint.name));
            }
            for link in [&joint.parent, &joint.child] {
                if !link_names.contains(link.as_str()) {
                    return fail(format!(
                        "joint '{}' references unknown link '{}'",
                        joint.name, link
                    ));
                }
            }
            if joint.parent == joint.child {
                return fail(format!("joint '{}' connects '{}' to itself", joint.name, joint.child));
            }
            if parent_of.insert(&joint.child, &joint.parent).is_some() {
                return fail(format!("link '{}' has more than one parent joint", joint.child));
            }
            if joint.kind != JointKind::Fixed && joint.axis.norm() < 1e-9 {
                return fail(format!("joint '{}' has a zero axis", joint.name));
            }
            if joint.limits.lower > joint.limits.upper {
                return fail(format!(
                    "joint '{}' has lower limit {} above upper limit {}",
                    joint.name, joint.limits.lower, joint.limits.upper
                ));
            }
        }

        for link in &self.links {
            let mut seen = HashSet::new();
            let mut current = link.name.as_str();
            while let Some(parent) = parent_of.get(current) {
                if !seen.insert(current) {
                    return fail(format!("kinematic loop through link '{}'", current));
                }
                current = parent;
            }
        }

        Ok(())
    }
}

/// Unit axis, or `None` for a zero vector
pub fn normalized_axis(axis: &Vector3<f64>) -> Option<Unit<Vector3<f64>>> {
    Unit::try_new(*axis, 1e-9)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn assert_invalid(model: &ModelDescription, needle: &str) {
        match model.validate() {
            Err(SimError::ModelValidation { message, .. }) => {
                assert!(message.contains(needle), "{}", message)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_two_link_is_valid() {
        let model = two_link("arm");
        model.validate().unwrap();
        assert_eq!(model.root_links().len(), 1);
        assert_eq!(model.root_links()[0].name, "base");
    }

    #[test]
    fn test_duplicate_and_dangling_names() {
        let mut model = two_link("arm");
        model.links.push(link("arm", 1.0));
        assert_invalid(&model, "duplicate link");

        let mut model = two_link("arm");
        model.joints[0].child = "ghost".to_string();
        assert_invalid(&model, "unknown link 'ghost'");
    }

    #[test]
    fn test_two_parents_and_loops() {
        let mut model = two_link("arm");
        model.links.push(link("other", 0.0));
        model.joints.push(revolute("second", "other", "arm"));
        assert_invalid(&model, "more than one parent");

        let mut model = two_link("arm");
        model.joints.push(revolute("back", "arm", "base"));
        assert_invalid(&model, "kinematic loop");
    }

    #[test]
    fn test_zero_axis_rejected() {
        let mut model = two_link("arm");
        model.joints[0].axis = Vector3::zeros();
        assert_invalid(&model, "zero axis");
    }

    #[test]
    fn test_actuation_rule() {
        let mut joint = revolute("j", "a", "b");
        assert!(joint.is_actuated());
        joint.limits.effort = None;
        assert!(joint.is_actuated());
        joint.limits.effort = Some(0.0);
        assert!(!joint.is_actuated());
        joint.limits.effort = Some(5.0);
        joint.kind = JointKind::Fixed;
        assert!(!joint.is_actuated());
    }

    #[test]
    fn test_position_limit_ranges() {
        let mut limits = JointLimits::default();
        assert!(!limits.has_position_limits());
        limits.lower = 0.2;
        limits.upper = 0.2;
        assert!(limits.has_position_limits());
        limits.upper = f64::INFINITY;
        assert!(!limits.has_position_limits());
    }
}
