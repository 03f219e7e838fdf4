//! URDF model reader built on `urdf-rs`.
//!
//! URDF places each child link frame at its joint frame, so link poses in the
//! model frame come from chaining joint origins down from the root links.

use super::description::{
    Inertial, JointDescription, JointKind, JointLimits, LinkDescription, ModelDescription,
    VisualDescription, DEFAULT_VISUAL_COLOR,
};
use crate::error::{SimError, SimResult};
use armature_library::messages::Shape;
use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};
use std::collections::{HashMap, VecDeque};

/// Parse URDF text. `source_name` is used in error messages.
pub fn parse_urdf(xml: &str, source_name: &str) -> SimResult<ModelDescription> {
    let robot = urdf_rs::read_from_string(xml).map_err(|e| SimError::parse(source_name, e))?;

    let named_colors: HashMap<&str, [f32; 4]> = robot
        .materials
        .iter()
        .filter_map(|m| m.color.as_ref().map(|c| (m.name.as_str(), rgba(&c.rgba))))
        .collect();

    let limit_elements = limit_elements(xml, source_name)?;
    let mut joints = Vec::with_capacity(robot.joints.len());
    for joint in &robot.joints {
        let element = limit_elements.get(joint.name.as_str()).copied();
        joints.push(convert_joint(joint, element, source_name)?);
    }

    let poses = link_poses(&robot);
    let links = robot
        .links
        .iter()
        .map(|link| LinkDescription {
            name: link.name.clone(),
            pose: poses
                .get(link.name.as_str())
                .copied()
                .unwrap_or_else(Isometry3::identity),
            inertial: Some(convert_inertial(&link.inertial)),
            visuals: link
                .visual
                .iter()
                .enumerate()
                .map(|(i, v)| convert_visual(v, &link.name, i, &named_colors))
                .collect(),
        })
        .collect();

    Ok(ModelDescription {
        name: robot.name.clone(),
        links,
        joints,
    })
}

/// Which attributes a joint's `<limit>` element actually carries
#[derive(Debug, Clone, Copy)]
struct LimitElement {
    effort: bool,
    velocity: bool,
}

/// urdf-rs fills a missing `<limit>` with zeros, so presence is read from the XML.
fn limit_elements(xml: &str, source_name: &str) -> SimResult<HashMap<String, LimitElement>> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| SimError::parse(source_name, e))?;
    Ok(doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("joint"))
        .filter_map(|joint| {
            let name = joint.attribute("name")?;
            let limit = joint.children().find(|n| n.has_tag_name("limit"))?;
            Some((
                name.to_string(),
                LimitElement {
                    effort: limit.has_attribute("effort"),
                    velocity: limit.has_attribute("velocity"),
                },
            ))
        })
        .collect())
}

fn convert_joint(
    joint: &urdf_rs::Joint,
    limit_element: Option<LimitElement>,
    source_name: &str,
) -> SimResult<JointDescription> {
    let kind = match joint.joint_type {
        urdf_rs::JointType::Revolute => JointKind::Revolute,
        urdf_rs::JointType::Continuous => JointKind::Continuous,
        urdf_rs::JointType::Prismatic => JointKind::Prismatic,
        urdf_rs::JointType::Fixed => JointKind::Fixed,
        ref other => {
            return Err(SimError::parse(
                source_name,
                format!("joint '{}' has unsupported type {:?}", joint.name, other),
            ))
        }
    };

    let limit = &joint.limit;
    let limits = match limit_element {
        None => JointLimits::default(),
        Some(element) => {
            let bounded = kind != JointKind::Continuous;
            JointLimits {
                // lower == upper locks the joint
                lower: if bounded { limit.lower } else { f64::NEG_INFINITY },
                upper: if bounded { limit.upper } else { f64::INFINITY },
                // negative effort/velocity means unlimited; an explicit 0 effort leaves it unactuated
                effort: (element.effort && limit.effort >= 0.0).then_some(limit.effort),
                velocity: (element.velocity && limit.velocity >= 0.0).then_some(limit.velocity),
            }
        }
    };

    Ok(JointDescription {
        name: joint.name.clone(),
        kind,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        pose: Isometry3::identity(),
        axis: Vector3::new(joint.axis.xyz[0], joint.axis.xyz[1], joint.axis.xyz[2]),
        limits,
        damping: joint.dynamics.as_ref().map_or(0.0, |d| d.damping),
    })
}

/// X_ML for every link reachable from a root link.
fn link_poses(robot: &urdf_rs::Robot) -> HashMap<&str, Isometry3<f64>> {
    let mut children: HashMap<&str, Vec<&urdf_rs::Joint>> = HashMap::new();
    for joint in &robot.joints {
        children
            .entry(joint.parent.link.as_str())
            .or_default()
            .push(joint);
    }

    let mut poses = HashMap::new();
    let mut queue = VecDeque::new();
    for link in &robot.links {
        if !robot.joints.iter().any(|j| j.child.link == link.name) {
            poses.insert(link.name.as_str(), Isometry3::identity());
            queue.push_back(link.name.as_str());
        }
    }

    while let Some(parent) = queue.pop_front() {
        let x_mp = poses[parent];
        for joint in children.get(parent).into_iter().flatten() {
            let child = joint.child.link.as_str();
            if poses.contains_key(child) {
                continue;
            }
            poses.insert(child, x_mp * origin_to_isometry(&joint.origin));
            queue.push_back(child);
        }
    }
    poses
}

fn convert_inertial(inertial: &urdf_rs::Inertial) -> Inertial {
    let i = &inertial.inertia;
    Inertial {
        mass: inertial.mass.value,
        pose: origin_to_isometry(&inertial.origin),
        inertia: Matrix3::new(i.ixx, i.ixy, i.ixz, i.ixy, i.iyy, i.iyz, i.ixz, i.iyz, i.izz),
    }
}

fn convert_visual(
    visual: &urdf_rs::Visual,
    link: &str,
    index: usize,
    named_colors: &HashMap<&str, [f32; 4]>,
) -> VisualDescription {
    let color = visual
        .material
        .as_ref()
        .and_then(|m| {
            m.color
                .as_ref()
                .map(|c| rgba(&c.rgba))
                .or_else(|| named_colors.get(m.name.as_str()).copied())
        })
        .unwrap_or(DEFAULT_VISUAL_COLOR);

    VisualDescription {
        name: visual
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_visual_{}", link, index)),
        pose: origin_to_isometry(&visual.origin),
        shape: convert_geometry(&visual.geometry),
        color,
    }
}

fn convert_geometry(geometry: &urdf_rs::Geometry) -> Shape {
    match geometry {
        urdf_rs::Geometry::Box { size } => Shape::Box {
            size: [size[0], size[1], size[2]],
        },
        urdf_rs::Geometry::Cylinder { radius, length }
        | urdf_rs::Geometry::Capsule { radius, length } => Shape::Cylinder {
            radius: *radius,
            length: *length,
        },
        urdf_rs::Geometry::Sphere { radius } => Shape::Sphere { radius: *radius },
        urdf_rs::Geometry::Mesh { filename, scale } => Shape::Mesh {
            uri: filename.clone(),
            scale: scale.as_ref().map_or([1.0, 1.0, 1.0], |s| [s[0], s[1], s[2]]),
        },
    }
}

fn origin_to_isometry(origin: &urdf_rs::Pose) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(origin.xyz[0], origin.xyz[1], origin.xyz[2]),
        UnitQuaternion::from_euler_angles(origin.rpy[0], origin.rpy[1], origin.rpy[2]),
    )
}

fn rgba(values: &[f64; 4]) -> [f32; 4] {
    [
        values[0] as f32,
        values[1] as f32,
        values[2] as f32,
        values[3] as f32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PENDULUM_URDF: &str = r#"
        <robot name="pendulum">
            <material name="red"><color rgba="1 0 0 1"/></material>
            <link name="base">
                <inertial>
                    <mass value="2.0"/>
                    <inertia ixx="0.1" ixy="0" ixz="0" iyy="0.1" iyz="0" izz="0.1"/>
                </inertial>
            </link>
            <link name="arm">
                <inertial>
                    <origin xyz="0 0 -0.25"/>
                    <mass value="1.0"/>
                    <inertia ixx="0.02" ixy="0" ixz="0" iyy="0.02" iyz="0" izz="0.001"/>
                </inertial>
                <visual>
                    <geometry><capsule radius="0.02" length="0.5"/></geometry>
                    <material name="red"/>
                </visual>
            </link>
            <link name="tip"/>
            <joint name="pivot" type="revolute">
                <parent link="base"/>
                <child link="arm"/>
                <origin xyz="0 0 1.0" rpy="0 0 0"/>
                <axis xyz="0 1 0"/>
                <limit lower="-1.5" upper="1.5" effort="20" velocity="3"/>
                <dynamics damping="0.1"/>
            </joint>
            <joint name="tip_weld" type="fixed">
                <parent link="arm"/>
                <child link="tip"/>
                <origin xyz="0 0 -0.5"/>
            </joint>
        </robot>
    "#;

    #[test]
    fn test_link_poses_chain_joint_origins() {
        let model = parse_urdf(PENDULUM_URDF, "pendulum.urdf").unwrap();
        model.validate().unwrap();

        assert_relative_eq!(model.link("arm").unwrap().pose.translation.z, 1.0);
        assert_relative_eq!(model.link("tip").unwrap().pose.translation.z, 0.5);
        assert!(model.joints.iter().all(|j| j.pose == Isometry3::identity()));
    }

    #[test]
    fn test_joint_details() {
        let model = parse_urdf(PENDULUM_URDF, "pendulum.urdf").unwrap();
        let pivot = &model.joints[0];
        assert_eq!(pivot.kind, JointKind::Revolute);
        assert_relative_eq!(pivot.axis, Vector3::y());
        assert_eq!(pivot.limits.effort, Some(20.0));
        assert_relative_eq!(pivot.damping, 0.1);
        assert!(pivot.is_actuated());
        assert!(!model.joints[1].is_actuated());
    }

    #[test]
    fn test_limits_follow_limit_element() {
        let model = parse_urdf(PENDULUM_URDF, "pendulum.urdf").unwrap();
        let pivot = &model.joints[0];
        assert_eq!((pivot.limits.lower, pivot.limits.upper), (-1.5, 1.5));
        assert_eq!(pivot.limits.velocity, Some(3.0));

        // no <limit>: unbounded and actuated
        let free = PENDULUM_URDF.replace(
            r#"<limit lower="-1.5" upper="1.5" effort="20" velocity="3"/>"#,
            "",
        );
        let pivot = parse_urdf(&free, "pendulum.urdf").unwrap().joints[0].clone();
        assert!(!pivot.limits.has_position_limits());
        assert_eq!(pivot.limits.effort, None);
        assert!(pivot.is_actuated());

        // lower == upper keeps the joint locked in place
        let locked = PENDULUM_URDF.replace(r#"lower="-1.5" upper="1.5""#, r#"lower="0.3" upper="0.3""#);
        let pivot = parse_urdf(&locked, "pendulum.urdf").unwrap().joints[0].clone();
        assert_eq!((pivot.limits.lower, pivot.limits.upper), (0.3, 0.3));

        // explicit zero effort: unactuated, as in SDF
        let passive = PENDULUM_URDF.replace(r#"effort="20""#, r#"effort="0""#);
        let pivot = parse_urdf(&passive, "pendulum.urdf").unwrap().joints[0].clone();
        assert_eq!(pivot.limits.effort, Some(0.0));
        assert!(!pivot.is_actuated());

        let unlimited = PENDULUM_URDF.replace(r#"effort="20""#, r#"effort="-1""#);
        let pivot = parse_urdf(&unlimited, "pendulum.urdf").unwrap().joints[0].clone();
        assert_eq!(pivot.limits.effort, None);
        assert!(pivot.is_actuated());
    }

    #[test]
    fn test_named_material_and_capsule() {
        let model = parse_urdf(PENDULUM_URDF, "pendulum.urdf").unwrap();
        let visual = &model.link("arm").unwrap().visuals[0];
        assert_eq!(visual.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(visual.name, "arm_visual_0");
        assert!(matches!(visual.shape, Shape::Cylinder { length, .. } if length == 0.5));
    }

    #[test]
    fn test_floating_joint_rejected() {
        let xml = PENDULUM_URDF.replace("type=\"revolute\"", "type=\"floating\"");
        assert!(matches!(
            parse_urdf(&xml, "pendulum.urdf"),
            Err(SimError::Parse { .. })
        ));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_urdf("<robot name='x'><link>", "broken.urdf").is_err());
    }
}
