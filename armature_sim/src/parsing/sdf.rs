//! SDF (Simulation Description Format) model reader.
//!
//! Reads a single `<model>` (directly under `<sdf>` or inside a `<world>`).
//! Link poses are in the model frame, joint poses in the child link frame,
//! joint axes in the child link frame unless `use_parent_model_frame` is set.

use super::description::{
    Inertial, JointDescription, JointKind, JointLimits, LinkDescription, ModelDescription,
    VisualDescription, DEFAULT_VISUAL_COLOR,
};
use crate::error::{SimError, SimResult};
use armature_library::messages::Shape;
use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};
use std::collections::HashMap;

const SUPPORTED_VERSIONS: &[&str] = &["1.4", "1.5", "1.6", "1.7", "1.8", "1.9"];

/// Magnitudes at or beyond this are SDF's way of writing "no limit"
const UNBOUNDED_LIMIT: f64 = 1e16;

type Node<'a, 'input> = roxmltree::Node<'a, 'input>;

/// Parse SDF text. `source_name` is used in error messages.
pub fn parse_sdf(xml: &str, source_name: &str) -> SimResult<ModelDescription> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| SimError::parse(source_name, e))?;
    let root = doc.root_element();
    if !root.has_tag_name("sdf") {
        return Err(SimError::parse(
            source_name,
            format!("root element is <{}>, expected <sdf>", root.tag_name().name()),
        ));
    }

    if let Some(version) = root.attribute("version") {
        if !SUPPORTED_VERSIONS.contains(&version) {
            tracing::warn!(
                "SDF version {} not officially supported ({:?}); parsing anyway",
                version,
                SUPPORTED_VERSIONS
            );
        }
    }

    let mut models: Vec<Node> = elements(root, "model").collect();
    for world in elements(root, "world") {
        models.extend(elements(world, "model"));
    }
    let model = match models.as_slice() {
        [] => return Err(SimError::parse(source_name, "no <model> element found")),
        [only] => *only,
        [first, ..] => {
            tracing::warn!(
                "{} contains {} models; only '{}' is loaded",
                source_name,
                models.len(),
                first.attribute("name").unwrap_or("")
            );
            *first
        }
    };

    SdfReader { source_name }.parse_model(model)
}

struct SdfReader<'s> {
    source_name: &'s str,
}

struct RawJoint {
    desc: JointDescription,
    pose: Isometry3<f64>,
    pose_relative_to: Option<String>,
    axis: Vector3<f64>,
    axis_in_model: bool,
}

impl SdfReader<'_> {
    fn err(&self, message: impl ToString) -> SimError {
        SimError::parse(self.source_name, message)
    }

    fn parse_model(&self, elem: Node) -> SimResult<ModelDescription> {
        let name = required_attr(elem, "name").map_err(|m| self.err(m))?;

        // name -> (pose, relative_to)
        let mut raw_links: Vec<(LinkDescription, Option<String>)> = Vec::new();
        let mut raw_joints = Vec::new();
        for child in elem.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "link" => raw_links.push(self.parse_link(child)?),
                "joint" => raw_joints.push(self.parse_joint(child)?),
                "model" | "include" => {
                    tracing::warn!("nested <{}> in model '{}' ignored", child.tag_name().name(), name)
                }
                _ => {}
            }
        }

        let links = self.resolve_link_poses(&name, raw_links)?;
        let link_poses: HashMap<&str, Isometry3<f64>> =
            links.iter().map(|l| (l.name.as_str(), l.pose)).collect();

        let mut joints = Vec::with_capacity(raw_joints.len());
        for raw in raw_joints {
            joints.push(self.resolve_joint(&name, raw, &link_poses)?);
        }

        Ok(ModelDescription {
            name: name.to_string(),
            links,
            joints,
        })
    }

    fn parse_link(&self, elem: Node) -> SimResult<(LinkDescription, Option<String>)> {
        let name = required_attr(elem, "name").map_err(|m| self.err(m))?;
        let mut link = LinkDescription {
            name: name.to_string(),
            pose: Isometry3::identity(),
            inertial: None,
            visuals: Vec::new(),
        };
        let mut relative_to = None;

        for child in elem.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "pose" => {
                    link.pose = self.parse_pose(child)?;
                    relative_to = child.attribute("relative_to").map(str::to_string);
                }
                "inertial" => link.inertial = Some(self.parse_inertial(child)?),
                "visual" => link.visuals.push(self.parse_visual(child, &link.name)?),
                _ => {}
            }
        }
        Ok((link, relative_to))
    }

    /// Express every link pose in the model frame, following `relative_to` chains.
    fn resolve_link_poses(
        &self,
        model: &str,
        raw: Vec<(LinkDescription, Option<String>)>,
    ) -> SimResult<Vec<LinkDescription>> {
        let relative: HashMap<String, (Isometry3<f64>, Option<String>)> = raw
            .iter()
            .map(|(l, r)| (l.name.clone(), (l.pose, r.clone())))
            .collect();

        let mut links = Vec::with_capacity(raw.len());
        for (mut link, _) in raw {
            let mut pose = Isometry3::identity();
            let mut current = link.name.clone();
            let mut hops = 0;
            loop {
                let (local, reference) = &relative[&current];
                pose = local * pose;
                match reference.as_deref() {
                    None | Some("__model__") | Some("") => break,
                    Some(next) if relative.contains_key(next) => current = next.to_string(),
                    Some(other) => {
                        return Err(self.err(format!(
                            "link '{}' pose is relative to unknown frame '{}'",
                            link.name, other
                        )))
                    }
                }
                hops += 1;
                if hops > relative.len() {
                    return Err(SimError::validation(
                        model,
                        format!("pose of link '{}' has a relative_to cycle", link.name),
                    ));
                }
            }
            link.pose = pose;
            links.push(link);
        }
        Ok(links)
    }

    fn parse_inertial(&self, elem: Node) -> SimResult<Inertial> {
        let mut inertial = Inertial {
            mass: 1.0,
            pose: Isometry3::identity(),
            inertia: Matrix3::zeros(),
        };
        for child in elem.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "mass" => inertial.mass = self.parse_scalar(child)?,
                "pose" => inertial.pose = self.parse_pose(child)?,
                "inertia" => {
                    let get = |tag: &str| -> SimResult<f64> {
                        match child_element(child, tag) {
                            Some(node) => self.parse_scalar(node),
                            None => Ok(0.0),
                        }
                    };
                    let (ixx, iyy, izz) = (get("ixx")?, get("iyy")?, get("izz")?);
                    let (ixy, ixz, iyz) = (get("ixy")?, get("ixz")?, get("iyz")?);
                    inertial.inertia = Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz);
                }
                _ => {}
            }
        }
        Ok(inertial)
    }

    fn parse_visual(&self, elem: Node, link: &str) -> SimResult<VisualDescription> {
        let name = elem
            .attribute("name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_visual", link));
        let mut pose = Isometry3::identity();
        let mut shape = None;
        let mut color = DEFAULT_VISUAL_COLOR;

        for child in elem.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "pose" => pose = self.parse_pose(child)?,
                "geometry" => shape = Some(self.parse_geometry(child, &name)?),
                "material" => {
                    if let Some(diffuse) = child_element(child, "diffuse") {
                        color = self.parse_color(diffuse)?;
                    }
                }
                _ => {}
            }
        }

        let shape = shape.ok_or_else(|| self.err(format!("visual '{}' has no <geometry>", name)))?;
        Ok(VisualDescription {
            name,
            pose,
            shape,
            color,
        })
    }

    fn parse_geometry(&self, elem: Node, visual: &str) -> SimResult<Shape> {
        let shape_elem = elem
            .children()
            .find(|n| n.is_element())
            .ok_or_else(|| self.err(format!("visual '{}' has an empty <geometry>", visual)))?;

        let scalar = |tag: &str| -> SimResult<f64> {
            child_element(shape_elem, tag)
                .ok_or_else(|| self.err(format!("<{}> in visual '{}' needs <{}>", shape_elem.tag_name().name(), visual, tag)))
                .and_then(|n| self.parse_scalar(n))
        };

        match shape_elem.tag_name().name() {
            "box" => {
                let size = child_element(shape_elem, "size")
                    .ok_or_else(|| self.err(format!("<box> in visual '{}' needs <size>", visual)))?;
                Ok(Shape::Box {
                    size: self.parse_vec3(size)?,
                })
            }
            "cylinder" => Ok(Shape::Cylinder {
                radius: scalar("radius")?,
                length: scalar("length")?,
            }),
            "sphere" => Ok(Shape::Sphere {
                radius: scalar("radius")?,
            }),
            "mesh" => {
                let uri = child_element(shape_elem, "uri")
                    .and_then(|n| n.text())
                    .map(|t| t.trim().to_string())
                    .ok_or_else(|| self.err(format!("<mesh> in visual '{}' needs <uri>", visual)))?;
                let scale = match child_element(shape_elem, "scale") {
                    Some(n) => self.parse_vec3(n)?,
                    None => [1.0, 1.0, 1.0],
                };
                Ok(Shape::Mesh { uri, scale })
            }
            other => Err(self.err(format!(
                "unsupported geometry <{}> in visual '{}'",
                other, visual
            ))),
        }
    }

    fn parse_joint(&self, elem: Node) -> SimResult<RawJoint> {
        let name = required_attr(elem, "name").map_err(|m| self.err(m))?;
        let type_name = required_attr(elem, "type").map_err(|m| self.err(m))?;
        let kind = match type_name {
            "revolute" => JointKind::Revolute,
            "continuous" => JointKind::Continuous,
            "prismatic" => JointKind::Prismatic,
            "fixed" => JointKind::Fixed,
            other => {
                return Err(self.err(format!(
                    "joint '{}' has unsupported type '{}'",
                    name, other
                )))
            }
        };

        let text_of = |tag: &str| -> SimResult<String> {
            child_element(elem, tag)
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
                .ok_or_else(|| self.err(format!("joint '{}' needs <{}>", name, tag)))
        };

        let mut raw = RawJoint {
            desc: JointDescription {
                name: name.to_string(),
                kind,
                parent: text_of("parent")?,
                child: text_of("child")?,
                pose: Isometry3::identity(),
                axis: Vector3::z(),
                limits: JointLimits::default(),
                damping: 0.0,
            },
            pose: Isometry3::identity(),
            pose_relative_to: None,
            axis: Vector3::z(),
            axis_in_model: false,
        };

        if let Some(pose) = child_element(elem, "pose") {
            raw.pose = self.parse_pose(pose)?;
            raw.pose_relative_to = pose.attribute("relative_to").map(str::to_string);
        }
        if let Some(axis) = child_element(elem, "axis") {
            self.parse_axis(axis, &mut raw)?;
        }
        Ok(raw)
    }

    fn parse_axis(&self, elem: Node, raw: &mut RawJoint) -> SimResult<()> {
        for child in elem.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "xyz" => {
                    raw.axis = Vector3::from(self.parse_vec3(child)?);
                    if child.attribute("expressed_in") == Some("__model__") {
                        raw.axis_in_model = true;
                    }
                }
                "use_parent_model_frame" => {
                    let text = child.text().unwrap_or("").trim();
                    raw.axis_in_model = text == "true" || text == "1";
                }
                "limit" => {
                    let limits = &mut raw.desc.limits;
                    for limit in child.children().filter(|n| n.is_element()) {
                        let value = self.parse_scalar(limit)?;
                        match limit.tag_name().name() {
                            "lower" if value > -UNBOUNDED_LIMIT => limits.lower = value,
                            "upper" if value < UNBOUNDED_LIMIT => limits.upper = value,
                            // negative effort/velocity means unlimited
                            "effort" if value >= 0.0 => limits.effort = Some(value),
                            "velocity" if value >= 0.0 => limits.velocity = Some(value),
                            _ => {}
                        }
                    }
                }
                "dynamics" => {
                    if let Some(damping) = child_element(child, "damping") {
                        raw.desc.damping = self.parse_scalar(damping)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Joint pose into the child frame, axis into the joint frame.
    fn resolve_joint(
        &self,
        model: &str,
        raw: RawJoint,
        link_poses: &HashMap<&str, Isometry3<f64>>,
    ) -> SimResult<JointDescription> {
        let mut desc = raw.desc;
        let Some(x_mc) = link_poses.get(desc.child.as_str()).copied() else {
            return Err(SimError::validation(
                model,
                format!("joint '{}' references unknown link '{}'", desc.name, desc.child),
            ));
        };

        desc.pose = match raw.pose_relative_to.as_deref() {
            None | Some("") => raw.pose,
            Some(reference) if reference == desc.child => raw.pose,
            Some("__model__") => x_mc.inverse() * raw.pose,
            Some(reference) => match link_poses.get(reference) {
                Some(x_mr) => x_mc.inverse() * x_mr * raw.pose,
                None => {
                    return Err(self.err(format!(
                        "joint '{}' pose is relative to unknown frame '{}'",
                        desc.name, reference
                    )))
                }
            },
        };

        let r_cj = desc.pose.rotation;
        desc.axis = if raw.axis_in_model {
            (x_mc.rotation * r_cj).inverse() * raw.axis
        } else {
            r_cj.inverse() * raw.axis
        };
        Ok(desc)
    }

    fn parse_pose(&self, elem: Node) -> SimResult<Isometry3<f64>> {
        let values = self.parse_numbers(elem)?;
        let degrees = elem.attribute("degrees") == Some("true");
        match values.as_slice() {
            [] => Ok(Isometry3::identity()),
            [x, y, z] => Ok(Isometry3::translation(*x, *y, *z)),
            [x, y, z, roll, pitch, yaw] => {
                let scale = if degrees { std::f64::consts::PI / 180.0 } else { 1.0 };
                Ok(Isometry3::from_parts(
                    Translation3::new(*x, *y, *z),
                    UnitQuaternion::from_euler_angles(roll * scale, pitch * scale, yaw * scale),
                ))
            }
            other => Err(self.err(format!("<pose> needs 3 or 6 numbers, got {}", other.len()))),
        }
    }

    fn parse_vec3(&self, elem: Node) -> SimResult<[f64; 3]> {
        match self.parse_numbers(elem)?.as_slice() {
            [x, y, z] => Ok([*x, *y, *z]),
            other => Err(self.err(format!(
                "<{}> needs 3 numbers, got {}",
                elem.tag_name().name(),
                other.len()
            ))),
        }
    }

    fn parse_color(&self, elem: Node) -> SimResult<[f32; 4]> {
        match self.parse_numbers(elem)?.as_slice() {
            [r, g, b] => Ok([*r as f32, *g as f32, *b as f32, 1.0]),
            [r, g, b, a] => Ok([*r as f32, *g as f32, *b as f32, *a as f32]),
            other => Err(self.err(format!("color needs 3 or 4 numbers, got {}", other.len()))),
        }
    }

    fn parse_scalar(&self, elem: Node) -> SimResult<f64> {
        match self.parse_numbers(elem)?.as_slice() {
            [value] => Ok(*value),
            _ => Err(self.err(format!(
                "<{}> needs a single number",
                elem.tag_name().name()
            ))),
        }
    }

    fn parse_numbers(&self, elem: Node) -> SimResult<Vec<f64>> {
        elem.text()
            .unwrap_or("")
            .split_whitespace()
            .map(|s| {
                s.parse::<f64>().map_err(|_| {
                    self.err(format!("'{}' in <{}> is not a number", s, elem.tag_name().name()))
                })
            })
            .collect()
    }
}

fn elements<'a, 'input: 'a>(
    parent: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    parent
        .children()
        .filter(move |n| n.is_element() && n.has_tag_name(tag))
}

fn child_element<'a, 'input>(parent: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    parent
        .children()
        .find(|n| n.is_element() && n.has_tag_name(tag))
}

fn required_attr<'a>(elem: Node<'a, '_>, attr: &str) -> Result<&'a str, String> {
    elem.attribute(attr).ok_or_else(|| {
        format!(
            "<{}> is missing the '{}' attribute",
            elem.tag_name().name(),
            attr
        )
    })
}
