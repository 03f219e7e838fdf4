use crate::tf::Transform;
use crate::LogSummary;
use serde::{Deserialize, Serialize};

/// Illustration shape, dimensions in meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Box { size: [f64; 3] },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
    Mesh { uri: String, scale: [f64; 3] },
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Box { .. } => "box",
            Shape::Cylinder { .. } => "cylinder",
            Shape::Sphere { .. } => "sphere",
            Shape::Mesh { .. } => "mesh",
        }
    }
}

/// One illustration geometry rigidly attached to a body frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescription {
    pub name: String,
    /// Body frame the geometry is attached to
    pub frame_name: String,
    pub shape: Shape,
    /// Pose of the geometry in the body frame (X_FG)
    pub pose: Transform,
    /// RGBA, each in [0, 1]
    pub color: [f32; 4],
}

/// Everything a viewer needs to set up the scene, sent once
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneLoad {
    pub geometries: Vec<GeometryDescription>,
}

impl SceneLoad {
    /// Distinct body frames in first-seen order
    pub fn frame_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for geometry in &self.geometries {
            if !names.contains(&geometry.frame_name.as_str()) {
                names.push(&geometry.frame_name);
            }
        }
        names
    }
}

impl LogSummary for SceneLoad {
    fn log_summary(&self) -> String {
        format!(
            "SceneLoad({} geometries on {} frames)",
            self.geometries.len(),
            self.frame_names().len()
        )
    }
}

/// World pose of one body frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPose {
    pub frame_name: String,
    /// X_WB
    pub pose: Transform,
}

/// Body poses at one simulated time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDraw {
    /// Simulated time in seconds
    pub timestamp: f64,
    pub poses: Vec<LinkPose>,
}

impl SceneDraw {
    pub fn pose_of(&self, frame_name: &str) -> Option<&Transform> {
        self.poses
            .iter()
            .find(|p| p.frame_name == frame_name)
            .map(|p| &p.pose)
    }
}

impl LogSummary for SceneDraw {
    fn log_summary(&self) -> String {
        format!("SceneDraw(t={:.3}, {} poses)", self.timestamp, self.poses.len())
    }
}
