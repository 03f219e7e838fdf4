//! Scene graph: illustration geometry attached to plant bodies.

use crate::plant::{BodyIndex, MultibodyPlant, PlantState};
use armature_library::messages::{GeometryDescription, LinkPose, SceneDraw, SceneLoad};
use armature_library::tf::Transform;
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeometryId(pub usize);

/// One registered visual, attached to a body frame
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInstance {
    pub id: GeometryId,
    pub body: BodyIndex,
    pub description: GeometryDescription,
}

/// Snapshot of registered geometry plus the bodies it hangs off.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    geometries: Vec<GeometryInstance>,
    /// Scene frame name per body that carries geometry
    frames: BTreeMap<BodyIndex, String>,
}

impl SceneGraph {
    pub fn from_plant(plant: &MultibodyPlant) -> Self {
        let geometries = plant.geometries().to_vec();
        let frames = geometries
            .iter()
            .map(|g| (g.body, g.description.frame_name.clone()))
            .collect();
        Self { geometries, frames }
    }

    pub fn num_geometries(&self) -> usize {
        self.geometries.len()
    }

    pub fn geometries(&self) -> &[GeometryInstance] {
        &self.geometries
    }

    /// Number of distinct body frames that carry geometry
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn scene_load(&self) -> SceneLoad {
        SceneLoad {
            geometries: self
                .geometries
                .iter()
                .map(|g| g.description.clone())
                .collect(),
        }
    }

    /// X_WB for every body with geometry, in body order.
    pub fn frame_poses(&self, state: &PlantState) -> Vec<(String, Isometry3<f64>)> {
        self.frames
            .iter()
            .map(|(body, name)| (name.clone(), state.body_pose(*body)))
            .collect()
    }

    /// World pose of a single geometry, X_WG
    pub fn geometry_pose(&self, state: &PlantState, id: GeometryId) -> Option<Isometry3<f64>> {
        let geometry = self.geometries.get(id.0)?;
        Some(state.body_pose(geometry.body) * geometry.description.pose.to_isometry())
    }

    pub fn scene_draw(&self, state: &PlantState, time: f64) -> SceneDraw {
        SceneDraw {
            timestamp: time,
            poses: self
                .frame_poses(state)
                .into_iter()
                .map(|(frame_name, pose)| LinkPose {
                    frame_name,
                    pose: Transform::from(pose),
                })
                .collect(),
        }
    }
}
