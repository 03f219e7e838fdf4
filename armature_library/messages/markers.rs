//! Marker messages and the datagram envelope used by the marker transport.

use super::scene::{GeometryDescription, Shape};
use crate::tf::{TFMessage, Transform};
use crate::LogSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerAction {
    Add,
    Delete,
    /// Remove every marker previously sent, regardless of namespace
    DeleteAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerType {
    Cube,
    Cylinder,
    Sphere,
    MeshResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub ns: String,
    pub id: u32,
    /// Frame the pose is expressed in
    pub frame_id: String,
    pub action: MarkerAction,
    pub marker_type: MarkerType,
    pub pose: Transform,
    /// Full extents along x, y, z (diameters for round shapes)
    pub scale: [f64; 3],
    pub color: [f32; 4],
    pub mesh_resource: Option<String>,
}

impl Marker {
    pub fn delete_all() -> Self {
        Self {
            ns: String::new(),
            id: 0,
            frame_id: String::new(),
            action: MarkerAction::DeleteAll,
            marker_type: MarkerType::Cube,
            pose: Transform::identity(),
            scale: [0.0; 3],
            color: [0.0; 4],
            mesh_resource: None,
        }
    }

    /// Marker drawing `geometry` in its body frame
    pub fn for_geometry(ns: &str, id: u32, geometry: &GeometryDescription) -> Self {
        let (marker_type, scale, mesh_resource) = match &geometry.shape {
            Shape::Box { size } => (MarkerType::Cube, *size, None),
            Shape::Cylinder { radius, length } => {
                (MarkerType::Cylinder, [2.0 * radius, 2.0 * radius, *length], None)
            }
            Shape::Sphere { radius } => (MarkerType::Sphere, [2.0 * radius; 3], None),
            Shape::Mesh { uri, scale } => (MarkerType::MeshResource, *scale, Some(uri.clone())),
        };
        Self {
            ns: ns.to_string(),
            id,
            frame_id: geometry.frame_name.clone(),
            action: MarkerAction::Add,
            marker_type,
            pose: geometry.pose,
            scale,
            color: geometry.color,
            mesh_resource,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerArray {
    pub markers: Vec<Marker>,
}

impl LogSummary for MarkerArray {
    fn log_summary(&self) -> String {
        let adds = self
            .markers
            .iter()
            .filter(|m| m.action == MarkerAction::Add)
            .count();
        format!("MarkerArray({} markers, {} add)", self.markers.len(), adds)
    }
}

/// One datagram on the marker transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkerPacket {
    /// Readiness probe from the publisher
    Probe { nonce: u64 },
    /// Listener's reply to a probe, echoing its nonce
    Ack { nonce: u64 },
    Markers(MarkerArray),
    Transforms(TFMessage),
}

impl LogSummary for MarkerPacket {
    fn log_summary(&self) -> String {
        match self {
            MarkerPacket::Probe { nonce } => format!("Probe({})", nonce),
            MarkerPacket::Ack { nonce } => format!("Ack({})", nonce),
            MarkerPacket::Markers(array) => array.log_summary(),
            MarkerPacket::Transforms(tf) => tf.log_summary(),
        }
    }
}
