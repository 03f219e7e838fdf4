//! Message types exchanged between the simulation and visualizer bridges
//!
//! - Scene: geometry load and per-step draw messages for in-process viewers
//! - Markers: marker arrays and the datagram packet envelope for
//!   out-of-process listeners

pub mod markers;
pub mod scene;

pub use markers::{Marker, MarkerAction, MarkerArray, MarkerPacket, MarkerType};
pub use scene::{GeometryDescription, LinkPose, SceneDraw, SceneLoad, Shape};
