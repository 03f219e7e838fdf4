//! # Armature Standard Library
//!
//! Message types exchanged between the simulation and its visualizer bridges,
//! plus the transform frame system used by listeners.
//!
//! ```text
//! armature_library/
//! ── messages/       # Scene and marker messages
//! ── tf/             # Transform math, frame tree, TF messages
//! ```

pub mod messages;
pub mod tf;

// Re-export core traits needed for message types
pub use armature_core::core::LogSummary;

pub use messages::*;
pub use tf::{TFMessage, TFTree, Transform, TransformStamped};
