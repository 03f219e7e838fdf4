//! Armature Transform (TF) System
//!
//! Coordinate frame bookkeeping for listeners of the simulation:
//! - Transform math (composition, inverse, interpolation)
//! - TF tree structure for frame hierarchy with per-frame history
//! - TF messages published by the marker bridge
//!
//! # Example
//!
//! ```rust
//! use armature_library::tf::{TFTree, Transform};
//!
//! let mut tree = TFTree::new("world");
//! tree.add_static_transform("world", "base", Transform::from_translation([1.0, 0.0, 0.0]))
//!     .unwrap();
//! tree.add_static_transform("base", "tool", Transform::from_translation([0.0, 0.0, 0.5]))
//!     .unwrap();
//!
//! let tf = tree.lookup_transform("world", "tool", 0).unwrap();
//! assert!((tf.translation[2] - 0.5).abs() < 1e-9);
//! ```

mod messages;
mod transform;
mod tree;

pub use messages::{stamp_from_seconds, TFMessage, TransformStamped};
pub use transform::Transform;
pub use tree::{FrameNode, TFError, TFResult, TFTree};
