//! # Armature Sim
//!
//! Multibody simulation wired as a small diagram:
//!
//! ```text
//! resource -> Parser -> MultibodyPlant --(finalize)--> DiagramBuilder -> Diagram
//!                                         ^                              |
//!                         actuation source                    Simulator / run_simulation
//!                                                                        |
//!                                                SceneGraph poses -> GeometrySink bridges
//! ```
//!
//! Rigid-body dynamics run inside `rapier3d`; the plant owns the topology
//! (bodies, frames, joints, welds, actuators) and the scene graph turns
//! engine state into per-body poses for the visualizer bridges.
//!
//! ```rust,no_run
//! use armature_sim::prelude::*;
//! use nalgebra::Isometry3;
//!
//! let mut builder = DiagramBuilder::new();
//! let plant = builder.add_multibody_plant_scene_graph(PlantConfig::default())?;
//! let path = resolve_resource(
//!     "armature/manipulation/models/iiwa_description/iiwa7/iiwa7_no_collision.sdf",
//! )?;
//! let arm = Parser::new(plant).add_model_from_file(&path)?;
//! let base = plant.get_frame_by_name("iiwa_link_0")?;
//! let world = plant.world_frame();
//! plant.weld_frames(world, base, Isometry3::identity())?;
//! plant.finalize()?;
//! no_control(&mut builder, arm)?;
//!
//! let diagram = builder.build()?;
//! let mut simulator = Simulator::new(&diagram)?;
//! simulator.advance_to(1.0)?;
//! # Ok::<(), armature_sim::SimError>(())
//! ```

pub mod analysis;
pub mod control;
pub mod error;
pub mod geometry;
pub mod parsing;
pub mod plant;
pub mod resource;
pub mod systems;
pub mod visualization;

pub use error::{SimError, SimResult};

pub mod prelude {
    pub use crate::analysis::{
        run_simulation, DriverConfig, ReadinessPolicy, RunMode, RunReport, Simulator,
    };
    pub use crate::control::no_control;
    pub use crate::error::{SimError, SimResult};
    pub use crate::parsing::{ModelFormat, Parser};
    pub use crate::plant::{
        BodyIndex, FrameIndex, JointIndex, ModelInstanceIndex, MultibodyPlant, PlantConfig,
    };
    pub use crate::resource::{resolve_resource, ResourceLocator};
    pub use crate::systems::{ConstantVectorSource, Context, Diagram, DiagramBuilder};
    pub use crate::visualization::{
        connect_marker_visualizer, connect_scene_visualizer, GeometrySink, VisualizerConfig,
    };
}
