//! # Armature
//!
//! Multibody arm simulation with in-process and out-of-process visualizer
//! bridges.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use armature::prelude::*;
//!
//! let mut config = DemoConfig::default();
//! config.driver.mode = RunMode::SingleShot;
//! config.markers.enabled = false;
//!
//! let report = run_demo(&config)?;
//! assert_eq!(report.forced_publishes, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Crates
//!
//! - [`armature_core`]: node context, hub topics, UDP link, logging
//! - [`library`]: scene, marker and TF messages
//! - [`sim`]: plant, diagram, simulator and visualizer bridges

pub mod cli;
pub mod config;
pub mod demo;
pub mod echo;

pub use armature_core::{self, *};
pub use armature_library as library;
pub use armature_sim as sim;

/// Everything needed to configure and run the demo
pub mod prelude {
    pub use crate::config::{DemoConfig, MarkerSettings};
    pub use crate::demo::{build_demo, run_demo};

    pub use armature_core::{NodeContext, NodeOptions, ReconnectStrategy};
    pub use armature_sim::prelude::*;

    pub use anyhow::{anyhow, bail, ensure, Context as _, Result as AnyResult};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
