//! Visualizer bridges fed from the scene graph.
//!
//! A [`GeometrySink`] receives the geometry once at initialization and body
//! poses on every publish. Two sinks ship with the crate:
//!
//! - [`SceneVisualizer`]: in-process hub topics `scene/load` and `scene/draw`
//! - [`MarkerVisualizer`]: marker arrays and TF over UDP to an external listener

mod marker_bridge;
mod scene_bridge;

pub use marker_bridge::{MarkerVisualizer, DEFAULT_MARKER_ADDR, MARKERS_PER_PACKET};
pub use scene_bridge::{SceneVisualizer, SCENE_DRAW_TOPIC, SCENE_LOAD_TOPIC};

use crate::error::SimResult;
use crate::systems::DiagramBuilder;
use armature_core::{NodeContext, ReconnectStrategy};
use armature_library::messages::{SceneDraw, SceneLoad};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default simulated publish period (32 Hz)
pub const DEFAULT_PUBLISH_PERIOD: f64 = 1.0 / 32.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Simulated seconds between publishes; 0 publishes after every plant step
    pub publish_period: f64,
    /// Frame that body transforms are expressed in
    pub world_frame: String,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            publish_period: DEFAULT_PUBLISH_PERIOD,
            world_frame: "world".to_string(),
        }
    }
}

impl VisualizerConfig {
    pub fn with_publish_period(mut self, period: f64) -> Self {
        self.publish_period = period;
        self
    }
}

/// Per-sink counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkStats {
    pub initializations: u64,
    pub publishes: u64,
    pub send_failures: u64,
}

impl SinkStats {
    /// Counts accumulated after `earlier` was taken
    pub fn since(&self, earlier: &SinkStats) -> SinkStats {
        SinkStats {
            initializations: self.initializations.saturating_sub(earlier.initializations),
            publishes: self.publishes.saturating_sub(earlier.publishes),
            send_failures: self.send_failures.saturating_sub(earlier.send_failures),
        }
    }
}

pub trait GeometrySink: Send {
    fn name(&self) -> &str;

    fn publish_period(&self) -> f64;

    /// Block until the downstream listener confirms it is ready, or give up.
    fn await_ready(&mut self, _strategy: &ReconnectStrategy) -> SimResult<bool> {
        Ok(true)
    }

    fn on_initialize(&mut self, load: &SceneLoad);

    fn publish(&mut self, draw: &SceneDraw);

    fn stats(&self) -> SinkStats;
}

/// Attach a [`SceneVisualizer`] to the diagram being built.
pub fn connect_scene_visualizer(
    builder: &mut DiagramBuilder,
    node: &NodeContext,
    config: VisualizerConfig,
) -> SimResult<()> {
    let sink = SceneVisualizer::new(node, config)?;
    builder.add_geometry_sink(sink);
    Ok(())
}

/// Attach a [`MarkerVisualizer`] sending to `addr`.
pub fn connect_marker_visualizer(
    builder: &mut DiagramBuilder,
    node: &NodeContext,
    addr: SocketAddr,
    config: VisualizerConfig,
) -> SimResult<()> {
    let sink = MarkerVisualizer::new(node, addr, config)?;
    builder.add_geometry_sink(sink);
    Ok(())
}
