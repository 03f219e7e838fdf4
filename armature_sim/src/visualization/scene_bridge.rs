//! In-process visualizer bridge publishing on hub topics.

use super::{GeometrySink, SinkStats, VisualizerConfig};
use crate::error::SimResult;
use armature_core::{Hub, NodeContext};
use armature_library::messages::{SceneDraw, SceneLoad};

pub const SCENE_LOAD_TOPIC: &str = "scene/load";
pub const SCENE_DRAW_TOPIC: &str = "scene/draw";

pub struct SceneVisualizer {
    name: String,
    config: VisualizerConfig,
    load_hub: Hub<SceneLoad>,
    draw_hub: Hub<SceneDraw>,
    stats: SinkStats,
}

impl SceneVisualizer {
    pub fn new(node: &NodeContext, config: VisualizerConfig) -> SimResult<Self> {
        let load_hub = node.advertise::<SceneLoad>(SCENE_LOAD_TOPIC)?;
        let draw_hub = node.advertise::<SceneDraw>(SCENE_DRAW_TOPIC)?;
        tracing::info!(
            "SceneVisualizer on '{}' / '{}' (period {}s)",
            SCENE_LOAD_TOPIC,
            SCENE_DRAW_TOPIC,
            config.publish_period
        );
        Ok(Self {
            name: format!("{}/scene_visualizer", node.name()),
            config,
            load_hub,
            draw_hub,
            stats: SinkStats::default(),
        })
    }
}

impl GeometrySink for SceneVisualizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish_period(&self) -> f64 {
        self.config.publish_period
    }

    fn on_initialize(&mut self, load: &SceneLoad) {
        self.stats.initializations += 1;
        if let Err(e) = self.load_hub.send(load.clone()) {
            self.stats.send_failures += 1;
            tracing::warn!("{}: failed to publish scene load: {}", self.name, e);
        }
    }

    fn publish(&mut self, draw: &SceneDraw) {
        self.stats.publishes += 1;
        if let Err(e) = self.draw_hub.send(draw.clone()) {
            self.stats.send_failures += 1;
            tracing::warn!("{}: failed to publish scene draw: {}", self.name, e);
        }
    }

    fn stats(&self) -> SinkStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature_core::NodeOptions;
    use armature_library::messages::LinkPose;
    use armature_library::Transform;

    fn node(name: &str) -> NodeContext {
        NodeContext::init(NodeOptions::new(name).disable_signals(true)).unwrap()
    }

    #[test]
    fn test_publishes_on_both_topics() {
        let node = node("scene_test");
        let mut sink = SceneVisualizer::new(&node, VisualizerConfig::default()).unwrap();
        let loads = node.subscribe::<SceneLoad>(SCENE_LOAD_TOPIC).unwrap();
        let draws = node.subscribe::<SceneDraw>(SCENE_DRAW_TOPIC).unwrap();

        sink.on_initialize(&SceneLoad { geometries: vec![] });
        sink.publish(&SceneDraw {
            timestamp: 0.25,
            poses: vec![LinkPose {
                frame_name: "arm::base".to_string(),
                pose: Transform::identity(),
            }],
        });

        assert_eq!(loads.drain().len(), 1);
        let draw = draws.recv().unwrap();
        assert_eq!(draw.timestamp, 0.25);
        assert_eq!(
            sink.stats(),
            SinkStats {
                initializations: 1,
                publishes: 1,
                send_failures: 0
            }
        );
    }

    #[test]
    fn test_send_after_shutdown_is_counted_not_fatal() {
        let node = node("scene_shutdown");
        let mut sink = SceneVisualizer::new(&node, VisualizerConfig::default()).unwrap();
        node.shutdown().unwrap();

        sink.publish(&SceneDraw {
            timestamp: 0.0,
            poses: vec![],
        });
        assert_eq!(sink.stats().send_failures, 1);
    }
}
