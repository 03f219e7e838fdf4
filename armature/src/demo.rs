//! Wiring of the arm demo: load, weld, finalize, zero actuation, bridges, run.

use crate::config::DemoConfig;
use anyhow::{Context, Result};
use armature_core::{NodeContext, NodeOptions};
use armature_sim::analysis::{run_simulation, RunReport};
use armature_sim::control::no_control;
use armature_sim::parsing::Parser;
use armature_sim::plant::ModelInstanceIndex;
use armature_sim::resource::ResourceLocator;
use armature_sim::systems::{Diagram, DiagramBuilder};
use armature_sim::visualization::{connect_marker_visualizer, connect_scene_visualizer};
use nalgebra::Isometry3;

/// Build the demo diagram. The model resource is resolved before anything
/// else is constructed.
pub fn build_demo(config: &DemoConfig, node: &NodeContext) -> Result<(Diagram, ModelInstanceIndex)> {
    let locator = ResourceLocator::standard(&config.resource_roots);
    let path = locator
        .find_resource(&config.model)
        .with_context(|| format!("Cannot locate model '{}'", config.model))?;

    let mut builder = DiagramBuilder::new();
    let plant = builder.add_multibody_plant_scene_graph(config.plant.clone())?;
    let arm = Parser::new(plant)
        .add_model_from_file(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let base = plant
        .get_frame_by_name(&config.base_frame)
        .with_context(|| format!("Base frame '{}' is not on the model", config.base_frame))?;
    let world = plant.world_frame();
    plant.weld_frames(world, base, Isometry3::identity())?;
    plant.finalize()?;

    no_control(&mut builder, arm).context("Failed to connect zero actuation")?;

    connect_scene_visualizer(&mut builder, node, config.visualizer.clone())?;
    if config.markers.enabled {
        connect_marker_visualizer(&mut builder, node, config.markers.addr, config.visualizer.clone())
            .with_context(|| format!("Failed to open marker link to {}", config.markers.addr))?;
    }

    let diagram = builder.build().context("Failed to build diagram")?;
    Ok((diagram, arm))
}

/// Initialize the node, build and run the demo, then shut the node down.
pub fn run_demo(config: &DemoConfig) -> Result<RunReport> {
    config.validate()?;
    let node = NodeContext::init(
        NodeOptions::new(config.node_name.as_str()).disable_signals(!config.handle_signals),
    )
    .context("Failed to initialize node")?;

    let (diagram, arm) = build_demo(config, &node)?;
    tracing::info!(
        "Loaded '{}' with {} actuators; base '{}' welded to world",
        diagram.plant().model_instance(arm)?.name,
        diagram.plant().num_actuated_dofs(arm)?,
        config.base_frame
    );

    let report = run_simulation(&diagram, &node, &config.driver).context("Simulation failed")?;
    node.shutdown()?;
    Ok(report)
}
