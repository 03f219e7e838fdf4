//! Demo configuration: defaults, optional TOML file, CLI overrides on top.

use anyhow::{bail, Context, Result};
use armature_sim::analysis::DriverConfig;
use armature_sim::plant::PlantConfig;
use armature_sim::visualization::{VisualizerConfig, DEFAULT_MARKER_ADDR};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str =
    "armature/manipulation/models/iiwa_description/iiwa7/iiwa7_no_collision.sdf";
pub const DEFAULT_BASE_FRAME: &str = "iiwa_link_0";
pub const DEFAULT_NODE_NAME: &str = "demo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSettings {
    pub enabled: bool,
    pub addr: SocketAddr,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: DEFAULT_MARKER_ADDR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub node_name: String,
    /// Install a Ctrl+C handler that stops the iterative loop
    pub handle_signals: bool,
    pub log_level: String,
    /// Resource name of the model description
    pub model: String,
    /// Frame welded to the world frame
    pub base_frame: String,
    pub resource_roots: Vec<PathBuf>,
    pub plant: PlantConfig,
    pub driver: DriverConfig,
    pub visualizer: VisualizerConfig,
    pub markers: MarkerSettings,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            handle_signals: false,
            log_level: "info".to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_frame: DEFAULT_BASE_FRAME.to_string(),
            resource_roots: Vec::new(),
            plant: PlantConfig::default(),
            driver: DriverConfig::default(),
            visualizer: VisualizerConfig::default(),
            markers: MarkerSettings::default(),
        }
    }
}

impl DemoConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse TOML config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_name.trim().is_empty() {
            bail!("node_name must not be empty");
        }
        if self.base_frame.trim().is_empty() {
            bail!("base_frame must not be empty");
        }
        if !(self.visualizer.publish_period.is_finite() && self.visualizer.publish_period >= 0.0) {
            bail!(
                "visualizer.publish_period must be >= 0, got {}",
                self.visualizer.publish_period
            );
        }
        self.plant.validate()?;
        self.driver.validate()?;
        Ok(())
    }
}
