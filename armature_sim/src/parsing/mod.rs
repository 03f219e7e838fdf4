//! Robot description loading into a [`MultibodyPlant`].

pub mod description;
mod sdf;
mod urdf;

pub use description::{
    Inertial, JointDescription, JointKind, JointLimits, LinkDescription, ModelDescription,
    VisualDescription,
};
pub use sdf::parse_sdf;
pub use urdf::parse_urdf;

use crate::error::{SimError, SimResult};
use crate::plant::{ModelInstanceIndex, MultibodyPlant};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Sdf,
    Urdf,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "sdf" => Some(ModelFormat::Sdf),
            "urdf" => Some(ModelFormat::Urdf),
            _ => None,
        }
    }
}

/// Adds parsed models to a plant that is still being built.
pub struct Parser<'a> {
    plant: &'a mut MultibodyPlant,
}

impl<'a> Parser<'a> {
    pub fn new(plant: &'a mut MultibodyPlant) -> Self {
        Self { plant }
    }

    pub fn add_model_from_file(&mut self, path: &Path) -> SimResult<ModelInstanceIndex> {
        let format =
            ModelFormat::from_path(path).ok_or_else(|| SimError::UnsupportedFormat(path.to_path_buf()))?;
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Parsing {:?} model from {}", format, path.display());
        self.add(&text, format, &path.display().to_string())
    }

    pub fn add_model_from_string(
        &mut self,
        text: &str,
        format: ModelFormat,
    ) -> SimResult<ModelInstanceIndex> {
        self.add(text, format, "<string>")
    }

    fn add(&mut self, text: &str, format: ModelFormat, source_name: &str) -> SimResult<ModelInstanceIndex> {
        let description = match format {
            ModelFormat::Sdf => parse_sdf(text, source_name)?,
            ModelFormat::Urdf => parse_urdf(text, source_name)?,
        };
        self.plant.add_model(description)
    }
}
