//! Error types for model loading, plant construction and simulation.

use armature_core::ArmatureError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Resource '{name}' not found; searched: {searched:?}")]
    ResourceNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Invalid resource name '{name}': {reason}")]
    InvalidResourceName { name: String, reason: String },

    #[error("Unsupported model format for '{0}' (expected .sdf or .urdf)")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to parse '{source_name}': {message}")]
    Parse { source_name: String, message: String },

    #[error("Invalid model '{model}': {message}")]
    ModelValidation { model: String, message: String },

    #[error("Model '{0}' has already been added to this plant")]
    DuplicateModel(String),

    #[error("Unknown model instance {0}")]
    UnknownModel(usize),

    #[error("Frame '{0}' not found")]
    FrameNotFound(String),

    #[error("Joint '{0}' not found")]
    JointNotFound(String),

    #[error("Frame name '{name}' is ambiguous; it exists in models {models:?}")]
    AmbiguousFrame { name: String, models: Vec<String> },

    #[error("Cannot weld '{child}' to '{parent}': {reason}")]
    InvalidWeld {
        parent: String,
        child: String,
        reason: String,
    },

    #[error("Plant is finalized; '{0}' is no longer allowed")]
    PlantFinalized(&'static str),

    #[error("Plant is not finalized; '{0}' requires a finalized plant")]
    PlantNotFinalized(&'static str),

    #[error("Diagram has no multibody plant")]
    NoPlant,

    #[error("Diagram already has a multibody plant")]
    PlantAlreadyAdded,

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Actuation input of model '{0}' is already connected")]
    PortAlreadyConnected(String),

    #[error("Actuation input of model '{model}' ({nu} actuators) is not connected")]
    UnconnectedActuation { model: String, nu: usize },

    #[error("Unknown system id {0}")]
    UnknownSystem(usize),

    #[error("Cannot advance to t={requested}: current time is {current}")]
    InvalidTime { requested: f64, current: f64 },

    #[error("Listener for '{0}' did not confirm readiness")]
    ListenerNotReady(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] ArmatureError),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        SimError::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn validation(model: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::ModelValidation {
            model: model.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Core(ArmatureError::Io(err))
    }
}
