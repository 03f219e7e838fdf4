//! Tracing subscriber setup.
//!
//! Libraries only emit `tracing` events; binaries call [`init_logging`] once
//! at startup. `RUST_LOG` takes precedence over the default directive.

use crate::error::{ArmatureError, ArmatureResult};
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"info"` or `"armature_sim=debug,info"`).
pub fn init_logging(default_directive: &str) -> ArmatureResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| ArmatureError::Config(format!("Invalid log directive: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| ArmatureError::Internal(format!("Failed to install tracing subscriber: {}", e)))
}
