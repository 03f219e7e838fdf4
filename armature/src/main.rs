use anyhow::{Context, Result};
use armature::cli::Cli;
use armature::demo::run_demo;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    armature_core::logging::init_logging(&config.log_level).context("Failed to set up logging")?;

    tracing::info!("Starting armature demo v{}", armature::VERSION);
    tracing::info!("Mode: {}", config.driver.mode);

    let report = run_demo(&config)?;
    tracing::debug!("Run report: {}", serde_json::to_string(&report)?);
    if report.interrupted {
        tracing::warn!("Run interrupted at t={:.3}s", report.final_time);
    }
    Ok(())
}
