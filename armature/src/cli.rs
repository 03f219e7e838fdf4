use crate::config::DemoConfig;
use anyhow::Result;
use armature_sim::analysis::RunMode;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command line for the `demo` binary. Every flag overrides the matching
/// value from `--config`.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "demo")]
#[command(about = "Simulate an unactuated iiwa7 arm welded to the world", long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// single-shot or iterative
    #[arg(short, long)]
    pub mode: Option<RunMode>,

    /// Advance calls in iterative mode
    #[arg(long)]
    pub steps: Option<usize>,

    /// Simulated seconds per advance call
    #[arg(long)]
    pub increment: Option<f64>,

    /// 1.0 is wall-clock speed, 0 runs unthrottled
    #[arg(long)]
    pub realtime_rate: Option<f64>,

    /// Plant discrete time step in seconds
    #[arg(long)]
    pub time_step: Option<f64>,

    /// Model resource name (armature/...)
    #[arg(long)]
    pub model: Option<String>,

    /// Frame welded to the world
    #[arg(long)]
    pub base_frame: Option<String>,

    /// UDP address of the marker listener
    #[arg(long)]
    pub marker_addr: Option<SocketAddr>,

    /// Do not attach the marker visualizer
    #[arg(long)]
    pub no_markers: bool,

    /// Fail when a listener does not confirm readiness
    #[arg(long)]
    pub require_listeners: bool,

    /// Extra resource search root (repeatable)
    #[arg(long = "resource-root")]
    pub resource_roots: Vec<PathBuf>,

    /// Default tracing directive when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,

    /// Stop the iterative loop on Ctrl+C
    #[arg(long)]
    pub handle_signals: bool,
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Defaults, then the config file, then command-line flags.
    pub fn load_config(&self) -> Result<DemoConfig> {
        let mut config = match &self.config {
            Some(path) => DemoConfig::from_file(path)?,
            None => DemoConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut DemoConfig) {
        if let Some(mode) = self.mode {
            config.driver.mode = mode;
        }
        if let Some(steps) = self.steps {
            config.driver.steps = steps;
        }
        if let Some(increment) = self.increment {
            config.driver.increment = increment;
        }
        if let Some(rate) = self.realtime_rate {
            config.driver.realtime_rate = rate;
        }
        if let Some(time_step) = self.time_step {
            config.plant.time_step = time_step;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(frame) = &self.base_frame {
            config.base_frame = frame.clone();
        }
        if let Some(addr) = self.marker_addr {
            config.markers.addr = addr;
        }
        if self.no_markers {
            config.markers.enabled = false;
        }
        if self.require_listeners {
            config.driver.readiness.require_all = true;
        }
        if self.handle_signals {
            config.handle_signals = true;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        // CLI roots are searched before the ones from the file
        let mut roots = self.resource_roots.clone();
        roots.append(&mut config.resource_roots);
        config.resource_roots = roots;
    }
}
