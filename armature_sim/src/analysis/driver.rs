//! Readiness handshake followed by a single-shot or iterative run.

use super::{Simulator, SimulatorStats};
use crate::error::{SimError, SimResult};
use crate::systems::Diagram;
use crate::visualization::SinkStats;
use armature_core::{NodeContext, ReconnectStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Initialize and publish once; simulated time stays at zero
    SingleShot,
    /// Repeatedly advance by a fixed increment
    #[default]
    Iterative,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::SingleShot => write!(f, "single-shot"),
            RunMode::Iterative => write!(f, "iterative"),
        }
    }
}

impl FromStr for RunMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single-shot" | "single_shot" | "singleshot" => Ok(RunMode::SingleShot),
            "iterative" => Ok(RunMode::Iterative),
            other => Err(SimError::InvalidConfig(format!(
                "unknown run mode '{}' (expected single-shot or iterative)",
                other
            ))),
        }
    }
}

/// What to do when a listener never confirms it is ready
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessPolicy {
    /// Abort with [`SimError::ListenerNotReady`] instead of warning
    pub require_all: bool,
    pub strategy: ReconnectStrategy,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            require_all: false,
            strategy: ReconnectStrategy::readiness(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub mode: RunMode,
    /// Advance calls in iterative mode
    pub steps: usize,
    /// Simulated seconds per advance call
    pub increment: f64,
    pub realtime_rate: f64,
    pub readiness: ReadinessPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Iterative,
            steps: 1000,
            increment: 0.1,
            realtime_rate: 1.0,
            readiness: ReadinessPolicy::default(),
        }
    }
}

impl DriverConfig {
    pub fn single_shot() -> Self {
        Self {
            mode: RunMode::SingleShot,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.increment.is_finite() && self.increment > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "increment must be positive, got {}",
                self.increment
            )));
        }
        if !(self.realtime_rate.is_finite() && self.realtime_rate >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "realtime rate must be >= 0, got {}",
                self.realtime_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerReport {
    pub name: String,
    pub ready: bool,
    pub stats: SinkStats,
}

/// Outcome of [`run_simulation`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub final_time: f64,
    pub advance_calls: u64,
    pub steps: u64,
    pub periodic_publishes: u64,
    pub forced_publishes: u64,
    pub listeners: Vec<ListenerReport>,
    /// The iterative loop stopped early on a shutdown request
    pub interrupted: bool,
    pub wall_time: Duration,
}

/// Wait for listeners, then run the diagram in the configured mode.
pub fn run_simulation(
    diagram: &Diagram,
    node: &NodeContext,
    config: &DriverConfig,
) -> SimResult<RunReport> {
    config.validate()?;
    let started = Instant::now();
    // The diagram may be run more than once; report only this run's counts
    let forced_before = diagram.forced_publish_count();
    let sinks_before = diagram.sink_stats();

    let statuses = diagram.await_listeners(&config.readiness.strategy)?;
    for status in statuses.iter().filter(|s| !s.ready) {
        if config.readiness.require_all {
            return Err(SimError::ListenerNotReady(status.name.clone()));
        }
        tracing::warn!(
            "Listener for '{}' did not confirm readiness; continuing without it",
            status.name
        );
    }

    let mut simulator = Simulator::new(diagram)?;
    simulator.set_target_realtime_rate(config.realtime_rate)?;

    let mut interrupted = false;
    match config.mode {
        RunMode::SingleShot => {
            simulator.initialize()?;
            diagram.publish(simulator.get_context())?;
        }
        RunMode::Iterative => {
            simulator.initialize()?;
            for iteration in 0..config.steps {
                if node.shutdown_requested() {
                    tracing::info!("Shutdown requested after {} of {} advances", iteration, config.steps);
                    interrupted = true;
                    break;
                }
                let target = simulator.get_context().time() + config.increment;
                simulator.advance_to(target)?;
            }
        }
    }

    let SimulatorStats {
        advance_calls,
        steps,
        periodic_publishes,
    } = simulator.stats();
    let listeners = statuses
        .into_iter()
        .zip(diagram.sink_stats().into_iter().zip(sinks_before))
        .map(|(status, ((_, after), (_, before)))| ListenerReport {
            name: status.name,
            ready: status.ready,
            stats: after.since(&before),
        })
        .collect();

    let report = RunReport {
        mode: config.mode,
        final_time: simulator.get_context().time(),
        advance_calls,
        steps,
        periodic_publishes,
        forced_publishes: diagram.forced_publish_count() - forced_before,
        listeners,
        interrupted,
        wall_time: started.elapsed(),
    };
    tracing::info!(
        "{} run finished: t={:.3}s, {} advances, {} plant steps, {} publishes ({:.2?} wall)",
        report.mode,
        report.final_time,
        report.advance_calls,
        report.steps,
        report.periodic_publishes + report.forced_publishes,
        report.wall_time
    );
    Ok(report)
}
