//! Time advancement with realtime pacing.

use crate::error::{SimError, SimResult};
use crate::systems::{Context, Diagram};
use std::time::{Duration, Instant};

const TIME_EPSILON: f64 = 1e-9;

/// Counters accumulated over a simulator's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub advance_calls: u64,
    pub steps: u64,
    pub periodic_publishes: u64,
}

/// Advances a [`Context`] through a [`Diagram`].
///
/// Plant updates happen at `k * time_step`; sinks publish on their own
/// period. With a positive realtime rate each step waits until wall time
/// catches up with `simulated time / rate`.
pub struct Simulator<'a> {
    diagram: &'a Diagram,
    context: Context,
    realtime_rate: f64,
    /// (wall clock, simulated time) pair pacing is measured from
    anchor: Option<(Instant, f64)>,
    stats: SimulatorStats,
}

impl<'a> Simulator<'a> {
    pub fn new(diagram: &'a Diagram) -> SimResult<Self> {
        let context = diagram.create_default_context()?;
        Ok(Self::with_context(diagram, context))
    }

    pub fn with_context(diagram: &'a Diagram, context: Context) -> Self {
        Self {
            diagram,
            context,
            realtime_rate: 0.0,
            anchor: None,
            stats: SimulatorStats::default(),
        }
    }

    /// 1.0 runs at wall-clock speed, 0.0 runs as fast as possible.
    pub fn set_target_realtime_rate(&mut self, rate: f64) -> SimResult<()> {
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "realtime rate must be >= 0, got {}",
                rate
            )));
        }
        if rate != self.realtime_rate {
            self.realtime_rate = rate;
            self.anchor = None;
        }
        Ok(())
    }

    pub fn target_realtime_rate(&self) -> f64 {
        self.realtime_rate
    }

    pub fn diagram(&self) -> &Diagram {
        self.diagram
    }

    pub fn get_context(&self) -> &Context {
        &self.context
    }

    pub fn get_mutable_context(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    /// Run initialization events without advancing time.
    pub fn initialize(&mut self) -> SimResult<()> {
        self.diagram.initialize_sinks(&mut self.context);
        self.anchor = None;
        tracing::debug!("Simulator initialized at t={}", self.context.time());
        Ok(())
    }

    /// Advance to simulated time `t`, taking every plant step due on the way.
    pub fn advance_to(&mut self, t: f64) -> SimResult<()> {
        let current = self.context.time();
        if !t.is_finite() || t < current {
            return Err(SimError::InvalidTime {
                requested: t,
                current,
            });
        }
        if !self.context.is_initialized() {
            self.initialize()?;
        }
        self.stats.advance_calls += 1;
        if self.anchor.is_none() {
            self.anchor = Some((Instant::now(), current));
        }

        let time_step = self.diagram.plant().time_step();
        loop {
            self.stats.periodic_publishes += self.diagram.dispatch_periodic(&mut self.context);

            let next_time = (self.context.step_count() + 1) as f64 * time_step;
            if next_time > t + TIME_EPSILON {
                break;
            }
            self.diagram.step_plant(&mut self.context);
            self.stats.steps += 1;
            self.pace();
        }

        self.context.set_time(t);
        self.stats.periodic_publishes += self.diagram.dispatch_periodic(&mut self.context);
        Ok(())
    }

    fn pace(&self) {
        if self.realtime_rate <= 0.0 {
            return;
        }
        let Some((wall_anchor, sim_anchor)) = self.anchor else {
            return;
        };
        let ahead = (self.context.time() - sim_anchor) / self.realtime_rate;
        let target = wall_anchor + Duration::from_secs_f64(ahead.max(0.0));
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
    }
}
