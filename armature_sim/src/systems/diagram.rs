use super::{Context, SystemId, VectorSource};
use crate::error::{SimError, SimResult};
use crate::geometry::SceneGraph;
use crate::plant::{ModelInstanceIndex, MultibodyPlant};
use crate::visualization::{GeometrySink, SinkStats};
use armature_core::ReconnectStrategy;
use nalgebra::DVector;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Readiness of one sink's downstream listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStatus {
    pub name: String,
    pub ready: bool,
}

/// Fully wired, immutable composition of plant, scene graph, sources and sinks.
pub struct Diagram {
    plant: MultibodyPlant,
    scene_graph: SceneGraph,
    sources: Vec<Box<dyn VectorSource>>,
    actuation: BTreeMap<ModelInstanceIndex, SystemId>,
    sinks: Vec<Mutex<Box<dyn GeometrySink>>>,
    forced_publishes: AtomicU64,
}

impl Diagram {
    pub(crate) fn new(
        plant: MultibodyPlant,
        sources: Vec<Box<dyn VectorSource>>,
        actuation: BTreeMap<ModelInstanceIndex, SystemId>,
        sinks: Vec<Box<dyn GeometrySink>>,
    ) -> Self {
        let scene_graph = SceneGraph::from_plant(&plant);
        tracing::info!(
            "Diagram built: {} sources, {} geometry sinks, {} geometries on {} frames",
            sources.len(),
            sinks.len(),
            scene_graph.num_geometries(),
            scene_graph.num_frames()
        );
        Self {
            plant,
            scene_graph,
            sources,
            actuation,
            sinks: sinks.into_iter().map(Mutex::new).collect(),
            forced_publishes: AtomicU64::new(0),
        }
    }

    pub fn plant(&self) -> &MultibodyPlant {
        &self.plant
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.scene_graph
    }

    pub fn num_sinks(&self) -> usize {
        self.sinks.len()
    }

    /// Lifetime counters of every sink, in connection order
    pub fn sink_stats(&self) -> Vec<(String, SinkStats)> {
        self.sinks
            .iter()
            .map(|sink| {
                let sink = sink.lock();
                (sink.name().to_string(), sink.stats())
            })
            .collect()
    }

    /// Publishes triggered through [`Diagram::publish`] over the diagram's lifetime
    pub fn forced_publish_count(&self) -> u64 {
        self.forced_publishes.load(Ordering::Relaxed)
    }

    pub fn create_default_context(&self) -> SimResult<Context> {
        Ok(Context::new(self.plant.create_state()?, self.sinks.len()))
    }

    /// Value on the actuation input of `model` at the context's time.
    pub fn eval_actuation_input(
        &self,
        context: &Context,
        model: ModelInstanceIndex,
    ) -> SimResult<DVector<f64>> {
        let nu = self.plant.num_actuated_dofs(model)?;
        match self.actuation.get(&model) {
            Some(id) => {
                let source = self.sources.get(id.0).ok_or(SimError::UnknownSystem(id.0))?;
                Ok(source.eval(context.time()))
            }
            None if nu == 0 => Ok(DVector::zeros(0)),
            None => Err(SimError::UnconnectedActuation {
                model: self.plant.model_instance(model)?.name.clone(),
                nu,
            }),
        }
    }

    fn actuation_at(&self, time: f64) -> HashMap<ModelInstanceIndex, DVector<f64>> {
        self.actuation
            .iter()
            .filter_map(|(model, id)| {
                self.sources
                    .get(id.0)
                    .map(|source| (*model, source.eval(time)))
            })
            .collect()
    }

    /// Take one discrete plant step from the context's current step.
    pub(crate) fn step_plant(&self, context: &mut Context) {
        let actuation = self.actuation_at(context.time());
        self.plant.step(context.plant_state_mut(), &actuation);
        let next_time = (context.step_count() + 1) as f64 * self.plant.time_step();
        context.record_step(next_time);
    }

    /// Forced publish: every sink draws the current poses once.
    pub fn publish(&self, context: &Context) -> SimResult<()> {
        let draw = self
            .scene_graph
            .scene_draw(context.plant_state(), context.time());
        for sink in &self.sinks {
            sink.lock().publish(&draw);
        }
        self.forced_publishes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Forced publish at t={:.3}", context.time());
        Ok(())
    }

    /// Run initialization events: every sink receives the scene geometry.
    pub(crate) fn initialize_sinks(&self, context: &mut Context) {
        let load = self.scene_graph.scene_load();
        for sink in &self.sinks {
            sink.lock().on_initialize(&load);
        }
        context.mark_initialized();
    }

    /// Publish every sink whose next publish time has been reached.
    /// Returns the number of sink publishes.
    pub(crate) fn dispatch_periodic(&self, context: &mut Context) -> u64 {
        const EPSILON: f64 = 1e-9;
        let mut draw = None;
        let mut published = 0;

        for (index, sink) in self.sinks.iter().enumerate() {
            let mut sink = sink.lock();
            let period = sink.publish_period();
            let next = context.next_publish(index);

            let due = if period > 0.0 {
                next as f64 * period <= context.time() + EPSILON
            } else {
                context.step_count() >= next
            };
            if !due {
                continue;
            }

            let current = draw.get_or_insert_with(|| {
                self.scene_graph
                    .scene_draw(context.plant_state(), context.time())
            });
            sink.publish(current);
            published += 1;

            let following = if period > 0.0 {
                ((context.time() + EPSILON) / period).floor() as u64 + 1
            } else {
                context.step_count() + 1
            };
            context.set_next_publish(index, following);
        }
        published
    }

    /// Ask every sink to confirm its listener.
    pub fn await_listeners(&self, strategy: &ReconnectStrategy) -> SimResult<Vec<ListenerStatus>> {
        let mut statuses = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let mut sink = sink.lock();
            let ready = sink.await_ready(strategy)?;
            statuses.push(ListenerStatus {
                name: sink.name().to_string(),
                ready,
            });
        }
        Ok(statuses)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use armature_library::messages::{SceneDraw, SceneLoad};
    use std::sync::Arc;

    /// Sink recording the timestamps it was asked to draw
    pub struct RecordingSink {
        pub name: String,
        pub period: f64,
        pub draws: Arc<Mutex<Vec<f64>>>,
        pub loads: Arc<Mutex<usize>>,
        pub ready: bool,
    }

    impl RecordingSink {
        pub fn new(period: f64) -> Self {
            Self {
                name: format!("recording@{}", period),
                period,
                draws: Arc::new(Mutex::new(Vec::new())),
                loads: Arc::new(Mutex::new(0)),
                ready: true,
            }
        }
    }

    impl GeometrySink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn publish_period(&self) -> f64 {
            self.period
        }

        fn await_ready(&mut self, _strategy: &ReconnectStrategy) -> SimResult<bool> {
            Ok(self.ready)
        }

        fn on_initialize(&mut self, _load: &SceneLoad) {
            *self.loads.lock() += 1;
        }

        fn publish(&mut self, draw: &SceneDraw) {
            self.draws.lock().push(draw.timestamp);
        }

        fn stats(&self) -> SinkStats {
            SinkStats {
                initializations: *self.loads.lock() as u64,
                publishes: self.draws.lock().len() as u64,
                send_failures: 0,
            }
        }
    }
}
