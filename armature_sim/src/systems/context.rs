use crate::plant::PlantState;

/// Mutable state of one [`Diagram`](super::Diagram): simulated time, the
/// discrete step counter, engine state and the sink publish schedule.
#[derive(Debug)]
pub struct Context {
    time: f64,
    step_count: u64,
    plant_state: PlantState,
    /// Next due publish per sink: a period index, or a step count for
    /// sinks that publish every step
    next_publish: Vec<u64>,
    initialized: bool,
}

impl Context {
    pub(crate) fn new(plant_state: PlantState, num_sinks: usize) -> Self {
        Self {
            time: 0.0,
            step_count: 0,
            plant_state,
            next_publish: vec![0; num_sinks],
            initialized: false,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Plant steps taken so far
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn plant_state(&self) -> &PlantState {
        &self.plant_state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn plant_state_mut(&mut self) -> &mut PlantState {
        &mut self.plant_state
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub(crate) fn record_step(&mut self, time: f64) {
        self.step_count += 1;
        self.time = time;
    }

    pub(crate) fn next_publish(&self, sink: usize) -> u64 {
        self.next_publish[sink]
    }

    pub(crate) fn set_next_publish(&mut self, sink: usize, next: u64) {
        self.next_publish[sink] = next;
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
        self.next_publish.iter_mut().for_each(|n| *n = 0);
    }
}
