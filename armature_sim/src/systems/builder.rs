//! One-time wiring of plant, sources and geometry sinks.

use super::{Diagram, SystemId, VectorSource};
use crate::error::{SimError, SimResult};
use crate::plant::{ModelInstanceIndex, MultibodyPlant, PlantConfig};
use crate::visualization::GeometrySink;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct DiagramBuilder {
    plant: Option<MultibodyPlant>,
    sources: Vec<Box<dyn VectorSource>>,
    actuation: BTreeMap<ModelInstanceIndex, SystemId>,
    sinks: Vec<Box<dyn GeometrySink>>,
}

impl DiagramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the multibody plant together with its scene graph.
    pub fn add_multibody_plant_scene_graph(
        &mut self,
        config: PlantConfig,
    ) -> SimResult<&mut MultibodyPlant> {
        if self.plant.is_some() {
            return Err(SimError::PlantAlreadyAdded);
        }
        config.validate()?;
        tracing::debug!("Adding plant with time_step {}s", config.time_step);
        Ok(self.plant.insert(MultibodyPlant::new(config)))
    }

    pub fn plant(&self) -> SimResult<&MultibodyPlant> {
        self.plant.as_ref().ok_or(SimError::NoPlant)
    }

    pub fn plant_mut(&mut self) -> SimResult<&mut MultibodyPlant> {
        self.plant.as_mut().ok_or(SimError::NoPlant)
    }

    pub fn add_system(&mut self, source: impl VectorSource + 'static) -> SystemId {
        let id = SystemId(self.sources.len());
        tracing::debug!("Added system '{}' ({} outputs) as {}", source.name(), source.size(), id);
        self.sources.push(Box::new(source));
        id
    }

    /// Wire `source` to the actuation input of `model`.
    pub fn connect_actuation(
        &mut self,
        source: SystemId,
        model: ModelInstanceIndex,
    ) -> SimResult<()> {
        let plant = self.plant()?;
        let port = plant.get_actuation_input_port(model)?;
        let model_name = plant.model_instance(model)?.name.clone();

        let system = self
            .sources
            .get(source.0)
            .ok_or(SimError::UnknownSystem(source.0))?;
        if system.size() != port.size {
            return Err(SimError::DimensionMismatch {
                what: format!("actuation input of '{}'", model_name),
                expected: port.size,
                actual: system.size(),
            });
        }
        if self.actuation.contains_key(&model) {
            return Err(SimError::PortAlreadyConnected(model_name));
        }

        tracing::info!(
            "Connected '{}' to actuation input of '{}' ({} actuators)",
            system.name(),
            model_name,
            port.size
        );
        self.actuation.insert(model, source);
        Ok(())
    }

    pub fn add_geometry_sink(&mut self, sink: impl GeometrySink + 'static) {
        tracing::debug!("Added geometry sink '{}'", sink.name());
        self.sinks.push(Box::new(sink));
    }

    pub fn num_geometry_sinks(&self) -> usize {
        self.sinks.len()
    }

    /// Freeze the wiring. Every model with actuators must have a source.
    pub fn build(self) -> SimResult<Diagram> {
        let plant = self.plant.ok_or(SimError::NoPlant)?;
        if !plant.is_finalized() {
            return Err(SimError::PlantNotFinalized("build"));
        }

        for index in 1..plant.num_model_instances() {
            let model = ModelInstanceIndex(index);
            let instance = plant.model_instance(model)?;
            if instance.num_actuated_dofs() > 0 && !self.actuation.contains_key(&model) {
                return Err(SimError::UnconnectedActuation {
                    model: instance.name.clone(),
                    nu: instance.num_actuated_dofs(),
                });
            }
        }

        Ok(Diagram::new(plant, self.sources, self.actuation, self.sinks))
    }
}
