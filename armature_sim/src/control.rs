//! Actuation sources for models that are not controlled.

use crate::error::SimResult;
use crate::plant::ModelInstanceIndex;
use crate::systems::{ConstantVectorSource, DiagramBuilder, SystemId};

/// Connect a zero command of the model's actuator count to its actuation input.
///
/// The model then moves under gravity and its own dynamics alone.
pub fn no_control(builder: &mut DiagramBuilder, model: ModelInstanceIndex) -> SimResult<SystemId> {
    let plant = builder.plant()?;
    let nu = plant.num_actuated_dofs(model)?;
    let name = format!("{}_zero_actuation", plant.model_instance(model)?.name);

    let source = builder.add_system(ConstantVectorSource::zeros(name, nu));
    builder.connect_actuation(source, model)?;
    Ok(source)
}
