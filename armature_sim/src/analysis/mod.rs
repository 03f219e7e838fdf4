//! Running a built diagram through simulated time.

mod driver;
mod simulator;

pub use driver::{run_simulation, DriverConfig, ListenerReport, ReadinessPolicy, RunMode, RunReport};
pub use simulator::{Simulator, SimulatorStats};
