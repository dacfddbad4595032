pub mod driver;
pub mod power;

pub use driver::{AreaSource, Command, InspectReport, SimState, SimulationDriver};
pub use power::power_from_areas;
