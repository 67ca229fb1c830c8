pub mod bootstrap;
pub mod returns;

pub use bootstrap::{
    compound_path, run_simulation, simulate, SimulationInput, SimulationRun, DEFAULT_HORIZON,
    DEFAULT_SIMULATIONS,
};
pub use returns::{ReturnObservation, ReturnsSeries};
