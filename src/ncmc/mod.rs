//! NCMC module - protocols, propagators and the switching engine.

mod integrator;
mod protocol;
mod switching;
mod traits;

pub use integrator::{Instantaneous, MetropolisIntegrator};
pub use protocol::{Protocol, Schedules, SwitchingScheme};
pub use switching::{EnergyConvention, NcmcEngine, SwitchOutcome, SwitchResult, WorkAccumulator};
pub use traits::{Integrator, PotentialEnergy};
