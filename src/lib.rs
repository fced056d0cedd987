//! SAMS-NCMC - expanded-ensemble sampling over candidate molecules
//!
//! This crate pairs a self-adjusted mixture sampling (SAMS) tracker, which learns
//! log normalizing constants of every candidate state online, with nonequilibrium
//! candidate Monte Carlo (NCMC) identity moves accepted by super-detailed balance.

pub mod analysis;
pub mod error;
pub mod io;
pub mod logging;
pub mod models;
pub mod ncmc;
pub mod proposal;
pub mod sampling;
pub mod sams;
pub mod systems;

// Re-export commonly used types at crate root
pub use analysis::{bar_estimate, exp_estimate};
pub use error::{Error, Result};
pub use io::{load_checkpoint, read_run_config, save_checkpoint, RunConfig, SamplerConfig};
pub use models::{CandidateSet, Configuration};
pub use ncmc::{
    EnergyConvention, Instantaneous, Integrator, MetropolisIntegrator, NcmcEngine, PotentialEnergy,
    Protocol, Schedules, SwitchOutcome, SwitchingScheme,
};
pub use proposal::{GeometryEngine, ProposalEngine, UniformProposal};
pub use sampling::{
    AcceptanceTerms, Chain, ExpandedEnsembleSampler, MoveOutcome, MoveRecord, ObservationPolicy,
};
pub use sams::{BiasStore, GainSchedule, MixtureHandle, MixtureState, SharedMixture};
pub use systems::{GaussianStates, HarmonicAlchemy, HarmonicMolecule};

#[cfg(test)]
mod tests;
