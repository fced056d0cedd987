//! Sampling module - expanded-ensemble moves and their bookkeeping.

mod acceptance;
mod sampler;
mod stats;

pub use acceptance::{metropolis, AcceptanceTerms};
pub use sampler::{Chain, ExpandedEnsembleSampler, MoveOutcome, MoveRecord, ObservationPolicy};
pub use stats::{LegStatistics, SamplerStatistics};
