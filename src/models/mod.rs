//! Models module - candidate sets and partitioned configurations.

mod candidates;
mod configuration;

pub use candidates::CandidateSet;
pub use configuration::{Block, Configuration};
