//! Proposal module - chemical-state and geometry proposal collaborators.

mod traits;
mod uniform;

pub use traits::{ChemicalProposal, GeometryEngine, GeometryProposal, ProposalEngine};
pub use uniform::UniformProposal;
