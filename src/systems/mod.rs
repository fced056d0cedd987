//! Systems module - toy alchemical systems with analytic free energies.

mod gaussian;
mod harmonic;

pub use gaussian::GaussianStates;
pub use harmonic::{HarmonicAlchemy, HarmonicGeometry, HarmonicMolecule};
