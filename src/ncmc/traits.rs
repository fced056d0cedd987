//! Collaborator traits for nonequilibrium switching.

use rand::Rng;

use crate::error::Result;
use crate::models::Configuration;

/// Reduced potential evaluator (energy in units of kT).
///
/// A non-finite return value signals a steric overlap.
pub trait PotentialEnergy {
    /// Reduced potential of `config`, whose old-specific atoms belong to
    /// `molecule`, with those atoms coupled at `lambda` (1 = fully interacting).
    fn energy(&self, config: &Configuration, molecule: usize, lambda: f64) -> f64;

    /// Reduced potential of a hybrid configuration: `old` owns the old-specific
    /// atoms, `new` the new-specific ones. λ = 0 has the old molecule fully
    /// interacting, λ = 1 the new one.
    fn hybrid_energy(&self, config: &Configuration, old: usize, new: usize, lambda: f64) -> f64;
}

/// Propagator applied at fixed λ between perturbation steps.
pub trait Integrator {
    /// Reject parameters under which `propagate` could not move the configuration.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn propagate<R: Rng + ?Sized>(
        &self,
        config: &mut Configuration,
        energy: &dyn Fn(&Configuration) -> f64,
        rng: &mut R,
    );
}
