//! Traits for reading and updating mixture weights.

use super::mixture::MixtureState;
use crate::error::Result;

/// Read access to the learned per-state bias.
///
/// Lookups outside the stored legs or candidates return `None`.
pub trait BiasStore {
    /// Target log-weight g for `molecule` on `leg`.
    fn get_bias(&self, leg: usize, molecule: usize) -> Option<f64>;
    /// Current exploration weight π for `molecule`.
    fn get_pi(&self, molecule: usize) -> Option<f64>;
}

/// Where a sampler reads its bias from and records its observations.
///
/// Implemented by an owned `MixtureState` (one chain, private state) and by
/// `SharedMixture` (several replicas pooling statistics under a lock).
pub trait MixtureHandle {
    /// Bias vector for `leg`, read once at the start of an iteration.
    fn bias(&self, leg: usize) -> Vec<f64>;

    /// Copy of the current state.
    fn snapshot(&self) -> MixtureState;

    /// Apply one completed iteration; returns the new iteration count.
    fn record(&mut self, observed: &[usize]) -> Result<u64>;
}

impl MixtureHandle for MixtureState {
    fn bias(&self, leg: usize) -> Vec<f64> {
        MixtureState::bias(self, leg)
    }

    fn snapshot(&self) -> MixtureState {
        self.clone()
    }

    fn record(&mut self, observed: &[usize]) -> Result<u64> {
        *self = self.observe(observed)?;
        Ok(self.iteration())
    }
}
