//! Collaborator traits for chemical-state and geometry proposals.

use nalgebra::Vector3;
use rand::Rng;

/// A proposed molecular identity with its forward and reverse log-probabilities.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChemicalProposal {
    pub molecule: usize,
    /// log P(new | current)
    pub log_p_forward: f64,
    /// log P(current | new)
    pub log_p_reverse: f64,
}

impl ChemicalProposal {
    /// log P(current | new) − log P(new | current)
    pub fn log_ratio(&self) -> f64 {
        self.log_p_reverse - self.log_p_forward
    }
}

/// Proposes a new discrete molecular identity.
pub trait ProposalEngine {
    fn propose<R: Rng + ?Sized>(&self, current: usize, rng: &mut R) -> ChemicalProposal;

    /// True when the proposed molecule is itself a draw from the biased
    /// expanded ensemble (a Gibbs draw over all candidates). Only then may the
    /// proposal stand in for the occupied molecule as a mixture observation.
    fn draws_from_ensemble(&self) -> bool {
        false
    }
}

/// Positions for the atoms of an incoming molecule plus the proposal densities.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryProposal {
    pub positions: Vec<Vector3<f64>>,
    pub log_p_forward: f64,
    pub log_p_reverse: f64,
}

/// Proposes positions for molecule-specific atoms given the core.
pub trait GeometryEngine {
    /// Grow the atoms of `to` (replacing `from`) around `core`.
    /// Returns the positions and their log proposal density.
    fn propose<R: Rng + ?Sized>(
        &self,
        core: &[Vector3<f64>],
        from: usize,
        to: usize,
        rng: &mut R,
    ) -> (Vec<Vector3<f64>>, f64);

    /// Log density with which the reverse move (`to` → `from`) would regrow
    /// `old_specific` around `core`. Zero when there are no such atoms.
    fn log_p_reverse(
        &self,
        core: &[Vector3<f64>],
        from: usize,
        to: usize,
        old_specific: &[Vector3<f64>],
    ) -> f64;

    /// Forward proposal and the reverse density of the current old atoms in one call.
    fn propose_with_reverse<R: Rng + ?Sized>(
        &self,
        core: &[Vector3<f64>],
        old_specific: &[Vector3<f64>],
        from: usize,
        to: usize,
        rng: &mut R,
    ) -> GeometryProposal {
        let (positions, log_p_forward) = self.propose(core, from, to, rng);
        let log_p_reverse = self.log_p_reverse(core, from, to, old_specific);
        GeometryProposal {
            positions,
            log_p_forward,
            log_p_reverse,
        }
    }
}
