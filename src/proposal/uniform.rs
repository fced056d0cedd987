//! Uniform chemical-state proposals.

use rand::Rng;

use super::traits::{ChemicalProposal, ProposalEngine};

/// Draws uniformly among the other candidates (or among all of them when
/// `include_self` is set). The proposal is symmetric, so its log ratio is zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformProposal {
    pub n_candidates: usize,
    pub include_self: bool,
}

impl UniformProposal {
    pub fn new(n_candidates: usize) -> Self {
        Self {
            n_candidates,
            include_self: false,
        }
    }

    pub fn with_self(mut self, include_self: bool) -> Self {
        self.include_self = include_self;
        self
    }
}

impl ProposalEngine for UniformProposal {
    fn propose<R: Rng + ?Sized>(&self, current: usize, rng: &mut R) -> ChemicalProposal {
        let choices = if self.include_self {
            self.n_candidates
        } else {
            self.n_candidates.saturating_sub(1)
        };
        if choices == 0 {
            return ChemicalProposal {
                molecule: current,
                log_p_forward: 0.0,
                log_p_reverse: 0.0,
            };
        }
        let draw = rng.gen_range(0..choices);
        let molecule = if !self.include_self && draw >= current { draw + 1 } else { draw };
        let log_p = -(choices as f64).ln();
        ChemicalProposal {
            molecule,
            log_p_forward: log_p,
            log_p_reverse: log_p,
        }
    }
}
