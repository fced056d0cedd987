//! Mixture weight tracker for self-adjusted mixture sampling.
//!
//! Each leg carries a vector ζ of log normalizing-constant estimates, one per
//! candidate. The exploration weights are
//!
//!   log πⱼ = aⱼ − logsumexp(a),   aⱼ = ζ_complex,ⱼ − ζ_solvent,ⱼ
//!
//! for the two-leg design (leg 0 is the protein-bound leg, leg 1 the solvent leg)
//! and aⱼ = ζⱼ for a single leg. π is never formed in linear space for the
//! update: the step uses gⱼ = −log πⱼ directly,
//!
//!   ζⱼ ← ζⱼ + δ(j, observed) · min(γₙ exp(gⱼ), 1)
//!
//! followed by re-anchoring ζ[reference] to zero. The cap is the first-stage
//! rule of optimally adjusted mixture sampling (an effective gain of
//! min(γₙ, πⱼ)). Without it a state whose π has collapsed receives a step of
//! order 1/π on its first visit and ζ diverges within a few iterations. Once π
//! is accurate the cap is inactive and the plain γₙ/πⱼ recursion remains.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::gain::GainSchedule;
use super::traits::BiasStore;
use crate::error::{Error, Result};
use crate::models::CandidateSet;

/// Numerically stable log(Σ exp(xᵢ)).
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Persistent SAMS state: ζ per leg, iteration counter and run identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixtureState {
    candidates: CandidateSet,
    reference: usize,
    schedule: GainSchedule,
    iteration: u64,
    zeta: Vec<Vec<f64>>,
}

impl MixtureState {
    /// Fresh state with ζ = 0 on every leg and n = 0.
    pub fn new(
        candidates: CandidateSet,
        reference: usize,
        n_legs: usize,
        schedule: GainSchedule,
    ) -> Result<Self> {
        if n_legs != 1 && n_legs != 2 {
            return Err(Error::Config(format!("expected 1 or 2 legs, got {}", n_legs)));
        }
        candidates.check(reference)?;
        schedule.validate()?;
        let m = candidates.len();
        Ok(Self {
            candidates,
            reference,
            schedule,
            iteration: 0,
            zeta: vec![vec![0.0; m]; n_legs],
        })
    }

    /// Replace the estimates of one leg (re-anchored), e.g. to seed from a prior run.
    pub fn with_zeta(mut self, leg: usize, values: Vec<f64>) -> Result<Self> {
        self.check_leg(leg)?;
        if values.len() != self.candidates.len() {
            return Err(Error::Config(format!(
                "zeta has {} entries, expected {}",
                values.len(),
                self.candidates.len()
            )));
        }
        self.zeta[leg] = values;
        self.reanchor(leg);
        self.check_invariants()?;
        Ok(self)
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn n_states(&self) -> usize {
        self.candidates.len()
    }

    pub fn n_legs(&self) -> usize {
        self.zeta.len()
    }

    pub fn reference(&self) -> usize {
        self.reference
    }

    pub fn schedule(&self) -> GainSchedule {
        self.schedule
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// ζ for `leg`.
    ///
    /// # Panics
    ///
    /// If `leg` is not below `n_legs()`.
    pub fn zeta(&self, leg: usize) -> &[f64] {
        assert!(leg < self.n_legs(), "leg {} out of range for {} legs", leg, self.n_legs());
        &self.zeta[leg]
    }

    /// Unnormalized log weights aⱼ.
    fn log_weight_numerators(&self) -> Vec<f64> {
        match self.zeta.as_slice() {
            [single] => single.clone(),
            [complex, solvent] => complex.iter().zip(solvent).map(|(c, s)| c - s).collect(),
            _ => unreachable!("leg count is validated on construction"),
        }
    }

    /// log πⱼ for every candidate.
    pub fn log_pi(&self) -> Vec<f64> {
        let a = self.log_weight_numerators();
        let norm = log_sum_exp(&a);
        a.into_iter().map(|x| x - norm).collect()
    }

    /// πⱼ in linear space, for diagnostics only.
    pub fn pi(&self) -> Vec<f64> {
        self.log_pi().into_iter().map(f64::exp).collect()
    }

    /// SAMS target log-weight log πⱼ − ζ_leg,ⱼ for every candidate.
    ///
    /// # Panics
    ///
    /// If `leg` is not below `n_legs()`.
    pub fn bias(&self, leg: usize) -> Vec<f64> {
        self.log_pi()
            .into_iter()
            .zip(self.zeta(leg))
            .map(|(log_pi, zeta)| log_pi - zeta)
            .collect()
    }

    /// Updated ζ for `leg` after observing `observed` at iteration `n`.
    ///
    /// Does not modify `self`; `observe` applies all legs of one iteration together.
    pub fn observe_leg(&self, leg: usize, observed: usize, n: u64) -> Result<Vec<f64>> {
        self.check_leg(leg)?;
        self.candidates.check(observed)?;
        let log_pi = self.log_pi();
        self.leg_update(leg, observed, &log_pi, self.schedule.gain(n))
    }

    fn leg_update(
        &self,
        leg: usize,
        observed: usize,
        log_pi: &[f64],
        gain: f64,
    ) -> Result<Vec<f64>> {
        let log_step = gain.ln() - log_pi[observed];
        if log_step.is_nan() {
            return Err(Error::NonFiniteMixture {
                leg,
                state: observed,
            });
        }
        let step = log_step.min(0.0).exp();
        let mut zeta = self.zeta[leg].clone();
        zeta[observed] += step;
        let anchor = zeta[self.reference];
        for z in zeta.iter_mut() {
            *z -= anchor;
        }
        Ok(zeta)
    }

    /// Complete one iteration: observe one index per leg and advance n.
    ///
    /// Every leg is updated from the same π (computed from ζ at n − 1).
    pub fn observe(&self, observed: &[usize]) -> Result<MixtureState> {
        if observed.len() != self.n_legs() {
            return Err(Error::Config(format!(
                "{} observations for {} legs",
                observed.len(),
                self.n_legs()
            )));
        }
        for &index in observed {
            self.candidates.check(index)?;
        }

        let n = self.iteration + 1;
        let gain = self.schedule.gain(n);
        let log_pi = self.log_pi();

        let mut next = self.clone();
        for (leg, &index) in observed.iter().enumerate() {
            next.zeta[leg] = self.leg_update(leg, index, &log_pi, gain)?;
        }
        next.iteration = n;
        next.check_invariants()?;
        trace!(iteration = n, gain, ?observed, "mixture weights updated");
        Ok(next)
    }

    fn reanchor(&mut self, leg: usize) {
        let anchor = self.zeta[leg][self.reference];
        for z in self.zeta[leg].iter_mut() {
            *z -= anchor;
        }
    }

    fn check_leg(&self, leg: usize) -> Result<()> {
        if leg < self.n_legs() {
            Ok(())
        } else {
            Err(Error::Config(format!("leg {} out of range for {} legs", leg, self.n_legs())))
        }
    }

    /// Anchor and finiteness checks.
    pub fn check_invariants(&self) -> Result<()> {
        for (leg, zeta) in self.zeta.iter().enumerate() {
            if let Some(state) = zeta.iter().position(|z| !z.is_finite()) {
                return Err(Error::NonFiniteMixture { leg, state });
            }
            let value = zeta[self.reference];
            if value != 0.0 {
                return Err(Error::AnchorViolation {
                    leg,
                    reference: self.reference,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Full structural validation, used when restoring a checkpoint.
    pub fn validate(&self) -> Result<()> {
        if self.n_legs() != 1 && self.n_legs() != 2 {
            return Err(Error::Config(format!("expected 1 or 2 legs, got {}", self.n_legs())));
        }
        self.candidates.check(self.reference)?;
        self.schedule.validate()?;
        for zeta in &self.zeta {
            if zeta.len() != self.candidates.len() {
                return Err(Error::Config(format!(
                    "zeta has {} entries, expected {}",
                    zeta.len(),
                    self.candidates.len()
                )));
            }
        }
        self.check_invariants()
    }
}

impl BiasStore for MixtureState {
    fn get_bias(&self, leg: usize, molecule: usize) -> Option<f64> {
        let zeta = self.zeta.get(leg)?.get(molecule)?;
        Some(self.log_pi()[molecule] - zeta)
    }

    fn get_pi(&self, molecule: usize) -> Option<f64> {
        self.log_pi().get(molecule).map(|log_pi| log_pi.exp())
    }
}
