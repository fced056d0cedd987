//! Independent Gaussian states with known normalizing constants.
//!
//! State j has density exp(−|x|² / 2σⱼ²) in `dimension` dimensions, so
//! ln Zⱼ = d ln(σⱼ √(2π)). Marginalizing x out of the expanded ensemble leaves a
//! categorical distribution over states, which is sampled exactly.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::sams::log_sum_exp;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianStates {
    pub sigmas: Vec<f64>,
    pub dimension: usize,
}

impl GaussianStates {
    pub fn new(sigmas: Vec<f64>, dimension: usize) -> Result<Self> {
        if sigmas.is_empty() {
            return Err(Error::Config("no Gaussian states given".to_string()));
        }
        if sigmas.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(Error::Config("Gaussian widths must be positive".to_string()));
        }
        Ok(Self { sigmas, dimension })
    }

    pub fn n_states(&self) -> usize {
        self.sigmas.len()
    }

    pub fn log_partition(&self, state: usize) -> f64 {
        self.dimension as f64 * (self.sigmas[state] * (2.0 * PI).sqrt()).ln()
    }

    /// ln Zⱼ − ln Z_reference for every state.
    pub fn relative_log_partition(&self, reference: usize) -> Vec<f64> {
        let anchor = self.log_partition(reference);
        (0..self.n_states()).map(|j| self.log_partition(j) - anchor).collect()
    }

    /// Gibbs draw of the state index with P(j) ∝ Zⱼ exp(biasⱼ).
    pub fn draw_state<R: Rng + ?Sized>(&self, bias: &[f64], rng: &mut R) -> Result<usize> {
        if bias.len() != self.n_states() {
            return Err(Error::Config(format!(
                "bias has {} entries for {} states",
                bias.len(),
                self.n_states()
            )));
        }
        let logits: Vec<f64> = bias
            .iter()
            .enumerate()
            .map(|(j, b)| b + self.log_partition(j))
            .collect();
        let norm = log_sum_exp(&logits);
        let weights = logits.iter().map(|logit| (logit - norm).exp());
        let dist = WeightedIndex::new(weights).map_err(|e| {
            Error::Config(format!("cannot draw a state from bias {:?}: {}", bias, e))
        })?;
        Ok(dist.sample(rng))
    }
}
