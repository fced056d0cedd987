//! Stochastic-approximation gain schedules.
//!
//! Both schedules end in a `1/n` tail, so the step sequence satisfies the
//! Robbins–Monro conditions Σ γₙ = ∞ and Σ γₙ² < ∞.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GainSchedule {
    /// γₙ = 1/n
    Flat,
    /// γₙ = n^(-exponent) while n ≤ burn_in, then 1/(n - burn_in + burn_in^exponent).
    TwoPhase { burn_in: u64, exponent: f64 },
}

impl Default for GainSchedule {
    fn default() -> Self {
        GainSchedule::Flat
    }
}

impl GainSchedule {
    pub fn validate(&self) -> Result<()> {
        match *self {
            GainSchedule::Flat => Ok(()),
            GainSchedule::TwoPhase { burn_in, exponent } => {
                if burn_in == 0 {
                    return Err(Error::Config("two-phase gain needs burn_in >= 1".to_string()));
                }
                if !(0.0..=1.0).contains(&exponent) {
                    return Err(Error::Config(format!(
                        "two-phase gain exponent must lie in [0, 1], got {}",
                        exponent
                    )));
                }
                Ok(())
            }
        }
    }

    /// Step size for iteration `n` (counted from 1).
    pub fn gain(&self, n: u64) -> f64 {
        let n = n.max(1) as f64;
        match *self {
            GainSchedule::Flat => 1.0 / n,
            GainSchedule::TwoPhase { burn_in, exponent } => {
                let t0 = burn_in as f64;
                if n <= t0 {
                    n.powf(-exponent)
                } else {
                    1.0 / (n - t0 + t0.powf(exponent))
                }
            }
        }
    }
}
