//! Fixed-λ propagators used between NCMC perturbation steps.

use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::traits::Integrator;
use crate::error::{Error, Result};
use crate::models::Configuration;

/// Random-walk Metropolis over single atoms.
///
/// Each trial displaces one uniformly chosen atom by an isotropic Gaussian and
/// accepts with min(1, exp(−Δu)), so exp(−u(·, λ)) is preserved at fixed λ.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetropolisIntegrator {
    step_size: f64,
    n_trials: usize,
}

impl MetropolisIntegrator {
    pub fn new(step_size: f64, n_trials: usize) -> Result<Self> {
        let integrator = Self {
            step_size,
            n_trials,
        };
        integrator.validate()?;
        Ok(integrator)
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn n_trials(&self) -> usize {
        self.n_trials
    }
}

impl Default for MetropolisIntegrator {
    fn default() -> Self {
        Self {
            step_size: 0.5,
            n_trials: 10,
        }
    }
}

impl Integrator for MetropolisIntegrator {
    /// A deserialized integrator bypasses `new`, so callers check it here.
    fn validate(&self) -> Result<()> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(Error::Config(format!(
                "integrator step_size must be positive, got {}",
                self.step_size
            )));
        }
        Ok(())
    }

    fn propagate<R: Rng + ?Sized>(
        &self,
        config: &mut Configuration,
        energy: &dyn Fn(&Configuration) -> f64,
        rng: &mut R,
    ) {
        let n_atoms = config.n_atoms();
        if n_atoms == 0 || self.n_trials == 0 {
            return;
        }
        // Only an integrator that fails `validate` has no valid proposal width.
        let normal = match Normal::new(0.0, self.step_size) {
            Ok(normal) => normal,
            Err(_) => return,
        };

        let mut current = energy(config);
        if !current.is_finite() {
            return;
        }

        for _ in 0..self.n_trials {
            let atom = rng.gen_range(0..n_atoms);
            let displacement = Vector3::new(
                normal.sample(rng),
                normal.sample(rng),
                normal.sample(rng),
            );
            let Some(position) = config.position_mut(atom) else {
                continue;
            };
            let old = *position;
            *position = old + displacement;

            let trial = energy(config);
            let delta = trial - current;
            let accept = trial.is_finite() && (delta <= 0.0 || rng.gen::<f64>() < (-delta).exp());
            if accept {
                current = trial;
            } else if let Some(position) = config.position_mut(atom) {
                *position = old;
            }
        }
    }
}

/// No propagation: the switch reduces to a sequence of instantaneous perturbations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Instantaneous;

impl Integrator for Instantaneous {
    fn propagate<R: Rng + ?Sized>(
        &self,
        _config: &mut Configuration,
        _energy: &dyn Fn(&Configuration) -> f64,
        _rng: &mut R,
    ) {
    }
}
