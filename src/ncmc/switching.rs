//! Nonequilibrium candidate Monte Carlo switching.
//!
//! For a schedule λ₀ … λ_N the engine alternates
//!
//!   perturb λₖ → λₖ₊₁   (work += u(x, λₖ₊₁) − u(x, λₖ))
//!   propagate at λₖ₊₁   (interior λ only)
//!
//! so that running the reversed schedule is the exact time-reverse of the
//! forward discretization. The accumulated quantity is a path functional; it is
//! not a free-energy estimate by itself.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::traits::{Integrator, PotentialEnergy};
use crate::error::{Error, Result};
use crate::models::Configuration;

/// How the endpoint energy term of a stage is defined.
///
/// The right choice depends on the integrator family: kernels that satisfy
/// detailed balance with respect to exp(−u(·, λ)) at fixed λ (Metropolis,
/// generalized hybrid Monte Carlo) need the endpoint potential difference.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyConvention {
    /// logP_energy = u(x_N, λ_N) − u(x₀, λ₀)
    #[default]
    EndpointPotential,
    /// logP_energy = 0, for integrators whose reported work already carries the
    /// endpoint terms.
    Omitted,
}

/// Running sum of reduced work for one protocol traversal.
#[derive(Clone, Debug, Default)]
pub struct WorkAccumulator {
    total: f64,
    profile: Vec<f64>,
}

impl WorkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.total = 0.0;
        self.profile.clear();
    }

    /// Add one increment. A non-finite increment is refused and leaves the
    /// accumulator untouched.
    pub fn accumulate(&mut self, increment: f64) -> bool {
        if !increment.is_finite() {
            return false;
        }
        self.total += increment;
        self.profile.push(self.total);
        true
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Cumulative work after each perturbation step.
    pub fn profile(&self) -> &[f64] {
        &self.profile
    }
}

/// A switch that ran to the end of its schedule.
#[derive(Clone, Debug)]
pub struct SwitchResult {
    pub configuration: Configuration,
    /// Total reduced work W.
    pub work: f64,
    /// −W
    pub log_p_work: f64,
    pub log_p_energy: f64,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub work_profile: Vec<f64>,
}

#[derive(Clone, Debug)]
pub enum SwitchOutcome {
    Completed(SwitchResult),
    /// A non-finite energy appeared at schedule index `step`.
    Overlap { step: usize },
}

impl SwitchOutcome {
    pub fn completed(self) -> Option<SwitchResult> {
        match self {
            SwitchOutcome::Completed(result) => Some(result),
            SwitchOutcome::Overlap { .. } => None,
        }
    }

    pub fn is_overlap(&self) -> bool {
        matches!(self, SwitchOutcome::Overlap { .. })
    }
}

/// NCMC switching engine.
#[derive(Clone, Debug)]
pub struct NcmcEngine<I: Integrator> {
    integrator: I,
    convention: EnergyConvention,
}

impl<I: Integrator> NcmcEngine<I> {
    pub fn new(integrator: I, convention: EnergyConvention) -> Self {
        Self {
            integrator,
            convention,
        }
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    pub fn convention(&self) -> EnergyConvention {
        self.convention
    }

    /// Drive `config` along `lambdas` under the reduced potential `energy`.
    ///
    /// A schedule with fewer than two points is a protocol error. Overlaps are
    /// reported through the returned outcome.
    pub fn run<F, R>(
        &self,
        mut config: Configuration,
        lambdas: &[f64],
        energy: F,
        rng: &mut R,
    ) -> Result<SwitchOutcome>
    where
        F: Fn(&Configuration, f64) -> f64,
        R: Rng + ?Sized,
    {
        let (&lambda_start, rest) = match lambdas.split_first() {
            Some((first, rest)) if !rest.is_empty() => (first, rest),
            _ => {
                return Err(Error::Protocol(format!(
                    "switching schedule needs at least two points, got {}",
                    lambdas.len()
                )))
            }
        };
        let n_steps = rest.len();
        let mut work = WorkAccumulator::new();

        let initial_energy = energy(&config, lambda_start);
        if !initial_energy.is_finite() {
            trace!(step = 0, "overlap at switch start");
            return Ok(SwitchOutcome::Overlap { step: 0 });
        }

        let mut current = initial_energy;
        for k in 0..n_steps {
            let lambda = lambdas[k + 1];
            let perturbed = energy(&config, lambda);
            if !work.accumulate(perturbed - current) {
                trace!(step = k + 1, lambda, "overlap during perturbation");
                return Ok(SwitchOutcome::Overlap { step: k + 1 });
            }
            current = perturbed;

            if k + 1 < n_steps {
                let at_lambda = |c: &Configuration| energy(c, lambda);
                self.integrator.propagate(&mut config, &at_lambda, rng);
                current = energy(&config, lambda);
                if !current.is_finite() {
                    trace!(step = k + 1, lambda, "overlap after propagation");
                    return Ok(SwitchOutcome::Overlap { step: k + 1 });
                }
            }
        }

        let final_energy = current;
        let log_p_energy = match self.convention {
            EnergyConvention::EndpointPotential => final_energy - initial_energy,
            EnergyConvention::Omitted => 0.0,
        };
        let total = work.total();
        Ok(SwitchOutcome::Completed(SwitchResult {
            configuration: config,
            work: total,
            log_p_work: -total,
            log_p_energy,
            initial_energy,
            final_energy,
            work_profile: work.profile().to_vec(),
        }))
    }

    /// Hybrid switch from `old` to `new` along `lambdas` (0 → 1).
    pub fn switch_hybrid<P, R>(
        &self,
        potential: &P,
        config: Configuration,
        old: usize,
        new: usize,
        lambdas: &[f64],
        rng: &mut R,
    ) -> Result<SwitchOutcome>
    where
        P: PotentialEnergy + ?Sized,
        R: Rng + ?Sized,
    {
        let energy = |c: &Configuration, lambda: f64| potential.hybrid_energy(c, old, new, lambda);
        self.run(config, lambdas, energy, rng)
    }

    /// Couple or decouple `molecule`'s own atoms along `lambdas`
    /// (1 → 0 deletes, 0 → 1 inserts).
    pub fn switch_molecule<P, R>(
        &self,
        potential: &P,
        config: Configuration,
        molecule: usize,
        lambdas: &[f64],
        rng: &mut R,
    ) -> Result<SwitchOutcome>
    where
        P: PotentialEnergy + ?Sized,
        R: Rng + ?Sized,
    {
        let energy = |c: &Configuration, lambda: f64| potential.energy(c, molecule, lambda);
        self.run(config, lambdas, energy, rng)
    }
}
