//! Harmonic alchemical test system with analytic free energies.
//!
//! Core atoms sit in an isotropic well u = ½ k_core |r|². Every candidate
//! molecule owns `n_atoms` specific atoms tethered to the core centroid c by
//! springs whose stiffness is interpolated between a decoupled reference value
//! and the molecule's own stiffness:
//!
//!   k(λ) = k_dec + λ (k_mol − k_dec),   u_spec = Σ ½ k(λ) |r − c|²
//!
//! The specific-atom integral is translation invariant, so up to a
//! molecule-independent constant ln Z_mol = (3 n / 2) ln(2π / k_mol).

use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::models::{CandidateSet, Configuration};
use crate::ncmc::PotentialEnergy;
use crate::proposal::GeometryEngine;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicMolecule {
    pub name: String,
    pub n_atoms: usize,
    pub stiffness: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicAlchemy {
    pub n_core: usize,
    pub core_stiffness: f64,
    /// Spring constant of a fully decoupled specific atom.
    pub decoupled_stiffness: f64,
    pub molecules: Vec<HarmonicMolecule>,
}

fn centroid(core: &[Vector3<f64>]) -> Vector3<f64> {
    if core.is_empty() {
        return Vector3::zeros();
    }
    core.iter().sum::<Vector3<f64>>() / core.len() as f64
}

/// Σ ½ k |r − c|²
fn tether_energy(atoms: &[Vector3<f64>], center: &Vector3<f64>, stiffness: f64) -> f64 {
    atoms.iter().map(|r| 0.5 * stiffness * (r - center).norm_squared()).sum()
}

/// Log density of isotropic Gaussians of stiffness `k` centered on `center`.
fn gaussian_log_density(atoms: &[Vector3<f64>], center: &Vector3<f64>, k: f64) -> f64 {
    let norm = 1.5 * (k / (2.0 * PI)).ln();
    atoms
        .iter()
        .map(|r| norm - 0.5 * k * (r - center).norm_squared())
        .sum()
}

fn draw_gaussian<R: Rng + ?Sized>(
    n: usize,
    center: &Vector3<f64>,
    k: f64,
    rng: &mut R,
) -> Vec<Vector3<f64>> {
    let sigma = 1.0 / k.sqrt();
    (0..n)
        .map(|_| {
            let g: [f64; 3] = [
                StandardNormal.sample(rng),
                StandardNormal.sample(rng),
                StandardNormal.sample(rng),
            ];
            center + sigma * Vector3::from(g)
        })
        .collect()
}

impl HarmonicAlchemy {
    pub fn validate(&self) -> Result<()> {
        if self.molecules.is_empty() {
            return Err(Error::Config("harmonic system has no molecules".to_string()));
        }
        let positive = |k: f64| k.is_finite() && k > 0.0;
        if !positive(self.core_stiffness) || !positive(self.decoupled_stiffness) {
            return Err(Error::Config("stiffness constants must be positive".to_string()));
        }
        if let Some(m) = self.molecules.iter().find(|m| !positive(m.stiffness)) {
            return Err(Error::Config(format!("molecule '{}' has non-positive stiffness", m.name)));
        }
        Ok(())
    }

    pub fn candidates(&self) -> Result<CandidateSet> {
        CandidateSet::new(self.molecules.iter().map(|m| m.name.clone()))
    }

    fn coupled_stiffness(&self, molecule: usize, lambda: f64) -> f64 {
        let k_dec = self.decoupled_stiffness;
        k_dec + lambda * (self.molecules[molecule].stiffness - k_dec)
    }

    fn core_energy(&self, core: &[Vector3<f64>]) -> f64 {
        core.iter().map(|r| 0.5 * self.core_stiffness * r.norm_squared()).sum()
    }

    /// ln Z of `molecule` fully coupled, up to a molecule-independent constant.
    pub fn log_partition(&self, molecule: usize) -> f64 {
        let m = &self.molecules[molecule];
        1.5 * m.n_atoms as f64 * (2.0 * PI / m.stiffness).ln()
    }

    /// Exact equilibrium draw of `molecule` fully coupled.
    pub fn sample_equilibrium<R: Rng + ?Sized>(
        &self,
        molecule: usize,
        rng: &mut R,
    ) -> Configuration {
        let core = draw_gaussian(self.n_core, &Vector3::zeros(), self.core_stiffness, rng);
        let center = centroid(&core);
        let m = &self.molecules[molecule];
        let specific = draw_gaussian(m.n_atoms, &center, m.stiffness, rng);
        Configuration::new(core, specific)
    }

    /// Exact equilibrium draw of the hybrid state at λ = 0: `old` fully coupled,
    /// `new` decoupled.
    pub fn sample_hybrid_start<R: Rng + ?Sized>(
        &self,
        old: usize,
        new: usize,
        rng: &mut R,
    ) -> Configuration {
        let config = self.sample_equilibrium(old, rng);
        let center = centroid(config.core());
        let n_incoming = self.molecules[new].n_atoms;
        let incoming = draw_gaussian(n_incoming, &center, self.decoupled_stiffness, rng);
        config.with_new_specific(incoming)
    }

    /// Geometry engine drawing specific atoms around the core centroid with
    /// stiffness `k`. `k = decoupled_stiffness` is the exact decoupled density.
    pub fn geometry(&self, k: f64) -> HarmonicGeometry {
        HarmonicGeometry {
            n_atoms: self.molecules.iter().map(|m| m.n_atoms).collect(),
            stiffness: k,
        }
    }
}

impl PotentialEnergy for HarmonicAlchemy {
    fn energy(&self, config: &Configuration, molecule: usize, lambda: f64) -> f64 {
        let center = centroid(config.core());
        let k = self.coupled_stiffness(molecule, lambda);
        self.core_energy(config.core()) + tether_energy(config.old_specific(), &center, k)
    }

    fn hybrid_energy(&self, config: &Configuration, old: usize, new: usize, lambda: f64) -> f64 {
        let center = centroid(config.core());
        let k_old = self.coupled_stiffness(old, 1.0 - lambda);
        let k_new = self.coupled_stiffness(new, lambda);
        self.core_energy(config.core())
            + tether_energy(config.old_specific(), &center, k_old)
            + tether_energy(config.new_specific(), &center, k_new)
    }
}

/// Gaussian regrowth of specific atoms around the core centroid.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicGeometry {
    n_atoms: Vec<usize>,
    stiffness: f64,
}

impl GeometryEngine for HarmonicGeometry {
    fn propose<R: Rng + ?Sized>(
        &self,
        core: &[Vector3<f64>],
        _from: usize,
        to: usize,
        rng: &mut R,
    ) -> (Vec<Vector3<f64>>, f64) {
        let center = centroid(core);
        let positions = draw_gaussian(self.n_atoms[to], &center, self.stiffness, rng);
        let log_p = gaussian_log_density(&positions, &center, self.stiffness);
        (positions, log_p)
    }

    fn log_p_reverse(
        &self,
        core: &[Vector3<f64>],
        _from: usize,
        _to: usize,
        old_specific: &[Vector3<f64>],
    ) -> f64 {
        gaussian_log_density(old_specific, &centroid(core), self.stiffness)
    }
}
