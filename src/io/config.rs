//! YAML run configuration.
//!
//! ```yaml
//! sampler:
//!   gain_schedule: { kind: two_phase, burn_in: 200, exponent: 0.6 }
//!   switching_scheme: hybrid
//!   n_protocol_steps: 20
//!   observation: occupied
//! system:
//!   n_core: 2
//!   core_stiffness: 1.0
//!   decoupled_stiffness: 1.0
//!   molecules:
//!     - { name: benzene, n_atoms: 2, stiffness: 2.0 }
//!     - { name: toluene, n_atoms: 3, stiffness: 4.0 }
//! iterations: 5000
//! seed: 42
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::CandidateSet;
use crate::ncmc::{EnergyConvention, Integrator, MetropolisIntegrator, Protocol, SwitchingScheme};
use crate::sampling::ObservationPolicy;
use crate::sams::{GainSchedule, MixtureState};
use crate::systems::HarmonicAlchemy;

fn default_protocol_steps() -> usize {
    10
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    #[serde(default)]
    pub gain_schedule: GainSchedule,
    #[serde(default)]
    pub switching_scheme: SwitchingScheme,
    #[serde(default = "default_protocol_steps")]
    pub n_protocol_steps: usize,
    #[serde(default)]
    pub reference_index: usize,
    /// Run a complex and a solvent leg against one mixture.
    #[serde(default)]
    pub two_leg: bool,
    #[serde(default)]
    pub observation: ObservationPolicy,
    #[serde(default)]
    pub energy_convention: EnergyConvention,
    #[serde(default)]
    pub integrator: MetropolisIntegrator,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            gain_schedule: GainSchedule::default(),
            switching_scheme: SwitchingScheme::default(),
            n_protocol_steps: default_protocol_steps(),
            reference_index: 0,
            two_leg: false,
            observation: ObservationPolicy::default(),
            energy_convention: EnergyConvention::default(),
            integrator: MetropolisIntegrator::default(),
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        self.gain_schedule.validate()?;
        if self.n_protocol_steps == 0 {
            return Err(Error::Config("n_protocol_steps must be at least 1".to_string()));
        }
        self.integrator.validate()
    }

    pub fn n_legs(&self) -> usize {
        if self.two_leg {
            2
        } else {
            1
        }
    }

    pub fn protocol(&self) -> Result<Protocol> {
        Protocol::linear(self.switching_scheme, self.n_protocol_steps)
    }

    /// Fresh mixture state for `candidates` under this configuration.
    pub fn mixture(&self, candidates: CandidateSet) -> Result<MixtureState> {
        MixtureState::new(
            candidates,
            self.reference_index,
            self.n_legs(),
            self.gain_schedule,
        )
    }
}

/// Everything the binary needs for one run on the harmonic test system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    pub system: HarmonicAlchemy,
    /// Solvent-leg system for two-leg runs; defaults to `system` with every
    /// molecule at the decoupled stiffness.
    #[serde(default)]
    pub solvent: Option<HarmonicAlchemy>,
    pub iterations: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub initial_molecule: usize,
    /// Width of the geometry proposal; defaults to the decoupled stiffness.
    #[serde(default)]
    pub geometry_stiffness: Option<f64>,
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        self.sampler.validate()?;
        self.system.validate()?;
        if let Some(solvent) = &self.solvent {
            solvent.validate()?;
            if solvent.candidates()? != self.system.candidates()? {
                return Err(Error::Config(
                    "solvent molecules differ from the complex molecules".to_string(),
                ));
            }
        }
        self.system.candidates()?.check(self.initial_molecule)?;
        self.system.candidates()?.check(self.sampler.reference_index)?;
        if let Some(k) = self.geometry_stiffness {
            if !(k.is_finite() && k > 0.0) {
                return Err(Error::Config(format!(
                    "geometry_stiffness must be positive, got {}",
                    k
                )));
            }
        }
        Ok(())
    }

    /// Systems per leg, complex first.
    pub fn leg_systems(&self) -> Vec<HarmonicAlchemy> {
        if !self.sampler.two_leg {
            return vec![self.system.clone()];
        }
        let solvent = self.solvent.clone().unwrap_or_else(|| {
            let mut solvent = self.system.clone();
            for molecule in solvent.molecules.iter_mut() {
                molecule.stiffness = solvent.decoupled_stiffness;
            }
            solvent
        });
        vec![self.system.clone(), solvent]
    }
}

/// Read and validate a run configuration.
pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: RunConfig = serde_yaml::from_reader(reader).map_err(|source| Error::FileParsing {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
