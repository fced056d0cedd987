//! Expanded-ensemble sampler over candidate molecules.
//!
//! One chain runs per leg. An iteration reads the bias of every leg from a single
//! mixture snapshot, attempts one NCMC identity move per chain, then records
//! the observed molecule of every leg in one mixture update. Accepted moves are
//! committed to the chains only once that update has succeeded.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::acceptance::{metropolis, AcceptanceTerms};
use super::stats::SamplerStatistics;
use crate::error::{Error, Result};
use crate::models::Configuration;
use crate::ncmc::{Integrator, NcmcEngine, PotentialEnergy, Protocol, Schedules, SwitchOutcome};
use crate::proposal::{GeometryEngine, ProposalEngine};
use crate::sams::MixtureHandle;

/// Which molecule an iteration reports to the mixture tracker.
///
/// SAMS converges only when the observed molecule is a draw from the biased
/// expanded ensemble. The occupied molecule always is; the attempted one is
/// only when the proposal engine draws from that ensemble itself.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationPolicy {
    /// The proposed molecule, whether or not the move was accepted. Requires a
    /// proposal engine whose `draws_from_ensemble` is true.
    Attempted,
    /// The molecule the chain holds after the accept/reject test.
    #[default]
    Occupied,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Accepted,
    Rejected,
    /// A non-finite energy at protocol step `step` aborted the switch.
    Overlap { step: usize },
}

/// Outcome of one identity move on one leg.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MoveRecord {
    pub leg: usize,
    pub iteration: u64,
    pub old_molecule: usize,
    pub new_molecule: usize,
    pub outcome: MoveOutcome,
    /// Absent when the switch aborted before the terms could be assembled.
    pub terms: Option<AcceptanceTerms>,
    pub log_p_accept: Option<f64>,
}

impl MoveRecord {
    pub fn accepted(&self) -> bool {
        self.outcome == MoveOutcome::Accepted
    }

    /// Molecule held by the chain after the move.
    pub fn occupied(&self) -> usize {
        if self.accepted() {
            self.new_molecule
        } else {
            self.old_molecule
        }
    }

    fn observed(&self, policy: ObservationPolicy) -> usize {
        match policy {
            ObservationPolicy::Attempted => self.new_molecule,
            ObservationPolicy::Occupied => self.occupied(),
        }
    }
}

/// Current molecule and coordinates of one leg, with that leg's potential.
#[derive(Clone, Debug)]
pub struct Chain<U: PotentialEnergy> {
    potential: U,
    molecule: usize,
    configuration: Configuration,
}

impl<U: PotentialEnergy> Chain<U> {
    pub fn new(potential: U, molecule: usize, configuration: Configuration) -> Self {
        Self {
            potential,
            molecule,
            configuration,
        }
    }

    pub fn potential(&self) -> &U {
        &self.potential
    }

    pub fn molecule(&self) -> usize {
        self.molecule
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}

/// Result of a completed switch that is ready for the accept/reject test.
struct Trial {
    configuration: Configuration,
    terms: AcceptanceTerms,
}

enum Attempt {
    Ready(Trial),
    /// The switch aborted at protocol step `step`.
    Overlap { step: usize },
}

/// An accepted move waiting for the mixture update before it is applied.
struct PendingMove {
    leg: usize,
    molecule: usize,
    configuration: Configuration,
}

pub struct ExpandedEnsembleSampler<P, G, I, U, M>
where
    P: ProposalEngine,
    G: GeometryEngine,
    I: Integrator,
    U: PotentialEnergy,
    M: MixtureHandle,
{
    proposal: P,
    geometry: G,
    engine: NcmcEngine<I>,
    protocol: Protocol,
    policy: ObservationPolicy,
    chains: Vec<Chain<U>>,
    mixture: M,
    statistics: SamplerStatistics,
}

impl<P, G, I, U, M> ExpandedEnsembleSampler<P, G, I, U, M>
where
    P: ProposalEngine,
    G: GeometryEngine,
    I: Integrator,
    U: PotentialEnergy,
    M: MixtureHandle,
{
    pub fn new(
        proposal: P,
        geometry: G,
        engine: NcmcEngine<I>,
        protocol: Protocol,
        policy: ObservationPolicy,
        chains: Vec<Chain<U>>,
        mixture: M,
    ) -> Result<Self> {
        if policy == ObservationPolicy::Attempted && !proposal.draws_from_ensemble() {
            return Err(Error::Config(
                "attempted observation needs a proposal that draws from the expanded ensemble; \
                 use the occupied observation"
                    .to_string(),
            ));
        }
        engine.integrator().validate()?;
        let state = mixture.snapshot();
        if chains.len() != state.n_legs() {
            return Err(Error::Config(format!(
                "{} chains given for a {}-leg mixture",
                chains.len(),
                state.n_legs()
            )));
        }
        for chain in &chains {
            state.candidates().check(chain.molecule)?;
        }
        let statistics = SamplerStatistics::new(state.n_legs(), state.n_states());
        info!(
            legs = state.n_legs(),
            candidates = state.n_states(),
            scheme = ?protocol.scheme(),
            steps = protocol.n_steps(),
            "expanded-ensemble sampler ready"
        );
        Ok(Self {
            proposal,
            geometry,
            engine,
            protocol,
            policy,
            chains,
            mixture,
            statistics,
        })
    }

    pub fn chains(&self) -> &[Chain<U>] {
        &self.chains
    }

    pub fn mixture(&self) -> &M {
        &self.mixture
    }

    pub fn statistics(&self) -> &SamplerStatistics {
        &self.statistics
    }

    pub fn into_mixture(self) -> M {
        self.mixture
    }

    /// One iteration: a move on every leg followed by one mixture update.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<MoveRecord>> {
        let state = self.mixture.snapshot();
        let biases: Vec<Vec<f64>> = (0..self.chains.len()).map(|leg| state.bias(leg)).collect();

        let mut records = Vec::with_capacity(self.chains.len());
        let mut pending = Vec::new();
        for (leg, bias) in biases.iter().enumerate() {
            let (record, accepted) = self.move_leg(leg, bias, rng)?;
            records.push(record);
            pending.extend(accepted);
        }

        let observed: Vec<usize> = records.iter().map(|r| r.observed(self.policy)).collect();
        let iteration = self.mixture.record(&observed)?;

        for PendingMove { leg, molecule, configuration } in pending {
            let chain = &mut self.chains[leg];
            chain.molecule = molecule;
            chain.configuration = configuration;
        }

        for record in records.iter_mut() {
            record.iteration = iteration;
            self.statistics.record(record);
            debug!(
                iteration,
                leg = record.leg,
                old = record.old_molecule,
                new = record.new_molecule,
                outcome = ?record.outcome,
                log_p_accept = ?record.log_p_accept,
                "identity move"
            );
        }
        Ok(records)
    }

    /// Run `n_iterations` iterations, discarding the per-move records.
    pub fn run<R: Rng + ?Sized>(&mut self, n_iterations: u64, rng: &mut R) -> Result<()> {
        for _ in 0..n_iterations {
            self.step(rng)?;
        }
        Ok(())
    }

    /// Attempt one move on `leg` without touching the chain. An accepted move
    /// comes back as a pending update.
    fn move_leg<R: Rng + ?Sized>(
        &self,
        leg: usize,
        bias: &[f64],
        rng: &mut R,
    ) -> Result<(MoveRecord, Option<PendingMove>)> {
        let chain = &self.chains[leg];
        let old = chain.molecule;
        let chemical = self.proposal.propose(old, rng);
        let new = chemical.molecule;

        let log_p_initial = -chain.potential.energy(&chain.configuration, old, 1.0) + bias[old];
        let trial = match self.protocol.schedules() {
            Schedules::Hybrid(lambdas) => self.hybrid_trial(chain, old, new, lambdas, rng)?,
            Schedules::TwoStage { delete, insert } => {
                self.two_stage_trial(chain, old, new, delete, insert, rng)?
            }
        };

        let mut record = MoveRecord {
            leg,
            iteration: 0,
            old_molecule: old,
            new_molecule: new,
            outcome: MoveOutcome::Rejected,
            terms: None,
            log_p_accept: None,
        };
        let Trial { configuration, mut terms } = match trial {
            Attempt::Ready(trial) => trial,
            Attempt::Overlap { step } => {
                record.outcome = MoveOutcome::Overlap { step };
                return Ok((record, None));
            }
        };

        let log_p_final = -chain.potential.energy(&configuration, new, 1.0) + bias[new];
        match &mut terms {
            AcceptanceTerms::Hybrid {
                log_p_initial: initial,
                log_p_final: end,
                log_p_chemical,
                ..
            }
            | AcceptanceTerms::TwoStage {
                log_p_initial: initial,
                log_p_final: end,
                log_p_chemical,
                ..
            } => {
                *initial = log_p_initial;
                *end = log_p_final;
                *log_p_chemical = chemical.log_ratio();
            }
        }
        let log_p_accept = terms.log_p_accept();
        record.terms = Some(terms);
        record.log_p_accept = Some(log_p_accept);

        if !metropolis(log_p_accept, rng) {
            return Ok((record, None));
        }
        record.outcome = MoveOutcome::Accepted;
        let pending = PendingMove {
            leg,
            molecule: new,
            configuration,
        };
        Ok((record, Some(pending)))
    }

    /// Grow the new atoms, switch the hybrid potential 0 → 1, then score the
    /// reverse regrowth of the old atoms on the final core.
    fn hybrid_trial<R: Rng + ?Sized>(
        &self,
        chain: &Chain<U>,
        old: usize,
        new: usize,
        lambdas: &[f64],
        rng: &mut R,
    ) -> Result<Attempt> {
        let current = &chain.configuration;
        let (positions, log_p_geometry_forward) =
            self.geometry.propose(current.core(), old, new, rng);
        let hybrid = current.clone().with_new_specific(positions);

        let outcome = self.engine.switch_hybrid(&chain.potential, hybrid, old, new, lambdas, rng)?;
        let result = match outcome {
            SwitchOutcome::Completed(result) => result,
            SwitchOutcome::Overlap { step } => return Ok(Attempt::Overlap { step }),
        };
        let end = &result.configuration;
        let log_p_geometry_reverse =
            self.geometry.log_p_reverse(end.core(), old, new, end.old_specific());

        Ok(Attempt::Ready(Trial {
            configuration: result.configuration.into_new_view(),
            terms: AcceptanceTerms::Hybrid {
                log_p_initial: 0.0,
                log_p_final: 0.0,
                log_p_chemical: 0.0,
                log_p_geometry_forward,
                log_p_geometry_reverse,
                log_p_work: result.log_p_work,
                log_p_energy: result.log_p_energy,
            },
        }))
    }

    /// Decouple the old molecule, swap its atoms for a fresh regrowth of the
    /// new one, then couple the new molecule in.
    fn two_stage_trial<R: Rng + ?Sized>(
        &self,
        chain: &Chain<U>,
        old: usize,
        new: usize,
        delete: &[f64],
        insert: &[f64],
        rng: &mut R,
    ) -> Result<Attempt> {
        let start = chain.configuration.clone();
        let deleted = self.engine.switch_molecule(&chain.potential, start, old, delete, rng)?;
        let deleted = match deleted {
            SwitchOutcome::Completed(result) => result,
            SwitchOutcome::Overlap { step } => return Ok(Attempt::Overlap { step }),
        };

        let (core, old_specific, _) = deleted.configuration.into_parts();
        let proposal = self.geometry.propose_with_reverse(&core, &old_specific, old, new, rng);
        let regrown = Configuration::new(core, proposal.positions);

        let inserted = self.engine.switch_molecule(&chain.potential, regrown, new, insert, rng)?;
        let inserted = match inserted {
            SwitchOutcome::Completed(result) => result,
            SwitchOutcome::Overlap { step } => {
                return Ok(Attempt::Overlap {
                    step: delete.len() - 1 + step,
                });
            }
        };

        Ok(Attempt::Ready(Trial {
            configuration: inserted.configuration,
            terms: AcceptanceTerms::TwoStage {
                log_p_initial: 0.0,
                log_p_final: 0.0,
                log_p_chemical: 0.0,
                log_p_delete_work: deleted.log_p_work,
                log_p_delete_energy: deleted.log_p_energy,
                log_p_geometry_forward: proposal.log_p_forward,
                log_p_geometry_reverse: proposal.log_p_reverse,
                log_p_insert_work: inserted.log_p_work,
                log_p_insert_energy: inserted.log_p_energy,
            },
        }))
    }
}
