//! Statistical tests across the mixture tracker, the switching engine and the sampler.

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::thread;

use crate::analysis::{bar_estimate, exp_estimate};
use crate::io::{load_checkpoint, save_checkpoint, SamplerConfig};
use crate::models::{CandidateSet, Configuration};
use crate::ncmc::{
    EnergyConvention, MetropolisIntegrator, NcmcEngine, PotentialEnergy, Protocol, SwitchingScheme,
};
use crate::proposal::UniformProposal;
use crate::sampling::{Chain, ExpandedEnsembleSampler, MoveOutcome, ObservationPolicy};
use crate::sams::{log_sum_exp, GainSchedule, MixtureHandle, MixtureState, SharedMixture};
use crate::systems::{GaussianStates, HarmonicAlchemy, HarmonicGeometry, HarmonicMolecule};

fn harmonic(stiffness: &[f64]) -> HarmonicAlchemy {
    HarmonicAlchemy {
        n_core: 1,
        core_stiffness: 1.0,
        decoupled_stiffness: 1.0,
        molecules: stiffness
            .iter()
            .enumerate()
            .map(|(i, &k)| HarmonicMolecule {
                name: format!("mol{}", i),
                n_atoms: 1,
                stiffness: k,
            })
            .collect(),
    }
}

fn metropolis_engine() -> NcmcEngine<MetropolisIntegrator> {
    NcmcEngine::new(
        MetropolisIntegrator::new(0.6, 5).unwrap(),
        EnergyConvention::EndpointPotential,
    )
}

type HarmonicSampler<M> = ExpandedEnsembleSampler<
    UniformProposal,
    HarmonicGeometry,
    MetropolisIntegrator,
    HarmonicAlchemy,
    M,
>;

fn harmonic_sampler<M: MixtureHandle>(
    legs: Vec<HarmonicAlchemy>,
    scheme: SwitchingScheme,
    policy: ObservationPolicy,
    mixture: M,
    seed: u64,
) -> HarmonicSampler<M> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = legs[0].molecules.len();
    let geometry = legs[0].geometry(legs[0].decoupled_stiffness);
    let chains = legs
        .into_iter()
        .map(|system| {
            let config = system.sample_equilibrium(0, &mut rng);
            Chain::new(system, 0, config)
        })
        .collect();
    ExpandedEnsembleSampler::new(
        UniformProposal::new(n),
        geometry,
        metropolis_engine(),
        Protocol::linear(scheme, 10).unwrap(),
        policy,
        chains,
        mixture,
    )
    .unwrap()
}

fn fresh_mixture(system: &HarmonicAlchemy, n_legs: usize, schedule: GainSchedule) -> MixtureState {
    MixtureState::new(system.candidates().unwrap(), 0, n_legs, schedule).unwrap()
}

fn analytic_zeta(system: &HarmonicAlchemy) -> Vec<f64> {
    let anchor = system.log_partition(0);
    (0..system.molecules.len()).map(|j| system.log_partition(j) - anchor).collect()
}

#[test]
fn test_null_transformation_has_unit_mean_exponential_work() {
    // Switching a molecule into itself through the hybrid potential is symmetric
    // in λ, so ΔF = 0 and ⟨exp(−W)⟩ = 1.
    let system = harmonic(&[2.0]);
    let engine = NcmcEngine::new(
        MetropolisIntegrator::default(),
        EnergyConvention::EndpointPotential,
    );
    let lambdas: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
    let mut rng = StdRng::seed_from_u64(101);

    let boltzmann: Vec<f64> = (0..1000)
        .map(|_| {
            let start = system.sample_hybrid_start(0, 0, &mut rng);
            let result = engine
                .switch_hybrid(&system, start, 0, 0, &lambdas, &mut rng)
                .unwrap()
                .completed()
                .unwrap();
            result.log_p_work.exp()
        })
        .collect();

    let n = boltzmann.len() as f64;
    let mean = boltzmann.iter().sum::<f64>() / n;
    let var = boltzmann.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let standard_error = (var / n).sqrt();
    assert!(
        (mean - 1.0).abs() < 3.0 * standard_error + 1e-3,
        "mean exp(-W) = {} ± {}",
        mean,
        standard_error
    );
}

#[test]
fn test_bidirectional_estimates_match_analytic_free_energy() {
    // Coupling one atom from k = 1 to k = 4: ΔF = 1.5 ln 4.
    let system = harmonic(&[1.0, 4.0]);
    let engine = metropolis_engine();
    let insert: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
    let delete: Vec<f64> = insert.iter().rev().copied().collect();
    let mut rng = StdRng::seed_from_u64(202);

    let mut forward = Vec::new();
    let mut reverse = Vec::new();
    for _ in 0..500 {
        // Molecule 0 at full coupling is exactly molecule 1 at λ = 0.
        let decoupled = system.sample_equilibrium(0, &mut rng);
        let coupled = system.sample_equilibrium(1, &mut rng);
        let inserted = engine.switch_molecule(&system, decoupled, 1, &insert, &mut rng).unwrap();
        let deleted = engine.switch_molecule(&system, coupled, 1, &delete, &mut rng).unwrap();
        forward.push(inserted.completed().unwrap().work);
        reverse.push(deleted.completed().unwrap().work);
    }

    let expected = 1.5 * 4f64.ln();
    let (bar, bar_error) = bar_estimate(&forward, &reverse).unwrap();
    assert_abs_diff_eq!(bar, expected, epsilon = 0.15);
    assert!(bar_error < 0.1);

    let (exp_forward, _) = exp_estimate(&forward);
    let (exp_reverse, _) = exp_estimate(&reverse);
    assert_abs_diff_eq!(exp_forward, expected, epsilon = 0.25);
    assert_abs_diff_eq!(-exp_reverse, expected, epsilon = 0.25);
}

#[test]
fn test_sams_converges_on_gaussian_states() {
    let states = GaussianStates::new(vec![1.0, 1.5, 2.0, 0.7], 2).unwrap();
    let candidates = CandidateSet::new(["a", "b", "c", "d"]).unwrap();
    let schedule = GainSchedule::TwoPhase {
        burn_in: 200,
        exponent: 0.6,
    };
    let mut mixture = MixtureState::new(candidates, 0, 1, schedule).unwrap();
    let mut rng = StdRng::seed_from_u64(303);

    for _ in 0..20_000 {
        let drawn = states.draw_state(&mixture.bias(0), &mut rng).unwrap();
        mixture = mixture.observe(&[drawn]).unwrap();
    }

    let expected = states.relative_log_partition(0);
    for (zeta, target) in mixture.zeta(0).iter().zip(&expected) {
        assert_abs_diff_eq!(*zeta, *target, epsilon = 0.12);
    }
    // The widest state has the largest partition function.
    let pi = mixture.pi();
    let best = (0..pi.len()).max_by(|&a, &b| pi[a].total_cmp(&pi[b])).unwrap();
    assert_eq!(best, 2);
    assert_abs_diff_eq!(pi.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
}

#[test]
fn test_pi_concentrates_on_widest_state_as_iterations_grow() {
    // Seed-averaged π of the largest-Z state, and its mean distance from the
    // exact weight, read at increasing iteration counts.
    let states = GaussianStates::new(vec![1.0, 1.5, 2.0, 0.7], 2).unwrap();
    let log_z: Vec<f64> = (0..states.n_states()).map(|j| states.log_partition(j)).collect();
    let target = (log_z[2] - log_sum_exp(&log_z)).exp();
    let checkpoints = [250u64, 2000, 16_000];
    let n_seeds = 16;

    let mut mean_pi = [0.0; 3];
    let mut mean_error = [0.0; 3];
    for seed in 0..n_seeds {
        let candidates = CandidateSet::new(["a", "b", "c", "d"]).unwrap();
        let mut mixture = MixtureState::new(candidates, 0, 1, GainSchedule::Flat).unwrap();
        let mut rng = StdRng::seed_from_u64(1100 + seed);
        for (k, &checkpoint) in checkpoints.iter().enumerate() {
            while mixture.iteration() < checkpoint {
                let drawn = states.draw_state(&mixture.bias(0), &mut rng).unwrap();
                mixture = mixture.observe(&[drawn]).unwrap();
            }
            let pi_best = mixture.pi()[2];
            mean_pi[k] += pi_best / n_seeds as f64;
            mean_error[k] += (pi_best - target).abs() / n_seeds as f64;
        }
    }

    // Uniform start puts 1/4 on every state; the exact weight is about 0.52.
    assert!(mean_pi.iter().all(|&p| p > 0.4), "mean pi = {:?}", mean_pi);
    assert!(
        mean_error[0] > mean_error[1] && mean_error[1] > mean_error[2],
        "mean |pi - target| = {:?}",
        mean_error
    );
    assert_abs_diff_eq!(mean_pi[2], target, epsilon = 0.01);
}

#[test]
fn test_default_sampler_config_converges() {
    let config = SamplerConfig::default();
    config.validate().unwrap();
    let system = harmonic(&[1.0, 2.0, 3.0]);
    let expected = analytic_zeta(&system);
    let mixture = config.mixture(system.candidates().unwrap()).unwrap();
    let mut rng = StdRng::seed_from_u64(1001);
    let start = system.sample_equilibrium(0, &mut rng);
    let mut sampler = ExpandedEnsembleSampler::new(
        UniformProposal::new(system.molecules.len()),
        system.geometry(system.decoupled_stiffness),
        NcmcEngine::new(config.integrator, config.energy_convention),
        config.protocol().unwrap(),
        config.observation,
        vec![Chain::new(system, 0, start)],
        mixture,
    )
    .unwrap();

    sampler.run(8000, &mut rng).unwrap();

    let state = sampler.mixture();
    state.check_invariants().unwrap();
    for (z, e) in state.zeta(0).iter().zip(&expected) {
        assert_abs_diff_eq!(*z, *e, epsilon = 0.3);
    }
    assert!(sampler.statistics().leg(0).acceptance_rate() > 0.1);
}

#[test]
fn test_hybrid_sampler_converges_to_log_partition_ratios() {
    let system = harmonic(&[1.0, 2.0, 3.0]);
    let expected = analytic_zeta(&system);
    let mixture = fresh_mixture(&system, 1, GainSchedule::Flat);
    let mut sampler = harmonic_sampler(
        vec![system],
        SwitchingScheme::Hybrid,
        ObservationPolicy::Occupied,
        mixture,
        11,
    );
    let mut rng = StdRng::seed_from_u64(404);

    sampler.run(8000, &mut rng).unwrap();

    let zeta = sampler.mixture().zeta(0);
    for (z, e) in zeta.iter().zip(&expected) {
        assert_abs_diff_eq!(*z, *e, epsilon = 0.3);
    }
    assert!(sampler.statistics().leg(0).acceptance_rate() > 0.1);
}

#[test]
fn test_two_stage_sampler_converges_to_log_partition_ratios() {
    let system = harmonic(&[1.0, 2.0, 3.0]);
    let expected = analytic_zeta(&system);
    let mixture = fresh_mixture(&system, 1, GainSchedule::Flat);
    let mut sampler = harmonic_sampler(
        vec![system],
        SwitchingScheme::TwoStage,
        ObservationPolicy::Occupied,
        mixture,
        12,
    );
    let mut rng = StdRng::seed_from_u64(505);

    sampler.run(8000, &mut rng).unwrap();

    for (z, e) in sampler.mixture().zeta(0).iter().zip(&expected) {
        assert_abs_diff_eq!(*z, *e, epsilon = 0.3);
    }
}

#[test]
fn test_two_leg_mixture_favors_tightest_relative_binder() {
    let complex = harmonic(&[1.0, 2.0, 3.0]);
    let solvent = harmonic(&[1.0, 1.0, 1.0]);
    let expected = analytic_zeta(&complex);
    let mixture = fresh_mixture(&complex, 2, GainSchedule::Flat);
    let mut sampler = harmonic_sampler(
        vec![complex, solvent],
        SwitchingScheme::Hybrid,
        ObservationPolicy::Occupied,
        mixture,
        13,
    );
    let mut rng = StdRng::seed_from_u64(606);

    sampler.run(6000, &mut rng).unwrap();

    let state = sampler.mixture();
    assert_eq!(state.iteration(), 6000);
    state.check_invariants().unwrap();
    for (z, e) in state.zeta(0).iter().zip(&expected) {
        assert_abs_diff_eq!(*z, *e, epsilon = 0.4);
    }
    for z in state.zeta(1) {
        assert_abs_diff_eq!(*z, 0.0, epsilon = 0.4);
    }
    let pi = state.pi();
    assert!(pi[0] > pi[1] && pi[1] > pi[2], "pi = {:?}", pi);
}

/// Harmonic system whose hybrid potential blows up halfway into any switch
/// that involves molecule 1.
#[derive(Clone, Debug)]
struct Clashing(HarmonicAlchemy);

impl PotentialEnergy for Clashing {
    fn energy(&self, config: &Configuration, molecule: usize, lambda: f64) -> f64 {
        self.0.energy(config, molecule, lambda)
    }

    fn hybrid_energy(&self, config: &Configuration, old: usize, new: usize, lambda: f64) -> f64 {
        if (old == 1 || new == 1) && lambda >= 0.5 {
            f64::INFINITY
        } else {
            self.0.hybrid_energy(config, old, new, lambda)
        }
    }
}

#[test]
fn test_overlap_rejects_but_still_updates_mixture() {
    let system = harmonic(&[1.0, 2.0]);
    let mut rng = StdRng::seed_from_u64(707);
    let start = system.sample_equilibrium(0, &mut rng);
    let mixture = fresh_mixture(&system, 1, GainSchedule::Flat);
    let mut sampler = ExpandedEnsembleSampler::new(
        UniformProposal::new(2),
        system.geometry(1.0),
        metropolis_engine(),
        Protocol::linear(SwitchingScheme::Hybrid, 4).unwrap(),
        ObservationPolicy::Occupied,
        vec![Chain::new(Clashing(system), 0, start.clone())],
        mixture,
    )
    .unwrap();

    for n in 1..=5u64 {
        let records = sampler.step(&mut rng).unwrap();
        let record = &records[0];
        assert_eq!(record.outcome, MoveOutcome::Overlap { step: 2 });
        assert!(record.terms.is_none());
        assert!(record.log_p_accept.is_none());
        assert_eq!(sampler.chains()[0].molecule(), 0);
        assert_eq!(sampler.chains()[0].configuration(), &start);
        assert_eq!(sampler.mixture().iteration(), n);
    }
    // The chain never left the reference, so molecule 1 keeps falling behind it.
    assert!(sampler.mixture().zeta(0)[1] < 0.0);
    assert_eq!(sampler.statistics().leg(0).overlaps, 5);
    assert_eq!(sampler.statistics().leg(0).accepted, 0);
}

#[test]
fn test_checkpoint_continuation_matches_uninterrupted_run() {
    let system = harmonic(&[1.0, 2.0, 3.0]);
    let schedule = GainSchedule::TwoPhase {
        burn_in: 10,
        exponent: 0.8,
    };
    let sampler = |mixture: MixtureState| {
        harmonic_sampler(
            vec![system.clone()],
            SwitchingScheme::Hybrid,
            ObservationPolicy::Occupied,
            mixture,
            21,
        )
    };

    let mut uninterrupted = sampler(fresh_mixture(&system, 1, schedule));
    let mut rng = StdRng::seed_from_u64(808);
    uninterrupted.run(60, &mut rng).unwrap();

    let mut first = sampler(fresh_mixture(&system, 1, schedule));
    let mut rng = StdRng::seed_from_u64(808);
    first.run(30, &mut rng).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixture.yml");
    save_checkpoint(first.mixture(), &path).unwrap();
    let restored = load_checkpoint(&path).unwrap();
    assert_eq!(&restored, first.mixture());
    assert_eq!(restored.pi(), first.mixture().pi());

    let chains: Vec<Chain<HarmonicAlchemy>> = first.chains().to_vec();
    let mut resumed = ExpandedEnsembleSampler::new(
        UniformProposal::new(3),
        system.geometry(system.decoupled_stiffness),
        metropolis_engine(),
        Protocol::linear(SwitchingScheme::Hybrid, 10).unwrap(),
        ObservationPolicy::Occupied,
        chains,
        restored,
    )
    .unwrap();
    resumed.run(30, &mut rng).unwrap();

    assert_eq!(resumed.mixture(), uninterrupted.mixture());
    assert_eq!(resumed.mixture().iteration(), 60);
}

#[test]
fn test_replicas_pool_statistics_through_shared_mixture() {
    let system = harmonic(&[1.0, 2.0]);
    let shared = SharedMixture::new(fresh_mixture(&system, 1, GainSchedule::Flat));

    thread::scope(|scope| {
        for replica in 0..3u64 {
            let handle = shared.clone();
            let system = system.clone();
            scope.spawn(move || {
                let mut sampler = harmonic_sampler(
                    vec![system],
                    SwitchingScheme::Hybrid,
                    ObservationPolicy::Occupied,
                    handle,
                    replica,
                );
                let mut rng = StdRng::seed_from_u64(900 + replica);
                sampler.run(100, &mut rng).unwrap();
            });
        }
    });

    let state = shared.snapshot();
    assert_eq!(state.iteration(), 300);
    state.check_invariants().unwrap();
}
