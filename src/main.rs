use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use sams_ncmc::io::{load_checkpoint, read_run_config, save_checkpoint};
use sams_ncmc::logging::setup_logging;
use sams_ncmc::{
    Chain, Error, ExpandedEnsembleSampler, MixtureState, NcmcEngine, Result, RunConfig,
    UniformProposal,
};

/// Self-adjusted mixture sampling with NCMC identity moves on a harmonic test system.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// YAML run configuration.
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Continue from a mixture checkpoint.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Write the final mixture state here (overrides the configuration).
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Number of iterations (overrides the configuration).
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Random seed (overrides the configuration).
    #[arg(long)]
    seed: Option<u64>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output.
    #[arg(short, long)]
    quiet: bool,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.verbose, args.quiet, args.log_file.clone()) {
        eprintln!("failed to set up logging: {}", e);
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn initial_mixture(config: &RunConfig, resume: Option<&PathBuf>) -> Result<MixtureState> {
    let candidates = config.system.candidates()?;
    let Some(path) = resume else {
        return config.sampler.mixture(candidates);
    };
    let state = load_checkpoint(path)?;
    if state.candidates() != &candidates {
        return Err(Error::Config(
            "checkpoint candidates differ from the configured molecules".to_string(),
        ));
    }
    let sampler = &config.sampler;
    if state.n_legs() != sampler.n_legs() || state.reference() != sampler.reference_index {
        return Err(Error::Config(
            "checkpoint legs or reference differ from the configuration".to_string(),
        ));
    }
    Ok(state)
}

fn run(args: Args) -> Result<()> {
    let mut config = read_run_config(&args.config)?;
    if let Some(n) = args.iterations {
        config.iterations = n;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.checkpoint.is_some() {
        config.checkpoint = args.checkpoint.clone();
    }

    let mixture = initial_mixture(&config, args.resume.as_ref())?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let legs = config.leg_systems();
    let stiffness = config.geometry_stiffness.unwrap_or(config.system.decoupled_stiffness);
    let geometry = config.system.geometry(stiffness);
    let chains = legs
        .iter()
        .map(|system| {
            let start = system.sample_equilibrium(config.initial_molecule, &mut rng);
            Chain::new(system.clone(), config.initial_molecule, start)
        })
        .collect();

    let mut sampler = ExpandedEnsembleSampler::new(
        UniformProposal::new(config.system.molecules.len()),
        geometry,
        NcmcEngine::new(config.sampler.integrator, config.sampler.energy_convention),
        config.sampler.protocol()?,
        config.sampler.observation,
        chains,
        mixture,
    )?;

    info!(iterations = config.iterations, "sampling");
    sampler.run(config.iterations, &mut rng)?;
    sampler.statistics().report();

    let state = sampler.mixture();
    if let Some(path) = &config.checkpoint {
        save_checkpoint(state, path)?;
    }

    println!("SAMS-NCMC results after {} iterations", state.iteration());
    println!("----------------------------------------");
    let pi = state.pi();
    for (j, id) in state.candidates().ids().iter().enumerate() {
        let analytic: f64 = legs
            .iter()
            .enumerate()
            .map(|(leg, system)| {
                let relative = system.log_partition(j) - system.log_partition(state.reference());
                if leg == 0 { relative } else { -relative }
            })
            .sum();
        let zeta: Vec<String> =
            (0..state.n_legs()).map(|leg| format!("{:10.4}", state.zeta(leg)[j])).collect();
        println!(
            "{:>12}  zeta {}  pi {:8.4}  analytic {:10.4}",
            id,
            zeta.join(" "),
            pi[j],
            analytic
        );
    }
    for (leg, stats) in sampler.statistics().legs().iter().enumerate() {
        println!(
            "leg {}: acceptance {:.3} ({} / {}), overlaps {}",
            leg,
            stats.acceptance_rate(),
            stats.accepted,
            stats.attempted,
            stats.overlaps
        );
    }
    Ok(())
}
