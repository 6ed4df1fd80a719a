use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, level_filters::LevelFilter};
use waveform_common::{RunId, init_tracer};
use waveform_simulator::{
    Seeds, Simulation,
    hits::open_hits,
    output::OutputFormat,
    simulation_elements::PulseParameterDistribution,
    simulation_engine::run_simulation,
    summary::RunSummary,
};

#[derive(Clone, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Path to the JSON simulation configuration
    #[clap(long)]
    config: PathBuf,

    /// JSON lines files of photon hits, each one is simulated as a separate run
    #[clap(long, num_args = 1.., required = true)]
    hits: Vec<PathBuf>,

    /// Identifier of the run of the first hits file, later files count up from it
    #[clap(long, default_value = "0")]
    run_id: RunId,

    /// Directory the run files are written to
    #[clap(long, default_value = ".")]
    output_dir: PathBuf,

    #[clap(long, value_enum, default_value_t)]
    output_format: OutputFormat,

    /// If set, a human readable summary of every run is appended to this file
    #[clap(long)]
    summary_file: Option<PathBuf>,

    /// Master seed of all random streams, overriding any seeds in the configuration
    #[clap(long)]
    seed: Option<u64>,

    /// Log level used when `RUST_LOG` is not set
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

fn simulate_run(
    cli: &Cli,
    simulation: &Simulation,
    distribution: &PulseParameterDistribution,
    hits_file: &Path,
    run: RunId,
    seeds: Seeds,
) -> Result<()> {
    let events = open_hits(hits_file)?;
    let mut writer = cli.output_format.create(&cli.output_dir, run)?;
    let statistics = run_simulation(
        simulation,
        distribution,
        events,
        writer.as_mut(),
        run,
        seeds,
    )?;
    if let Some(summary_file) = &cli.summary_file {
        RunSummary {
            statistics: &statistics,
            simulation,
            hits_file,
        }
        .append_to(summary_file)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracer = init_tracer!(cli.log_level);

    let simulation = Simulation::load(&cli.config)?;
    let distribution = simulation.build_distribution()?;

    let seeds = match cli.seed.map(Seeds::from_master).or(simulation.seeds) {
        Some(seeds) => seeds,
        None => {
            let seeds = Seeds::from_entropy();
            info!(?seeds, "No seeds given, drawn from entropy");
            seeds
        }
    };

    let failed = cli
        .hits
        .par_iter()
        .enumerate()
        .map(|(index, hits_file)| {
            let run = RunId::try_from(index)
                .ok()
                .and_then(|index| cli.run_id.checked_add(index))
                .ok_or_else(|| anyhow!("Run identifier overflow at {}", hits_file.display()))?;
            simulate_run(
                &cli,
                &simulation,
                &distribution,
                hits_file,
                run,
                seeds.for_run(index as u64),
            )
            .with_context(|| format!("Run {run} from {}", hits_file.display()))
        })
        .filter_map(Result::err)
        .inspect(|e| error!("{e:#}"))
        .count();

    if failed > 0 {
        return Err(anyhow!("{failed} of {} runs failed", cli.hits.len()));
    }
    info!("All {} runs completed", cli.hits.len());
    Ok(())
}
