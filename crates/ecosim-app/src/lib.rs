//! Command-line plumbing for the headless `ecosim` driver.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use ecosim_core::{
    BehaviorStrategy, EcosystemConfig, MemoryCollector, PopulationSummary, Simulation,
    WorldStatistics,
};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ecosim",
    version,
    about = "Run a headless predator, prey and invasive species simulation"
)]
pub struct Cli {
    /// JSON configuration file; flags below override its values.
    #[arg(long, env = "ECOSIM_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub width: Option<f64>,

    #[arg(long)]
    pub height: Option<f64>,

    /// Initial predator population.
    #[arg(long)]
    pub predators: Option<usize>,

    /// Initial prey population.
    #[arg(long)]
    pub prey: Option<usize>,

    /// Initial invasive population.
    #[arg(long)]
    pub invasive: Option<usize>,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of steps to run.
    #[arg(long, default_value_t = 1_000)]
    pub ticks: u64,

    /// Real seconds fed to the clock per step.
    #[arg(long, default_value_t = 1.0)]
    pub time_delta: f64,

    /// Simulated seconds per real second.
    #[arg(long)]
    pub time_scale: Option<f64>,

    /// Action selection strategy: `rules` or `utility`.
    #[arg(long)]
    pub strategy: Option<BehaviorStrategy>,

    /// Step at which invasive species are introduced.
    #[arg(long)]
    pub invasive_at: Option<u64>,

    /// Number of invasive agents introduced at `--invasive-at`.
    #[arg(long, default_value_t = 10)]
    pub invasive_count: usize,

    /// Steps between progress log lines; 0 disables them.
    #[arg(long, default_value_t = 100)]
    pub report_every: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn load_config(path: &Path) -> Result<EcosystemConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Merge the optional config file with command-line overrides and validate the result.
pub fn build_config(cli: &Cli) -> Result<EcosystemConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EcosystemConfig::default(),
    };
    if let Some(width) = cli.width {
        config.world_width = width;
    }
    if let Some(height) = cli.height {
        config.world_height = height;
    }
    if let Some(predators) = cli.predators {
        config.initial_predators = predators;
    }
    if let Some(prey) = cli.prey {
        config.initial_prey = prey;
    }
    if let Some(invasive) = cli.invasive {
        config.initial_invasive = invasive;
    }
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }
    if let Some(scale) = cli.time_scale {
        config.time_scale = scale;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    config.validate().context("invalid ecosystem configuration")?;
    Ok(config)
}

/// What a finished run reports on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub simulated_time: String,
    pub births: usize,
    pub deaths: usize,
    pub failures: usize,
    pub statistics: WorldStatistics,
    pub population: Option<PopulationSummary>,
}

/// Build a simulation from `cli` and run it to completion.
pub fn run(cli: &Cli) -> Result<RunSummary> {
    if !(cli.time_delta.is_finite() && cli.time_delta >= 0.0) {
        bail!("--time-delta must be a non-negative number, got {}", cli.time_delta);
    }
    let config = build_config(cli)?;
    let (predators, prey, invasive) = (
        config.initial_predators,
        config.initial_prey,
        config.initial_invasive,
    );
    let mut sim = Simulation::with_history(config).context("failed to build simulation")?;
    sim.initialize(predators, prey, invasive)
        .context("failed to populate the world")?;

    let mut summary = RunSummary {
        ticks: 0,
        simulated_time: String::new(),
        births: 0,
        deaths: 0,
        failures: 0,
        statistics: WorldStatistics::default(),
        population: None,
    };
    for tick in 0..cli.ticks {
        if cli.invasive_at == Some(tick) {
            sim.introduce_invasive_species(cli.invasive_count)
                .context("failed to introduce invasive species")?;
        }
        let outcome = sim
            .step(cli.time_delta)
            .with_context(|| format!("simulation step {tick} failed"))?;
        if let Some(report) = outcome.tick {
            summary.births += report.births;
            summary.deaths += report.deaths;
            summary.failures += report.failures;
        }
        summary.ticks = tick + 1;
        if cli.report_every > 0 && summary.ticks % cli.report_every == 0 {
            log_progress(&sim, summary.ticks);
        }
    }

    summary.simulated_time = sim.clock().formatted_time();
    summary.statistics = sim.statistics();
    summary.population = sim.sink().population_summary();
    Ok(summary)
}

fn log_progress(sim: &Simulation<MemoryCollector>, ticks: u64) {
    let stats = sim.statistics();
    info!(
        ticks,
        time = %sim.clock().formatted_time(),
        season = %stats.season,
        predators = stats.predator_count,
        prey = stats.prey_count,
        invasive = stats.invasive_count,
        avg_energy = stats.avg_energy,
        "simulation progress"
    );
}
