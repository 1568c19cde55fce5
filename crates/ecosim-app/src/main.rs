use anyhow::{Context, Result};
use clap::Parser;
use ecosim_app::{Cli, run};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    info!(ticks = cli.ticks, time_delta = cli.time_delta, "starting ecosystem simulation");

    let summary = run(&cli)?;
    info!(
        ticks = summary.ticks,
        births = summary.births,
        deaths = summary.deaths,
        "simulation finished"
    );
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    println!("{json}");
    Ok(())
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
