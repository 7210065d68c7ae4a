// rover_sim/src/main.rs

use clap::Parser;
use rover_sim::cli::Cli;
use rover_sim::config::ScenarioConfig;
use rover_sim::simulation::Simulation;
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.print_config {
        println!("{}", ScenarioConfig::default().to_toml()?);
        return Ok(());
    }

    info!("Loading scenario from: {:?}", cli.scenario);
    let mut config = ScenarioConfig::load(&cli.scenario)?;
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }

    let mut sim = Simulation::from_config(config)?;
    let summary = sim.run(cli.ticks);

    if let Some(dir) = &cli.snapshot {
        sim.write_snapshots(dir)?;
    }
    println!("{summary}");
    Ok(())
}
