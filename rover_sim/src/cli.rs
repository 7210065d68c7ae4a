// rover_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// rover_sim: runs the rover's perception and decision loop against a
/// scripted camera and a kinematic vehicle, headless.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/default.toml")]
    pub scenario: PathBuf,

    /// Stop after this many ticks instead of the scenario's duration.
    #[arg(short, long)]
    pub ticks: Option<usize>,

    /// Overrides `[simulation] seed` from the scenario.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory to write the vision and world-map images to at mission end.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `rover_core=debug`).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the default scenario as TOML and exit.
    #[arg(long, default_value_t = false)]
    pub print_config: bool,
}
