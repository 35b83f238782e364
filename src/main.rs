use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use idleengine::cli::commands;
use idleengine::config::simulation::SimulationConfig;

#[derive(Parser)]
#[command(name = "idleengine")]
#[command(about = "A deterministic simulation engine for validating idle game pacing")]
#[command(version)]
struct Cli {
    /// Path to a simulation settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a game with a player strategy and print the pacing report
    Simulate {
        /// Built-in game name or path to a .toml game file
        game: String,

        /// greedy_cheapest, greedy_roi or save_for_best
        #[arg(long)]
        strategy: Option<String>,

        /// Clicks per second
        #[arg(long)]
        cps: Option<f64>,

        /// Currency to click (defaults to the game's first click target)
        #[arg(long)]
        click_target: Option<String>,

        /// Seconds per tick
        #[arg(long)]
        tick_resolution: Option<f64>,

        /// tick or event_jump
        #[arg(long)]
        mode: Option<String>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many simulated seconds
        #[arg(long)]
        terminal_time: Option<f64>,

        /// Write the report as JSON to this path
        #[arg(long)]
        export_json: Option<PathBuf>,

        /// Number of Monte Carlo runs
        #[arg(long)]
        monte_carlo: Option<u32>,
    },

    /// Check a game definition for errors and warnings
    Validate {
        /// Built-in game name or path to a .toml game file
        game: String,
    },

    /// List built-in games
    Games,
}

fn load_config(path: Option<&str>) -> SimulationConfig {
    let Some(path) = path else {
        return SimulationConfig::default();
    };
    match SimulationConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn main() {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    init_tracing(&config.log_level, cli.log_json);

    match cli.command {
        Commands::Simulate {
            game,
            strategy,
            cps,
            click_target,
            tick_resolution,
            mode,
            seed,
            terminal_time,
            export_json,
            monte_carlo,
        } => {
            if let Some(v) = strategy {
                config.strategy = v;
            }
            if let Some(v) = cps {
                config.cps = v;
            }
            if click_target.is_some() {
                config.click_target = click_target;
            }
            if let Some(v) = tick_resolution {
                config.tick_resolution = v;
            }
            if let Some(v) = mode {
                config.mode = v;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(v) = terminal_time {
                config.terminal_time = v;
            }
            if let Some(v) = monte_carlo {
                config.monte_carlo_runs = v;
            }

            if let Err(e) = commands::simulate(&game, &config, export_json.as_deref()) {
                eprintln!("Simulation error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Validate { game } => {
            if let Err(e) = commands::validate(&game) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Games => {
            println!("Built-in games:");
            commands::list_games();
        }
    }
}
