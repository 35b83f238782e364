use serde::Deserialize;
use std::path::Path;

use crate::simulation::{SimulationMode, SimulationSettings};

/// Run settings read from a TOML file. Command-line flags override these.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_resolution")]
    pub tick_resolution: f64,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_terminal_time")]
    pub terminal_time: f64,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub cps: f64,
    #[serde(default)]
    pub click_target: Option<String>,
    #[serde(default = "default_monte_carlo_runs")]
    pub monte_carlo_runs: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

pub const STRATEGIES: [&str; 3] = ["greedy_cheapest", "greedy_roi", "save_for_best"];

fn default_tick_resolution() -> f64 {
    1.0
}
fn default_mode() -> String {
    "tick".to_string()
}
fn default_terminal_time() -> f64 {
    3600.0
}
fn default_strategy() -> String {
    "greedy_cheapest".to_string()
}
fn default_monte_carlo_runs() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_resolution: default_tick_resolution(),
            mode: default_mode(),
            seed: None,
            terminal_time: default_terminal_time(),
            strategy: default_strategy(),
            cps: 0.0,
            click_target: None,
            monte_carlo_runs: default_monte_carlo_runs(),
            log_level: default_log_level(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !(self.tick_resolution > 0.0 && self.tick_resolution.is_finite()) {
            errors.push(format!(
                "tick_resolution must be > 0.0, got {}. Example: tick_resolution = 1.0",
                self.tick_resolution
            ));
        }

        if self.mode.parse::<SimulationMode>().is_err() {
            errors.push(format!(
                "mode must be \"tick\" or \"event_jump\", got '{}'. Example: mode = \"event_jump\"",
                self.mode
            ));
        }

        if !(self.terminal_time > 0.0) {
            errors.push(format!(
                "terminal_time must be > 0.0, got {}. Example: terminal_time = 3600.0",
                self.terminal_time
            ));
        }

        if !STRATEGIES.contains(&self.strategy.as_str()) {
            errors.push(format!(
                "strategy must be one of {:?}, got '{}'. Example: strategy = \"greedy_roi\"",
                STRATEGIES, self.strategy
            ));
        }

        if !(self.cps >= 0.0) {
            errors.push(format!("cps must be >= 0.0, got {}. Example: cps = 5.0", self.cps));
        }

        if self.monte_carlo_runs == 0 {
            errors.push(format!(
                "monte_carlo_runs must be > 0, got {}. Example: monte_carlo_runs = 100",
                self.monte_carlo_runs
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Settings for the simulation loop. Call after `validate`; an
    /// unparseable mode falls back to tick.
    pub fn settings(&self) -> SimulationSettings {
        SimulationSettings {
            tick_resolution: self.tick_resolution,
            mode: self.mode.parse().unwrap_or_default(),
            seed: self.seed,
        }
    }
}
