use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::info;

use crate::game::definition::{DefinitionError, GameDefinition};
use crate::simulation::pacing::{evaluate_all, PacingBound};
use crate::simulation::report::{RunOutcome, SimulationReport};
use crate::simulation::strategy::Strategy;
use crate::simulation::terminal::Terminal;
use crate::simulation::{Simulation, SimulationSettings};

/// Spread of one quantity across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl Stats {
    /// Population statistics. All zero for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Stats::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Stats {
            count: samples.len(),
            mean,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: variance.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneStats {
    /// Runs that reached the milestone at all.
    pub reached: usize,
    /// Times over the runs that reached it.
    pub time: Stats,
}

/// Aggregate over a batch of seeded runs.
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloSummary {
    pub runs: usize,
    pub base_seed: u64,
    pub total_time: Stats,
    pub milestones: BTreeMap<String, MilestoneStats>,
    pub outcomes: BTreeMap<String, usize>,
    pub stall_runs: usize,
    /// Bound description to the fraction of runs that passed it.
    pub pacing_pass_rates: BTreeMap<String, f64>,
    #[serde(skip)]
    pub reports: Vec<SimulationReport>,
}

/// Runs `runs` simulations with seeds `base + 0 .. base + runs - 1`, a fresh
/// strategy from `make_strategy` for each. The base seed is `settings.seed`,
/// or random if unset.
pub fn run_monte_carlo(
    definition: Rc<GameDefinition>,
    mut make_strategy: impl FnMut() -> Box<dyn Strategy>,
    terminal: &Terminal,
    settings: &SimulationSettings,
    runs: u32,
) -> Result<MonteCarloSummary, DefinitionError> {
    let base_seed = settings.seed.unwrap_or_else(rand::random);
    info!(runs, base_seed, game = %definition.name(), "Starting Monte Carlo batch");

    let mut reports = Vec::with_capacity(runs as usize);
    for i in 0..runs {
        let run_settings = SimulationSettings {
            seed: Some(base_seed.wrapping_add(u64::from(i))),
            ..settings.clone()
        };
        let sim = Simulation::new(
            Rc::clone(&definition),
            make_strategy(),
            terminal.clone(),
            run_settings,
        )?;
        reports.push(sim.run());
    }

    Ok(summarize(base_seed, reports, definition.pacing_bounds()))
}

/// Aggregates finished reports. Milestones are keyed by id over every run.
pub fn summarize(base_seed: u64, reports: Vec<SimulationReport>, bounds: &[PacingBound]) -> MonteCarloSummary {
    let totals: Vec<f64> = reports.iter().map(|r| r.total_time).collect();

    let mut milestone_times: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();
    let mut stall_runs = 0;
    let mut passes: BTreeMap<String, usize> = BTreeMap::new();

    for report in &reports {
        for (id, t) in &report.milestone_times {
            milestone_times.entry(id.clone()).or_default().push(*t);
        }
        *outcomes.entry(report.outcome.to_string()).or_insert(0) += 1;
        if report.outcome == RunOutcome::Stalled || !report.stalls.is_empty() {
            stall_runs += 1;
        }
        for result in evaluate_all(bounds, report) {
            let entry = passes.entry(result.description).or_insert(0);
            if result.passed {
                *entry += 1;
            }
        }
    }

    let milestones = milestone_times
        .into_iter()
        .map(|(id, times)| {
            let stats = MilestoneStats { reached: times.len(), time: Stats::from_samples(&times) };
            (id, stats)
        })
        .collect();

    let n = reports.len().max(1) as f64;
    let pacing_pass_rates = passes.into_iter().map(|(d, p)| (d, p as f64 / n)).collect();

    MonteCarloSummary {
        runs: reports.len(),
        base_seed,
        total_time: Stats::from_samples(&totals),
        milestones,
        outcomes,
        stall_runs,
        pacing_pass_rates,
        reports,
    }
}
