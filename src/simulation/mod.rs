//! Headless play-throughs. A [`Simulation`] drives a fresh runtime with a
//! strategy until a terminal condition holds and returns a report.

pub mod metrics;
pub mod monte_carlo;
pub mod pacing;
pub mod report;
pub mod strategy;
pub mod terminal;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::game::definition::{DefinitionError, GameDefinition};
use crate::game::requirement::SharedRng;
use crate::runtime::{ElementStatus, GameRuntime};
use crate::simulation::metrics::MetricsCollector;
use crate::simulation::report::{RunOutcome, RunSummary, SimulationReport};
use crate::simulation::strategy::Strategy;
use crate::simulation::terminal::{SimulationContext, Terminal};

/// Hard ceiling on loop iterations in either mode.
pub const MAX_ITERATIONS: u64 = 10_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Fixed-resolution steps.
    #[default]
    Tick,
    /// Jump straight to the next moment something becomes affordable.
    EventJump,
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimulationMode::Tick => "tick",
            SimulationMode::EventJump => "event_jump",
        })
    }
}

impl FromStr for SimulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tick" => Ok(SimulationMode::Tick),
            "event_jump" | "event-jump" => Ok(SimulationMode::EventJump),
            other => Err(format!("Unknown mode '{}'. Expected 'tick' or 'event_jump'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// Step length in tick mode; metrics sampling interval in both modes.
    pub tick_resolution: f64,
    pub mode: SimulationMode,
    /// Random draws are reproducible for a given seed. Drawn at random when
    /// absent.
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings { tick_resolution: 1.0, mode: SimulationMode::Tick, seed: None }
    }
}

/// One play-through of a game definition.
///
/// Construction binds a seeded random source to every estimated-time
/// requirement in the definition, so two simulations over the same definition
/// must run one after the other, not interleaved.
pub struct Simulation {
    definition: Rc<GameDefinition>,
    runtime: GameRuntime,
    strategy: Box<dyn Strategy>,
    terminal: Terminal,
    settings: SimulationSettings,
    collector: MetricsCollector,
    context: SimulationContext,
    seed: u64,
    milestones_seen: BTreeSet<String>,
    last_prestige_time: f64,
}

impl Simulation {
    pub fn new(
        definition: Rc<GameDefinition>,
        strategy: Box<dyn Strategy>,
        terminal: Terminal,
        settings: SimulationSettings,
    ) -> Result<Self, DefinitionError> {
        let runtime = GameRuntime::new(Rc::clone(&definition))?;

        let seed = match settings.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random();
                info!(seed, "No seed configured, using a random one");
                seed
            }
        };
        let rng: SharedRng = Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed)));
        for requirement in definition.requirement_roots() {
            requirement.inject_rng(&rng);
        }

        Ok(Simulation {
            collector: MetricsCollector::new(settings.tick_resolution),
            definition,
            runtime,
            strategy,
            terminal,
            settings,
            context: SimulationContext::default(),
            seed,
            milestones_seen: BTreeSet::new(),
            last_prestige_time: 0.0,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn runtime(&self) -> &GameRuntime {
        &self.runtime
    }

    /// For installing production pipelines or subsystems before running.
    pub fn runtime_mut(&mut self) -> &mut GameRuntime {
        &mut self.runtime
    }

    pub fn run(mut self) -> SimulationReport {
        info!(
            game = %self.definition.name(),
            strategy = %self.strategy.describe(),
            terminal = %self.terminal,
            mode = %self.settings.mode,
            seed = self.seed,
            "Starting simulation"
        );
        let outcome = match self.settings.mode {
            SimulationMode::Tick => self.run_tick(),
            SimulationMode::EventJump => self.run_event_jump(),
        };
        let total_time = self.runtime.state().time_elapsed;
        info!(
            outcome = %outcome,
            total_time,
            purchases = self.context.total_purchases,
            milestones = self.milestones_seen.len(),
            "Simulation finished"
        );

        SimulationReport::build(
            self.collector,
            RunSummary {
                game_name: self.definition.name().to_string(),
                strategy_description: self.strategy.describe(),
                terminal_description: self.terminal.to_string(),
                outcome,
                total_time,
                seed: self.seed,
            },
        )
    }

    fn terminal_met(&self) -> bool {
        self.terminal.is_met(self.runtime.state(), &self.context)
    }

    fn run_tick(&mut self) -> RunOutcome {
        let dt = self.settings.tick_resolution;
        let mut ticks: u64 = 0;
        while !self.terminal_met() {
            ticks += 1;
            if ticks > MAX_ITERATIONS {
                return RunOutcome::MaxTicks;
            }

            self.runtime.tick(dt);
            let clicks = self.strategy.get_clicks(self.runtime.state(), dt, false);
            for (currency, count) in clicks {
                for _ in 0..count {
                    self.runtime.process_click(&currency);
                }
            }
            let affordable = self.runtime.affordable_purchases();
            self.buy(&affordable);
            self.consider_prestige();

            if let Some(outcome) = self.finish_step() {
                return outcome;
            }
        }
        RunOutcome::TerminalMet
    }

    fn run_event_jump(&mut self) -> RunOutcome {
        self.runtime.tick(0.0);
        let mut iterations: u64 = 0;
        while !self.terminal_met() {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return RunOutcome::MaxIterations;
            }

            let affordable = self.runtime.affordable_purchases();
            let bought = if affordable.is_empty() { 0 } else { self.buy(&affordable) };

            // A strategy that declines every affordable element still has to
            // let time pass.
            if bought == 0 {
                self.runtime.refresh_rates();
                let Some(duration) = self.next_jump() else {
                    let state = self.runtime.state();
                    info!(time = state.time_elapsed, "Nothing can ever become affordable");
                    self.collector.record_stall(state, 0.0);
                    self.context.stall_detected = true;
                    break;
                };
                self.wait(duration);
            }
            self.consider_prestige();

            if let Some(outcome) = self.finish_step() {
                return outcome;
            }
        }

        if self.terminal_met() {
            RunOutcome::TerminalMet
        } else if self.context.stall_detected {
            RunOutcome::Stalled
        } else {
            RunOutcome::MaxIterations
        }
    }

    /// Attempts purchases in the strategy's order. Each attempt re-checks
    /// affordability, so earlier buys in the same step can exhaust later ones.
    fn buy(&mut self, affordable: &[ElementStatus]) -> usize {
        let order = self.strategy.decide_purchases(&mut self.runtime, affordable);
        let mut bought = 0;
        for id in order {
            let Some(cost) = self.runtime.purchase(&id) else {
                continue;
            };
            let state = self.runtime.state();
            self.collector.record_purchase(state, &id, cost);
            self.context.last_purchase_time = state.time_elapsed;
            self.context.total_purchases += 1;
            bought += 1;
        }
        bought
    }

    fn consider_prestige(&mut self) {
        let definition = Rc::clone(&self.definition);
        for layer in definition.prestige_layers() {
            if !self.strategy.should_prestige(self.runtime.state(), &layer.id) {
                continue;
            }
            let result = self.runtime.trigger_prestige(&layer.id);
            if !result.success {
                continue;
            }
            let state = self.runtime.state();
            let run_duration = state.time_elapsed - self.last_prestige_time;
            self.collector
                .record_prestige(state, &layer.id, result.reward_amount, run_duration);
            self.last_prestige_time = state.time_elapsed;
        }
    }

    /// Per-second income the strategy expects from clicking while it waits.
    fn click_income_rate(&self) -> BTreeMap<String, f64> {
        self.strategy
            .get_clicks(self.runtime.state(), 1.0, true)
            .into_iter()
            .filter_map(|(currency, count)| {
                let ct = self.definition.click_target(&currency)?;
                (count > 0).then(|| (currency, ct.base_value * count as f64))
            })
            .collect()
    }

    /// Seconds until the soonest available element becomes affordable, or
    /// `None` if none ever will. Ties go to the earliest in definition order.
    /// Elements the strategy has already passed over while affordable are
    /// skipped; if nothing else is coming, the jump is one tick.
    fn next_jump(&self) -> Option<f64> {
        let click_income = self.click_income_rate();
        let mut soonest: Option<(f64, String)> = None;
        let mut declined_affordable = false;
        for element in self.runtime.available_purchases() {
            let t = self.runtime.compute_time_to_afford(&element.id).or_else(|| {
                if click_income.is_empty() {
                    None
                } else {
                    self.runtime.time_to_afford_with_income(&element.id, &click_income)
                }
            });
            let Some(t) = t.filter(|t| *t >= 0.0) else {
                continue;
            };
            if t <= 0.0 {
                declined_affordable = true;
                continue;
            }
            if soonest.as_ref().is_none_or(|(best, _)| t < *best) {
                soonest = Some((t, element.id));
            }
        }

        match soonest {
            Some((duration, id)) => {
                debug!(element = %id, duration, "Jumping to next affordable element");
                Some(duration)
            }
            None if declined_affordable => Some(self.settings.tick_resolution),
            None => None,
        }
    }

    fn wait(&mut self, duration: f64) {
        let clicks = self.strategy.get_clicks(self.runtime.state(), duration, true);
        for (currency, count) in clicks {
            self.runtime.apply_bulk_clicks(&currency, count);
        }
        self.runtime.tick(duration);
        self.collector.record_wait(self.runtime.state(), duration);
    }

    /// Logs newly reached milestones, samples metrics, and aborts on
    /// non-finite balances.
    fn finish_step(&mut self) -> Option<RunOutcome> {
        self.record_new_milestones();
        self.collector.record_tick(self.runtime.state());

        let state = self.runtime.state();
        if let Some(currency) = state.first_non_finite() {
            warn!(currency, time = state.time_elapsed, "Non-finite currency balance, aborting run");
            return Some(RunOutcome::NonFinite);
        }
        None
    }

    /// Milestones are logged in the order they were reached, with definition
    /// order breaking ties within one step.
    fn record_new_milestones(&mut self) {
        let definition = Rc::clone(&self.definition);
        let state = self.runtime.state();
        let mut fresh: Vec<(f64, &str)> = definition
            .milestones()
            .iter()
            .filter(|m| !self.milestones_seen.contains(&m.id))
            .filter_map(|m| state.milestone_time(&m.id).map(|t| (t, m.id.as_str())))
            .collect();
        fresh.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (time, id) in fresh {
            self.collector.record_milestone(time, id);
            self.milestones_seen.insert(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::definition::{ClickTarget, CurrencyDef, ElementDef, MilestoneDef};
    use crate::game::effect::{EffectDef, EffectType};
    use crate::game::requirement::Requirement;
    use crate::game::value::Comparison;
    use crate::game::CostScaling;
    use crate::simulation::strategy::{ClickProfile, CustomStrategy, GreedyCheapest, SaveForBest};

    fn settings(mode: SimulationMode) -> SimulationSettings {
        SimulationSettings { tick_resolution: 1.0, mode, seed: Some(42) }
    }

    fn simulate(def: GameDefinition, strategy: Box<dyn Strategy>, terminal: Terminal, mode: SimulationMode) -> SimulationReport {
        Simulation::new(Rc::new(def), strategy, terminal, settings(mode)).unwrap().run()
    }

    /// gold starts at 20; a mine costs 10 and makes 2/s, one allowed.
    fn single_mine() -> GameDefinition {
        GameDefinition::new("single")
            .with_currency(CurrencyDef::new("gold").with_initial_value(20.0))
            .with_element(
                ElementDef::new("mine")
                    .cost("gold", 10.0)
                    .max_count(1)
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 2.0)),
            )
    }

    fn progression() -> GameDefinition {
        GameDefinition::new("progression")
            .with_currency(CurrencyDef::new("gold").with_initial_value(10.0))
            .with_element(
                ElementDef::new("drill")
                    .cost("gold", 10.0)
                    .scaling(CostScaling::exponential(1.15))
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 1.0)),
            )
            .with_element(
                ElementDef::new("foundry")
                    .cost("gold", 200.0)
                    .scaling(CostScaling::exponential(1.2))
                    .requires(Requirement::count("drill", Comparison::Ge, 5.0))
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 10.0)),
            )
            .with_milestone(MilestoneDef::new(
                "five_drills",
                "Own five drills",
                Requirement::count("drill", Comparison::Ge, 5.0),
            ))
            .with_milestone(MilestoneDef::new(
                "first_foundry",
                "Build a foundry",
                Requirement::owns("foundry"),
            ))
            .with_milestone(MilestoneDef::new(
                "thousand",
                "Earn 1000 gold",
                Requirement::total_earned("gold", Comparison::Ge, 1000.0),
            ))
    }

    #[test]
    fn buys_after_first_tick_then_accrues() {
        let def = single_mine();
        let report = simulate(def, Box::new(GreedyCheapest::new()), Terminal::time(10.0), SimulationMode::Tick);
        assert_eq!(report.outcome, RunOutcome::TerminalMet);
        assert_eq!(report.purchases.len(), 1);
        // Bought after the first tick, before any production was applied.
        assert_eq!(report.purchases[0].time, 1.0);
        assert_eq!(report.purchases[0].currencies_after["gold"], 10.0);
        assert_eq!(report.total_time, 10.0);
    }

    #[test]
    fn runtime_level_purchase_and_accrual() {
        let mut rt = GameRuntime::new(Rc::new(single_mine())).unwrap();
        assert!(rt.try_purchase("mine"));
        assert_eq!(rt.state().currency_value("gold"), 10.0);
        rt.tick(10.0);
        assert!((rt.state().currency_value("gold") - 30.0).abs() < 1e-9);
    }

    #[test]
    fn event_jump_buys_immediately() {
        let report = simulate(single_mine(), Box::new(GreedyCheapest::new()), Terminal::time(10.0), SimulationMode::EventJump);
        assert_eq!(report.purchases.len(), 1);
        assert_eq!(report.purchases[0].time, 0.0);
    }

    #[test]
    fn event_jump_detects_stall() {
        let def = GameDefinition::new("stuck")
            .with_currency(CurrencyDef::new("gold"))
            .with_element(ElementDef::new("castle").cost("gold", 1000.0));
        let report = simulate(def, Box::new(GreedyCheapest::new()), Terminal::time(3600.0), SimulationMode::EventJump);
        assert_eq!(report.outcome, RunOutcome::Stalled);
        assert_eq!(report.stalls.len(), 1);
        assert_eq!(report.total_time, 0.0);
    }

    #[test]
    fn stall_terminal_wins_over_stall_outcome() {
        let def = GameDefinition::new("stuck")
            .with_currency(CurrencyDef::new("gold"))
            .with_element(ElementDef::new("castle").cost("gold", 1000.0));
        let terminal = Terminal::Any(vec![Terminal::time(3600.0), Terminal::stall(600.0)]);
        let report = simulate(def, Box::new(GreedyCheapest::new()), terminal, SimulationMode::EventJump);
        assert_eq!(report.outcome, RunOutcome::TerminalMet);
    }

    #[test]
    fn click_income_breaks_stall_in_event_jump() {
        let def = GameDefinition::new("clicks")
            .with_currency(CurrencyDef::new("gold"))
            .with_click_target(ClickTarget::new("gold", 1.0))
            .with_element(ElementDef::new("castle").cost("gold", 100.0).max_count(1));
        let strategy = GreedyCheapest::new()
            .with_clicks(ClickProfile::new("gold", 5.0).active_during_wait(true));
        let report = simulate(def, Box::new(strategy), Terminal::all_purchased(["castle"]), SimulationMode::EventJump);
        assert_eq!(report.outcome, RunOutcome::TerminalMet);
        assert_eq!(report.purchases.len(), 1);
        assert!((report.purchases[0].time - 20.0).abs() < 1e-9);
        assert!((report.dead_time_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tick_mode_clicks_each_step() {
        let def = GameDefinition::new("clicks")
            .with_currency(CurrencyDef::new("gold"))
            .with_click_target(ClickTarget::new("gold", 1.0));
        let strategy = GreedyCheapest::new().with_clicks(ClickProfile::new("gold", 3.0));
        let report = simulate(def, Box::new(strategy), Terminal::time(10.0), SimulationMode::Tick);
        let last = report.currency_series("gold").last().copied().unwrap();
        assert_eq!(last, (10.0, 30.0));
    }

    #[test]
    fn milestones_logged_once_in_order() {
        // Greedy keeps buying drills until they cost more than a foundry, so
        // lifetime earnings pass 1000 first.
        let terminal = Terminal::Any(vec![Terminal::milestone("first_foundry"), Terminal::time(3600.0)]);
        let report = simulate(progression(), Box::new(GreedyCheapest::new()), terminal, SimulationMode::Tick);
        assert_eq!(report.outcome, RunOutcome::TerminalMet);
        assert_eq!(report.milestone_order(), vec!["five_drills", "thousand", "first_foundry"]);
        let mut ids = report.milestone_order();
        ids.dedup();
        assert_eq!(ids.len(), report.milestones.len());
    }

    #[test]
    fn tick_and_event_jump_agree_on_milestone_order() {
        let tick = simulate(progression(), Box::new(GreedyCheapest::new()), Terminal::milestone("thousand"), SimulationMode::Tick);
        let jump = simulate(progression(), Box::new(GreedyCheapest::new()), Terminal::milestone("thousand"), SimulationMode::EventJump);
        assert_eq!(tick.outcome, RunOutcome::TerminalMet);
        assert_eq!(jump.outcome, RunOutcome::TerminalMet);
        assert_eq!(tick.milestone_order(), jump.milestone_order());
        assert!(jump.total_wait_time > 0.0);
    }

    #[test]
    fn same_seed_same_report() {
        let def = || {
            GameDefinition::new("random")
                .with_currency(CurrencyDef::new("gold").with_initial_value(5.0))
                .with_element(
                    ElementDef::new("boss")
                        .cost("gold", 1.0)
                        .requires(Requirement::estimated_time(120.0, 30.0, "beat the boss")),
                )
        };
        let a = simulate(def(), Box::new(GreedyCheapest::new()), Terminal::time(400.0), SimulationMode::Tick);
        let b = simulate(def(), Box::new(GreedyCheapest::new()), Terminal::time(400.0), SimulationMode::Tick);
        assert_eq!(a.purchases, b.purchases);
        assert_eq!(a.seed, 42);
        assert!(!a.purchases.is_empty());
    }

    #[test]
    fn non_finite_balance_aborts() {
        let def = GameDefinition::new("boom")
            .with_currency(CurrencyDef::new("gold").with_initial_value(1.0))
            .with_element(ElementDef::new("reactor").effect(EffectDef::constant(
                EffectType::ProductionFlat,
                "gold",
                f64::INFINITY,
            )));
        let report = simulate(def, Box::new(GreedyCheapest::new()), Terminal::time(100.0), SimulationMode::Tick);
        assert_eq!(report.outcome, RunOutcome::NonFinite);
        assert!(report.total_time < 100.0);
    }

    #[test]
    fn event_jump_skips_declined_affordable_elements() {
        let def = GameDefinition::new("declined")
            .with_currency(CurrencyDef::new("gold").with_initial_value(10.0))
            .with_element(
                ElementDef::new("well")
                    .max_count(1)
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 1.0)),
            )
            .with_element(ElementDef::new("trinket").cost("gold", 5.0))
            .with_element(ElementDef::new("castle").cost("gold", 100.0).max_count(1));
        let picky = CustomStrategy::new("NoTrinkets").on_decide(|_, affordable| {
            affordable.iter().filter(|e| e.id != "trinket").map(|e| e.id.clone()).collect()
        });
        let report = simulate(def, Box::new(picky), Terminal::all_purchased(["castle"]), SimulationMode::EventJump);

        assert_eq!(report.outcome, RunOutcome::TerminalMet);
        assert_eq!(report.waits.len(), 1);
        assert!((report.waits[0].duration - 90.0).abs() < 1e-9);
        assert!((report.total_time - 90.0).abs() < 1e-9);
    }

    #[test]
    fn save_for_best_progresses_in_event_jump() {
        let report = simulate(progression(), Box::new(SaveForBest::new()), Terminal::milestone("first_foundry"), SimulationMode::EventJump);
        assert_eq!(report.outcome, RunOutcome::TerminalMet);
        assert!(report.milestone_time("five_drills").is_some());
    }

    #[test]
    fn prestige_is_logged_with_run_duration() {
        use crate::game::definition::{PrestigeLayerDef, ResetScope};
        let def = single_mine()
            .with_currency(CurrencyDef::new("stars").persistent())
            .with_prestige_layer(
                PrestigeLayerDef::new("rebirth", "stars")
                    .reward(|_| 1.0)
                    .requires(Requirement::resource("gold", Comparison::Ge, 40.0))
                    .resets_currencies(ResetScope::AllNonPersistent)
                    .resets_elements(ResetScope::AllNonPersistent),
            );
        let strategy = CustomStrategy::new("rebirther")
            .on_decide(|_, affordable| affordable.iter().map(|e| e.id.clone()).collect())
            .on_prestige(|_, _| true);
        let report = simulate(def, Box::new(strategy), Terminal::time(60.0), SimulationMode::Tick);
        assert!(report.prestiges.len() >= 2);
        let first = &report.prestiges[0];
        assert_eq!(first.run_duration, first.time);
        let second = &report.prestiges[1];
        assert!((second.run_duration - (second.time - first.time)).abs() < 1e-9);
    }

    #[test]
    fn invalid_definition_rejected_at_construction() {
        let def = GameDefinition::new("bad").with_element(ElementDef::new("x").cost("nope", 1.0));
        let err = Simulation::new(Rc::new(def), Box::new(GreedyCheapest::new()), Terminal::time(1.0), settings(SimulationMode::Tick));
        assert!(err.is_err());
    }

    #[test]
    fn mode_parses() {
        assert_eq!("tick".parse::<SimulationMode>().unwrap(), SimulationMode::Tick);
        assert_eq!("event_jump".parse::<SimulationMode>().unwrap(), SimulationMode::EventJump);
        assert!("warp".parse::<SimulationMode>().is_err());
    }
}
