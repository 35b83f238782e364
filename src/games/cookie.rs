use crate::game::cost::CostScaling;
use crate::game::definition::{
    ClickTarget, CurrencyDef, ElementDef, GameDefinition, MilestoneDef, PrestigeLayerDef,
    ResetScope,
};
use crate::game::effect::{EffectDef, EffectType};
use crate::game::requirement::Requirement;
use crate::game::value::{Comparison, Value};
use crate::simulation::pacing::PacingBound;

const COOKIES: &str = "cookies";

fn generator(id: &str, name: &str, base_cost: f64, per_unit: f64) -> ElementDef {
    ElementDef::new(id)
        .with_display_name(name)
        .cost(COOKIES, base_cost)
        .scaling(CostScaling::exponential(1.15))
        .effect(EffectDef::per_count(EffectType::ProductionFlat, COOKIES, id, per_unit))
        .category("generator")
}

/// Small cookie clicker: three generators, a doubler, a grandma/farm synergy
/// and a prestige layer paid in chips.
pub fn define_game() -> GameDefinition {
    GameDefinition::new("Cookie Example")
        .with_tick_rate(10)
        .with_currency(CurrencyDef::new(COOKIES).with_display_name("Cookies"))
        .with_currency(
            CurrencyDef::new("prestige_chips")
                .with_display_name("Prestige Chips")
                .persistent()
                .hidden_until(Requirement::total_earned(COOKIES, Comparison::Ge, 1_000_000.0)),
        )
        .with_element(generator("cursor", "Cursor", 15.0, 0.1))
        .with_element(
            generator("grandma", "Grandma", 100.0, 1.0)
                .requires(Requirement::count("cursor", Comparison::Ge, 1.0)),
        )
        .with_element(
            generator("farm", "Farm", 1100.0, 8.0)
                .requires(Requirement::count("grandma", Comparison::Ge, 1.0)),
        )
        .with_element(
            ElementDef::new("double_cookies")
                .with_display_name("Cookie Doubler")
                .cost(COOKIES, 500.0)
                .max_count(1)
                .effect(EffectDef::constant(EffectType::ProductionMult, COOKIES, 2.0))
                .requires(Requirement::total_earned(COOKIES, Comparison::Ge, 1000.0))
                .tag("upgrade")
                .category("upgrade"),
        )
        .with_element(
            ElementDef::new("grandma_synergy")
                .with_display_name("Grandma's Secret Recipe")
                .cost(COOKIES, 5000.0)
                .max_count(1)
                .effect(EffectDef::new(
                    EffectType::ProductionFlat,
                    COOKIES,
                    Value::computed(|s| {
                        f64::from(s.element_count("grandma")) * f64::from(s.element_count("farm")) * 0.05
                    }),
                ))
                .requires(Requirement::count("grandma", Comparison::Ge, 5.0))
                .requires(Requirement::count("farm", Comparison::Ge, 3.0))
                .tag("upgrade")
                .tag("synergy")
                .category("upgrade"),
        )
        .with_milestone(MilestoneDef::new(
            "first_purchase",
            "First generator bought",
            Requirement::owns("cursor") | Requirement::owns("grandma") | Requirement::owns("farm"),
        ))
        .with_milestone(MilestoneDef::new(
            "hundred_cps",
            "100 cookies/sec",
            Requirement::rate(COOKIES, Comparison::Ge, 100.0),
        ))
        .with_milestone(
            MilestoneDef::new(
                "million_cookies",
                "1M cookies earned",
                Requirement::total_earned(COOKIES, Comparison::Ge, 1_000_000.0),
            )
            .pacing_note("Prestige becomes available here"),
        )
        .with_prestige_layer(
            PrestigeLayerDef::new("prestige", "prestige_chips")
                .reward(|s| (s.total_earned(COOKIES) / 1_000_000.0).floor().sqrt())
                .resets_currencies(ResetScope::Listed(vec![COOKIES.to_string()]))
                .resets_elements(ResetScope::AllNonPersistent)
                .requires(Requirement::total_earned(COOKIES, Comparison::Ge, 1_000_000.0))
                .minimum_reward(1.0),
        )
        .with_click_target(ClickTarget::new(COOKIES, 1.0))
        .with_pacing_bound(PacingBound::milestone_between("first_purchase", 3.0, 20.0))
        .with_pacing_bound(PacingBound::milestone_between("hundred_cps", 120.0, 600.0))
        .with_pacing_bound(PacingBound::milestone_between("million_cookies", 1800.0, 5400.0))
        .with_pacing_bound(PacingBound::max_gap_between_purchases(90.0, 30.0))
        .with_pacing_bound(PacingBound::no_stalls())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::GameRuntime;
    use crate::simulation::pacing::evaluate_all;
    use crate::simulation::report::RunOutcome;
    use crate::simulation::strategy::{ClickProfile, GreedyCheapest};
    use crate::simulation::terminal::Terminal;
    use crate::simulation::{Simulation, SimulationMode, SimulationSettings};
    use std::rc::Rc;

    fn clicking_player() -> Box<GreedyCheapest> {
        Box::new(GreedyCheapest::new().with_clicks(ClickProfile::new(COOKIES, 5.0).active_during_wait(true)))
    }

    fn settings(mode: SimulationMode) -> SimulationSettings {
        SimulationSettings { tick_resolution: 1.0, mode, seed: Some(42) }
    }

    #[test]
    fn validates_without_warnings() {
        let def = define_game();
        assert!(def.validate().is_ok());
        assert!(def.warnings().is_empty());
        assert_eq!(def.config.tick_rate, 10);
    }

    #[test]
    fn chips_hidden_until_first_million() {
        let rt = GameRuntime::new(Rc::new(define_game())).unwrap();
        let visible: Vec<&str> = rt.visible_currencies().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(visible, vec![COOKIES]);
    }

    #[test]
    fn synergy_scales_with_grandmas_and_farms() {
        let def = define_game();
        let synergy = &def.element("grandma_synergy").unwrap().effects[0];
        let mut state = crate::game::state::GameState::new(&def);
        state.elements.get_mut("grandma").unwrap().count = 10;
        state.elements.get_mut("farm").unwrap().count = 4;
        assert!((synergy.resolve(&state) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn clicking_player_progresses_without_stalls() {
        let terminal = Terminal::Any(vec![Terminal::time(7200.0), Terminal::milestone("million_cookies")]);
        let report = Simulation::new(Rc::new(define_game()), clicking_player(), terminal, settings(SimulationMode::Tick))
            .unwrap()
            .run();

        assert_eq!(report.outcome, RunOutcome::TerminalMet);
        assert!(!report.purchases.is_empty());
        let first = report.milestone_time("first_purchase").unwrap();
        assert!((1.0..=60.0).contains(&first), "first_purchase at {first}");
        assert!(report.milestone_time("hundred_cps").is_some());
        assert!(report.stalls.is_empty());
    }

    #[test]
    fn event_jump_reaches_same_early_milestones() {
        let terminal = Terminal::Any(vec![Terminal::time(1800.0), Terminal::milestone("hundred_cps")]);
        let tick = Simulation::new(Rc::new(define_game()), clicking_player(), terminal.clone(), settings(SimulationMode::Tick))
            .unwrap()
            .run();
        let jump = Simulation::new(Rc::new(define_game()), clicking_player(), terminal, settings(SimulationMode::EventJump))
            .unwrap()
            .run();
        assert_eq!(tick.milestone_order(), jump.milestone_order());
        assert!(jump.milestone_time("hundred_cps").is_some());
    }

    #[test]
    fn pacing_results_cover_every_bound() {
        let def = define_game();
        let report = Simulation::new(Rc::new(define_game()), clicking_player(), Terminal::time(600.0), settings(SimulationMode::Tick))
            .unwrap()
            .run();
        let results = evaluate_all(def.pacing_bounds(), &report);
        assert_eq!(results.len(), 5);
        assert!(results[0].passed, "{}", results[0].message);
        assert!(results[4].passed);
    }
}
