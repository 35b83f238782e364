use std::path::Path;
use std::rc::Rc;

use crate::config::game::load_game_file;
use crate::config::simulation::SimulationConfig;
use crate::game::definition::GameDefinition;
use crate::games;
use crate::persistence;
use crate::simulation::monte_carlo::{run_monte_carlo, MonteCarloSummary};
use crate::simulation::pacing::{evaluate_all, PacingBoundResult, Severity};
use crate::simulation::report::SimulationReport;
use crate::simulation::strategy::{ClickProfile, GreedyCheapest, GreedyRoi, SaveForBest, Strategy};
use crate::simulation::terminal::Terminal;
use crate::simulation::{Simulation, SimulationMode};

/// Resolves a game argument: a built-in name, or a path to a TOML game file.
pub fn load_game(game: &str) -> Result<GameDefinition, String> {
    if let Some(def) = games::find_builtin(game) {
        return Ok(def);
    }
    let path = Path::new(game);
    if path.extension().is_some_and(|e| e == "toml") || path.exists() {
        return load_game_file(path).map_err(|e| format!("Failed to load game: {}", e));
    }
    let names: Vec<&str> = games::builtin_games().iter().map(|g| g.name).collect();
    Err(format!(
        "Unknown game '{}'. Built-in games: {}. Or pass a path to a .toml game file",
        game,
        names.join(", ")
    ))
}

/// Builds a named strategy. With `cps > 0` the player clicks `click_target`,
/// or the first click target the game defines, and keeps clicking while
/// waiting in event-jump mode.
pub fn build_strategy(
    name: &str,
    cps: f64,
    click_target: Option<&str>,
    definition: &GameDefinition,
    mode: SimulationMode,
) -> Result<Box<dyn Strategy>, String> {
    let target = click_target
        .map(str::to_string)
        .or_else(|| definition.click_targets().first().map(|c| c.currency.clone()));
    let profile = match target {
        Some(currency) if cps > 0.0 => Some(
            ClickProfile::new(currency, cps).active_during_wait(mode == SimulationMode::EventJump),
        ),
        _ => None,
    };

    let strategy: Box<dyn Strategy> = match name {
        "greedy_cheapest" => Box::new(GreedyCheapest { click_profile: profile, ..Default::default() }),
        "greedy_roi" => Box::new(GreedyRoi { click_profile: profile, ..Default::default() }),
        "save_for_best" => {
            let mut s = SaveForBest::new();
            s.click_profile = profile;
            Box::new(s)
        }
        other => {
            return Err(format!(
                "Unknown strategy '{}'. Expected greedy_cheapest, greedy_roi or save_for_best",
                other
            ));
        }
    };
    Ok(strategy)
}

/// Run one simulation (or a Monte Carlo batch) and print the report.
pub fn simulate(
    game: &str,
    config: &SimulationConfig,
    export_json: Option<&Path>,
) -> Result<(), String> {
    config.validate()?;
    let definition = Rc::new(load_game(game)?);
    let settings = config.settings();
    let terminal = Terminal::time(config.terminal_time);
    let click_target = config.click_target.as_deref();

    // Surface a bad strategy name before running anything.
    let strategy = build_strategy(&config.strategy, config.cps, click_target, &definition, settings.mode)?;

    if config.monte_carlo_runs > 1 {
        let make = || {
            build_strategy(&config.strategy, config.cps, click_target, &definition, settings.mode)
                .unwrap_or_else(|_| Box::new(GreedyCheapest::new()))
        };
        let summary = run_monte_carlo(
            Rc::clone(&definition),
            make,
            &terminal,
            &settings,
            config.monte_carlo_runs,
        )
        .map_err(|e| e.to_string())?;
        println!("{}", format_monte_carlo(&summary));

        if let Some(path) = export_json {
            persistence::save_monte_carlo_json(&summary, path)
                .map_err(|e| format!("Failed to export JSON: {}", e))?;
            eprintln!("JSON exported to {}", path.display());
        }
        return Ok(());
    }

    let report = Simulation::new(Rc::clone(&definition), strategy, terminal, settings)
        .map_err(|e| e.to_string())?
        .run();
    let results = evaluate_all(definition.pacing_bounds(), &report);
    println!("{}", format_text_report(&report, &results));

    if let Some(path) = export_json {
        persistence::save_report_json(&report, &results, path)
            .map_err(|e| format!("Failed to export JSON: {}", e))?;
        eprintln!("JSON exported to {}", path.display());
    }
    Ok(())
}

/// Check a game definition, printing every warning and violation.
pub fn validate(game: &str) -> Result<(), String> {
    let definition = load_game(game)?;
    for warning in definition.warnings() {
        println!("  [WARN] {}", warning);
    }
    let violations = definition.violations();
    if violations.is_empty() {
        println!(
            "{}: OK ({} currencies, {} elements, {} milestones, {} prestige layers)",
            definition.name(),
            definition.currencies().len(),
            definition.elements().len(),
            definition.milestones().len(),
            definition.prestige_layers().len()
        );
        return Ok(());
    }
    for v in &violations {
        println!("  [FAIL] {}", v);
    }
    Err(format!("{}: {} violation(s)", definition.name(), violations.len()))
}

pub fn list_games() {
    for game in games::builtin_games() {
        println!("  {:<12} {}", game.name, game.description);
    }
}

/// Console report: header, milestones, purchase statistics and pacing.
pub fn format_text_report(report: &SimulationReport, pacing: &[PacingBoundResult]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let rule = "=".repeat(40);

    lines.push(format!("{rule} IdleEngine Simulation Report {rule}"));
    lines.push(format!("Game: {}", report.game_name));
    lines.push(format!("Strategy: {}", report.strategy_description));
    lines.push(format!("Terminal: {}", report.terminal_description));
    lines.push(format!("Seed: {}", report.seed));
    lines.push(format!("Result: {} at {:.1}s", report.outcome, report.total_time));
    lines.push(String::new());

    if !report.milestones.is_empty() {
        lines.push("MILESTONES:".to_string());
        for m in &report.milestones {
            lines.push(format!("  * {:.<30} {:.1}s", m.milestone_id, m.time));
        }
        lines.push(String::new());
    }

    lines.push("PURCHASES:".to_string());
    lines.push(format!("  Total: {}", report.purchases.len()));
    lines.push(format!("  Rate: {:.1}/min", report.purchases_per_minute));
    lines.push(format!("  Max gap: {:.1}s", report.max_purchase_gap));
    lines.push(format!("  Mean gap: {:.1}s", report.mean_purchase_gap));
    if report.total_wait_time > 0.0 {
        lines.push(format!("  Dead time: {:.1}%", report.dead_time_ratio * 100.0));
    }
    lines.push(String::new());

    if !pacing.is_empty() {
        lines.push("PACING:".to_string());
        let mut errors = 0;
        let mut warnings = 0;
        for result in pacing {
            if !result.passed {
                match result.severity {
                    Severity::Error => errors += 1,
                    Severity::Warning => warnings += 1,
                }
            }
            let detail = if result.message.is_empty() { &result.description } else { &result.message };
            lines.push(format!("  [{}] {}", result.status(), detail));
        }
        lines.push(String::new());
        lines.push(pacing_summary(errors, warnings));
    }

    lines.join("\n")
}

fn pacing_summary(errors: usize, warnings: usize) -> String {
    if errors == 0 && warnings == 0 {
        return "SUMMARY: All bounds satisfied".to_string();
    }
    let mut parts = Vec::new();
    if errors > 0 {
        parts.push(format!("{errors} error(s)"));
    }
    if warnings > 0 {
        parts.push(format!("{warnings} warning(s)"));
    }
    format!("SUMMARY: {} - NEEDS REBALANCING", parts.join(", "))
}

pub fn format_monte_carlo(summary: &MonteCarloSummary) -> String {
    let mut lines = vec![
        format!("Monte Carlo: {} runs (seeds {}..)", summary.runs, summary.base_seed),
        format!(
            "Total time: mean={:.1}s, min={:.1}s, max={:.1}s, sd={:.1}s",
            summary.total_time.mean, summary.total_time.min, summary.total_time.max, summary.total_time.std_dev
        ),
        format!("Stall rate: {}/{}", summary.stall_runs, summary.runs),
    ];
    for (outcome, count) in &summary.outcomes {
        lines.push(format!("  {}: {}", outcome, count));
    }
    if !summary.milestones.is_empty() {
        lines.push("Milestone times (mean / min / max):".to_string());
        for (id, m) in &summary.milestones {
            lines.push(format!(
                "  {}: {:.1}s / {:.1}s / {:.1}s (reached {}/{})",
                id, m.time.mean, m.time.min, m.time.max, m.reached, summary.runs
            ));
        }
    }
    if !summary.pacing_pass_rates.is_empty() {
        lines.push("Pacing pass rates:".to_string());
        for (description, rate) in &summary.pacing_pass_rates {
            lines.push(format!("  {}: {:.0}%", description, rate * 100.0));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::monte_carlo::summarize;
    use crate::simulation::pacing::PacingBound;
    use crate::simulation::report::tests::report_with;

    #[test]
    fn load_builtin_and_unknown() {
        assert_eq!(load_game("cookie").unwrap().name(), "Cookie Example");
        let err = load_game("chess").unwrap_err();
        assert!(err.contains("Unknown game 'chess'"));
        assert!(err.contains("cookie"));
    }

    #[test]
    fn load_missing_toml_reports_path() {
        let err = load_game("/nonexistent/game.toml").unwrap_err();
        assert!(err.starts_with("Failed to load game: Cannot read"));
    }

    #[test]
    fn strategy_names() {
        let def = games::find_builtin("cookie").unwrap();
        let s = build_strategy("greedy_cheapest", 5.0, None, &def, SimulationMode::Tick).unwrap();
        assert_eq!(s.describe(), "GreedyCheapest (cookies:5 CPS)");
        let s = build_strategy("greedy_roi", 0.0, None, &def, SimulationMode::Tick).unwrap();
        assert_eq!(s.describe(), "GreedyROI");
        assert!(s.click_profile().is_none());
        let s = build_strategy("save_for_best", 2.0, Some("cookies"), &def, SimulationMode::EventJump).unwrap();
        assert!(s.click_profile().unwrap().active_during_wait);
        assert!(build_strategy("random", 0.0, None, &def, SimulationMode::Tick).is_err());
    }

    #[test]
    fn text_report_sections() {
        let report = report_with(&[10.0, 40.0], &[], 60.0);
        let results = evaluate_all(
            &[
                PacingBound::milestone_between("first", 0.0, 60.0),
                PacingBound::milestone_between("first", 0.0, 10.0),
                PacingBound::max_gap_between_purchases(10.0, 0.0),
            ],
            &report,
        );
        let text = format_text_report(&report, &results);
        assert!(text.contains("IdleEngine Simulation Report"));
        assert!(text.contains("Strategy: s"));
        assert!(text.contains("Result: Terminal condition met at 60.0s"));
        assert!(text.contains("  * first"));
        assert!(text.contains("  Total: 2"));
        assert!(text.contains("  [PASS] first: 42.0s [bound: 0-60s] OK"));
        assert!(text.contains("  [FAIL] first: 42.0s [bound: 0-10s] FAIL"));
        assert!(text.contains("  [WARN] Max purchase gap: 30s"));
        assert!(text.ends_with("SUMMARY: 1 error(s), 1 warning(s) - NEEDS REBALANCING"));
    }

    #[test]
    fn text_report_all_pass() {
        let report = report_with(&[], &[], 60.0);
        let results = evaluate_all(&[PacingBound::no_stalls()], &report);
        assert!(format_text_report(&report, &results).ends_with("SUMMARY: All bounds satisfied"));
        assert!(!format_text_report(&report, &[]).contains("PACING:"));
    }

    #[test]
    fn monte_carlo_text() {
        let summary = summarize(5, vec![report_with(&[], &[], 10.0), report_with(&[], &[], 30.0)], &[]);
        let text = format_monte_carlo(&summary);
        assert!(text.starts_with("Monte Carlo: 2 runs (seeds 5..)"));
        assert!(text.contains("mean=20.0s, min=10.0s, max=30.0s"));
        assert!(text.contains("first: 42.0s / 42.0s / 42.0s (reached 2/2)"));
        assert!(text.contains("Stall rate: 0/2"));
    }

    #[test]
    fn validate_reports_violations() {
        assert!(validate("cookie").is_ok());
        let mut tmp = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        use std::io::Write;
        write!(tmp, "name = \"broken\"\n[[elements]]\nid = \"x\"\ncost = {{ nope = 1.0 }}\n").unwrap();
        let err = validate(tmp.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err, "broken: 1 violation(s)");
    }
}
