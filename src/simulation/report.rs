use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::simulation::metrics::{
    CurrencySnapshot, MetricsCollector, MilestoneEvent, PrestigeEvent, PurchaseEvent, StallEvent,
    WaitEvent,
};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    #[serde(rename = "Terminal condition met")]
    TerminalMet,
    #[serde(rename = "Max ticks reached")]
    MaxTicks,
    #[serde(rename = "Max iterations reached")]
    MaxIterations,
    #[serde(rename = "Stall detected")]
    Stalled,
    #[serde(rename = "Aborted: NaN/Inf detected")]
    NonFinite,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunOutcome::TerminalMet => "Terminal condition met",
            RunOutcome::MaxTicks => "Max ticks reached",
            RunOutcome::MaxIterations => "Max iterations reached",
            RunOutcome::Stalled => "Stall detected",
            RunOutcome::NonFinite => "Aborted: NaN/Inf detected",
        })
    }
}

/// Result of one simulation run: raw event logs plus derived pacing
/// statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub game_name: String,
    pub strategy_description: String,
    pub terminal_description: String,
    pub outcome: RunOutcome,
    pub total_time: f64,
    pub seed: u64,

    pub currency_snapshots: Vec<CurrencySnapshot>,
    pub purchases: Vec<PurchaseEvent>,
    pub milestones: Vec<MilestoneEvent>,
    pub prestiges: Vec<PrestigeEvent>,
    pub stalls: Vec<StallEvent>,
    pub waits: Vec<WaitEvent>,

    pub milestone_times: BTreeMap<String, f64>,
    /// Gap before each purchase; the first is measured from t=0.
    pub purchase_gaps: Vec<f64>,
    pub max_purchase_gap: f64,
    pub mean_purchase_gap: f64,
    pub total_wait_time: f64,
    pub dead_time_ratio: f64,
    pub purchases_per_minute: f64,
}

/// Run-level labels that go into a report alongside the collected metrics.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub game_name: String,
    pub strategy_description: String,
    pub terminal_description: String,
    pub outcome: RunOutcome,
    pub total_time: f64,
    pub seed: u64,
}

impl SimulationReport {
    pub fn build(collector: MetricsCollector, run: RunSummary) -> Self {
        let milestone_times = collector
            .milestones
            .iter()
            .map(|m| (m.milestone_id.clone(), m.time))
            .collect();

        let mut times: Vec<f64> = collector.purchases.iter().map(|p| p.time).collect();
        times.sort_by(f64::total_cmp);
        let mut purchase_gaps = Vec::with_capacity(times.len());
        let mut prev = 0.0;
        for t in times {
            purchase_gaps.push(t - prev);
            prev = t;
        }
        let max_purchase_gap = purchase_gaps.iter().copied().fold(0.0, f64::max);
        let mean_purchase_gap = if purchase_gaps.is_empty() {
            0.0
        } else {
            purchase_gaps.iter().sum::<f64>() / purchase_gaps.len() as f64
        };

        let total_wait_time: f64 = collector.waits.iter().map(|w| w.duration).sum();
        let (dead_time_ratio, purchases_per_minute) = if run.total_time > 0.0 {
            (
                total_wait_time / run.total_time,
                collector.purchases.len() as f64 / run.total_time * 60.0,
            )
        } else {
            (0.0, 0.0)
        };

        SimulationReport {
            game_name: run.game_name,
            strategy_description: run.strategy_description,
            terminal_description: run.terminal_description,
            outcome: run.outcome,
            total_time: run.total_time,
            seed: run.seed,
            currency_snapshots: collector.currency_snapshots,
            purchases: collector.purchases,
            milestones: collector.milestones,
            prestiges: collector.prestiges,
            stalls: collector.stalls,
            waits: collector.waits,
            milestone_times,
            purchase_gaps,
            max_purchase_gap,
            mean_purchase_gap,
            total_wait_time,
            dead_time_ratio,
            purchases_per_minute,
        }
    }

    pub fn milestone_time(&self, id: &str) -> Option<f64> {
        self.milestone_times.get(id).copied()
    }

    /// Milestone ids in the order they were reached.
    pub fn milestone_order(&self) -> Vec<&str> {
        self.milestones.iter().map(|m| m.milestone_id.as_str()).collect()
    }

    /// `(time, balance)` samples for one currency.
    pub fn currency_series(&self, currency: &str) -> Vec<(f64, f64)> {
        self.currency_snapshots
            .iter()
            .filter(|s| s.currency_id == currency)
            .map(|s| (s.time, s.value))
            .collect()
    }

    /// `(time, rate)` samples for one currency.
    pub fn rate_series(&self, currency: &str) -> Vec<(f64, f64)> {
        self.currency_snapshots
            .iter()
            .filter(|s| s.currency_id == currency)
            .map(|s| (s.time, s.rate))
            .collect()
    }

    pub fn purchase_count(&self, element_id: &str) -> usize {
        self.purchases.iter().filter(|p| p.element_id == element_id).count()
    }

    /// Gaps between consecutive purchases, counting only purchases made at or
    /// after `after`. Each gap is still measured from the previous purchase.
    pub fn purchase_gaps_after(&self, after: f64) -> Vec<f64> {
        let mut times: Vec<f64> = self.purchases.iter().map(|p| p.time).collect();
        times.sort_by(f64::total_cmp);
        let mut gaps = Vec::new();
        let mut prev = 0.0;
        for t in times {
            if t >= after {
                gaps.push(t - prev);
            }
            prev = t;
        }
        gaps
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::cost::CostMap;
    use crate::game::state::GameState;

    pub(crate) fn report_with(purchase_times: &[f64], waits: &[f64], total_time: f64) -> SimulationReport {
        let mut m = MetricsCollector::new(1.0);
        for &t in purchase_times {
            let state = GameState { time_elapsed: t, ..GameState::default() };
            m.record_purchase(&state, "x", CostMap::new());
        }
        for &d in waits {
            m.record_wait(&GameState::default(), d);
        }
        m.record_milestone(42.0, "first");
        SimulationReport::build(
            m,
            RunSummary {
                game_name: "test".into(),
                strategy_description: "s".into(),
                terminal_description: "t".into(),
                outcome: RunOutcome::TerminalMet,
                total_time,
                seed: 0,
            },
        )
    }

    #[test]
    fn purchase_gaps_start_at_zero() {
        let r = report_with(&[10.0, 30.0, 35.0], &[], 120.0);
        assert_eq!(r.purchase_gaps, vec![10.0, 20.0, 5.0]);
        assert_eq!(r.max_purchase_gap, 20.0);
        assert!((r.mean_purchase_gap - 35.0 / 3.0).abs() < 1e-12);
        assert!((r.purchases_per_minute - 1.5).abs() < 1e-12);
    }

    #[test]
    fn dead_time_ratio_from_waits() {
        let r = report_with(&[], &[30.0, 30.0], 200.0);
        assert!((r.dead_time_ratio - 0.3).abs() < 1e-12);
        assert_eq!(r.total_wait_time, 60.0);
        assert_eq!(r.max_purchase_gap, 0.0);
        assert_eq!(r.mean_purchase_gap, 0.0);
    }

    #[test]
    fn zero_length_run_has_zero_rates() {
        let r = report_with(&[0.0], &[], 0.0);
        assert_eq!(r.dead_time_ratio, 0.0);
        assert_eq!(r.purchases_per_minute, 0.0);
    }

    #[test]
    fn gaps_after_threshold() {
        let r = report_with(&[10.0, 30.0, 100.0], &[], 120.0);
        assert_eq!(r.purchase_gaps_after(20.0), vec![20.0, 70.0]);
        assert!(r.purchase_gaps_after(200.0).is_empty());
    }

    #[test]
    fn milestone_lookup() {
        let r = report_with(&[], &[], 60.0);
        assert_eq!(r.milestone_time("first"), Some(42.0));
        assert_eq!(r.milestone_time("second"), None);
        assert_eq!(r.milestone_order(), vec!["first"]);
    }

    #[test]
    fn outcome_serializes_as_text() {
        assert_eq!(
            serde_json::to_string(&RunOutcome::NonFinite).unwrap(),
            "\"Aborted: NaN/Inf detected\""
        );
        assert_eq!(RunOutcome::Stalled.to_string(), "Stall detected");
    }
}
