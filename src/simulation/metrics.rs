use serde::Serialize;

use crate::game::cost::CostMap;
use crate::game::state::GameState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencySnapshot {
    pub time: f64,
    pub currency_id: String,
    pub value: f64,
    pub rate: f64,
    pub total_earned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSnapshot {
    pub time: f64,
    pub element_id: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseEvent {
    pub time: f64,
    pub element_id: String,
    pub cost_paid: CostMap,
    pub currencies_after: CostMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneEvent {
    pub time: f64,
    pub milestone_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrestigeEvent {
    pub time: f64,
    pub layer_id: String,
    pub reward_amount: f64,
    /// Seconds since the previous prestige (or the start of the run).
    pub run_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StallEvent {
    pub time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitEvent {
    pub time: f64,
    pub duration: f64,
}

/// Records periodic snapshots and discrete events during a run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    pub snapshot_interval: f64,
    last_snapshot_time: Option<f64>,
    pub currency_snapshots: Vec<CurrencySnapshot>,
    pub element_snapshots: Vec<ElementSnapshot>,
    pub purchases: Vec<PurchaseEvent>,
    pub milestones: Vec<MilestoneEvent>,
    pub prestiges: Vec<PrestigeEvent>,
    pub stalls: Vec<StallEvent>,
    pub waits: Vec<WaitEvent>,
}

impl MetricsCollector {
    pub fn new(snapshot_interval: f64) -> Self {
        MetricsCollector { snapshot_interval, ..Default::default() }
    }

    /// Snapshots every currency and element if at least one interval has
    /// passed since the last snapshot. The first call always snapshots.
    pub fn record_tick(&mut self, state: &GameState) {
        let due = self
            .last_snapshot_time
            .is_none_or(|last| state.time_elapsed - last >= self.snapshot_interval);
        if !due {
            return;
        }
        self.last_snapshot_time = Some(state.time_elapsed);
        for (id, c) in &state.currencies {
            self.currency_snapshots.push(CurrencySnapshot {
                time: state.time_elapsed,
                currency_id: id.clone(),
                value: c.current,
                rate: c.current_rate,
                total_earned: c.total_earned,
            });
        }
        for (id, e) in &state.elements {
            self.element_snapshots.push(ElementSnapshot {
                time: state.time_elapsed,
                element_id: id.clone(),
                count: e.count,
            });
        }
    }

    pub fn record_purchase(&mut self, state: &GameState, element_id: &str, cost_paid: CostMap) {
        self.purchases.push(PurchaseEvent {
            time: state.time_elapsed,
            element_id: element_id.to_string(),
            cost_paid,
            currencies_after: state
                .currencies
                .iter()
                .map(|(id, c)| (id.clone(), c.current))
                .collect(),
        });
    }

    pub fn record_milestone(&mut self, time: f64, milestone_id: &str) {
        self.milestones.push(MilestoneEvent { time, milestone_id: milestone_id.to_string() });
    }

    pub fn record_prestige(&mut self, state: &GameState, layer_id: &str, reward_amount: f64, run_duration: f64) {
        self.prestiges.push(PrestigeEvent {
            time: state.time_elapsed,
            layer_id: layer_id.to_string(),
            reward_amount,
            run_duration,
        });
    }

    pub fn record_stall(&mut self, state: &GameState, duration: f64) {
        self.stalls.push(StallEvent { time: state.time_elapsed, duration });
    }

    pub fn record_wait(&mut self, state: &GameState, duration: f64) {
        self.waits.push(WaitEvent { time: state.time_elapsed, duration });
    }
}
