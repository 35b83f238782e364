//! Player models. A strategy decides what to buy, how much to click and when
//! to prestige; the simulation loop carries the decisions out.

use std::collections::{BTreeMap, HashSet};

use crate::game::requirement::Requirement;
use crate::game::state::GameState;
use crate::runtime::{ElementStatus, GameRuntime};

/// Clicks per click-target currency for one step.
pub type ClickPlan = BTreeMap<String, u64>;

/// How often a simulated player clicks.
#[derive(Debug, Clone, Default)]
pub struct ClickProfile {
    /// Currency id to clicks per second.
    pub targets: BTreeMap<String, f64>,
    /// No clicks while this holds.
    pub active_until: Option<Requirement>,
    /// Whether the player keeps clicking while waiting in event-jump mode.
    pub active_during_wait: bool,
}

impl ClickProfile {
    pub fn new(currency: impl Into<String>, cps: f64) -> Self {
        ClickProfile {
            targets: BTreeMap::from([(currency.into(), cps)]),
            active_until: None,
            active_during_wait: false,
        }
    }

    pub fn with_target(mut self, currency: impl Into<String>, cps: f64) -> Self {
        self.targets.insert(currency.into(), cps);
        self
    }

    pub fn active_until(mut self, requirement: Requirement) -> Self {
        self.active_until = Some(requirement);
        self
    }

    pub fn active_during_wait(mut self, active: bool) -> Self {
        self.active_during_wait = active;
        self
    }

    /// `floor(cps * duration)` clicks per target; targets with zero clicks are
    /// omitted.
    pub fn clicks(&self, state: &GameState, duration: f64, is_waiting: bool) -> ClickPlan {
        if self.active_until.as_ref().is_some_and(|r| r.evaluate(state)) {
            return ClickPlan::new();
        }
        if is_waiting && !self.active_during_wait {
            return ClickPlan::new();
        }
        self.targets
            .iter()
            .filter_map(|(currency, cps)| {
                let clicks = (cps * duration).floor();
                (clicks >= 1.0).then(|| (currency.clone(), clicks as u64))
            })
            .collect()
    }

    fn describe(&self) -> String {
        self.targets
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrestigeMode {
    #[default]
    Never,
    /// Trigger every layer as soon as it succeeds.
    FirstOpportunity,
}

pub trait Strategy {
    /// Ordered element ids to attempt this step. `affordable` is in
    /// definition order. Strategies may speculate on `runtime` but must leave
    /// it as they found it.
    fn decide_purchases(&mut self, runtime: &mut GameRuntime, affordable: &[ElementStatus]) -> Vec<String>;

    fn click_profile(&self) -> Option<&ClickProfile> {
        None
    }

    fn get_clicks(&self, state: &GameState, duration: f64, is_waiting: bool) -> ClickPlan {
        self.click_profile()
            .map(|p| p.clicks(state, duration, is_waiting))
            .unwrap_or_default()
    }

    fn should_prestige(&mut self, _state: &GameState, _layer_id: &str) -> bool {
        false
    }

    fn describe(&self) -> String;
}

/// Minimum by `key`, keeping the earliest on ties.
fn cheapest<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let k = key(item);
        if best.is_none_or(|(_, b)| k < b) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}

/// Buys the cheapest affordable element first.
#[derive(Debug, Clone, Default)]
pub struct GreedyCheapest {
    pub click_profile: Option<ClickProfile>,
    pub prestige_mode: PrestigeMode,
    /// Per-currency weight when summing multi-currency costs. Default 1.
    pub cost_weights: BTreeMap<String, f64>,
}

impl GreedyCheapest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clicks(mut self, profile: ClickProfile) -> Self {
        self.click_profile = Some(profile);
        self
    }

    pub fn with_prestige(mut self, mode: PrestigeMode) -> Self {
        self.prestige_mode = mode;
        self
    }

    pub fn with_cost_weight(mut self, currency: impl Into<String>, weight: f64) -> Self {
        self.cost_weights.insert(currency.into(), weight);
        self
    }

    fn weighted_cost(&self, element: &ElementStatus) -> f64 {
        element
            .current_cost
            .iter()
            .map(|(cid, amount)| amount * self.cost_weights.get(cid).copied().unwrap_or(1.0))
            .sum()
    }
}

impl Strategy for GreedyCheapest {
    fn decide_purchases(&mut self, _runtime: &mut GameRuntime, affordable: &[ElementStatus]) -> Vec<String> {
        let mut ranked: Vec<(f64, &ElementStatus)> =
            affordable.iter().map(|e| (self.weighted_cost(e), e)).collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.into_iter().map(|(_, e)| e.id.clone()).collect()
    }

    fn click_profile(&self) -> Option<&ClickProfile> {
        self.click_profile.as_ref()
    }

    fn should_prestige(&mut self, _state: &GameState, _layer_id: &str) -> bool {
        self.prestige_mode == PrestigeMode::FirstOpportunity
    }

    fn describe(&self) -> String {
        match &self.click_profile {
            Some(p) if !p.targets.is_empty() => format!("GreedyCheapest ({} CPS)", p.describe()),
            _ => "GreedyCheapest".to_string(),
        }
    }
}

/// Buys whatever raises total production the most per unit of cost.
///
/// Each candidate is bought speculatively, the new total rate measured, and
/// the purchase reversed.
#[derive(Debug, Clone, Default)]
pub struct GreedyRoi {
    pub click_profile: Option<ClickProfile>,
    pub prestige_mode: PrestigeMode,
}

impl GreedyRoi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clicks(mut self, profile: ClickProfile) -> Self {
        self.click_profile = Some(profile);
        self
    }

    pub fn with_prestige(mut self, mode: PrestigeMode) -> Self {
        self.prestige_mode = mode;
        self
    }
}

impl Strategy for GreedyRoi {
    fn decide_purchases(&mut self, runtime: &mut GameRuntime, affordable: &[ElementStatus]) -> Vec<String> {
        runtime.refresh_rates();
        let base_rate = runtime.state().total_rate();

        let mut scored: Vec<(f64, String)> = Vec::with_capacity(affordable.len());
        for element in affordable {
            let cost = element.total_cost();
            if cost <= 0.0 {
                scored.push((f64::INFINITY, element.id.clone()));
                continue;
            }
            if let Some(receipt) = runtime.speculative_purchase(&element.id) {
                let gained = runtime.state().total_rate() - base_rate;
                runtime.reverse_purchase(receipt);
                scored.push((gained / cost, element.id.clone()));
            }
        }
        // Stable, so equal scores keep definition order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, id)| id).collect()
    }

    fn click_profile(&self) -> Option<&ClickProfile> {
        self.click_profile.as_ref()
    }

    fn should_prestige(&mut self, _state: &GameState, _layer_id: &str) -> bool {
        self.prestige_mode == PrestigeMode::FirstOpportunity
    }

    fn describe(&self) -> String {
        "GreedyROI".to_string()
    }
}

/// Picks the cheapest element it cannot yet afford and buys nothing else
/// until that one is affordable.
#[derive(Debug, Clone, Default)]
pub struct SaveForBest {
    pub click_profile: Option<ClickProfile>,
    saving_for: Option<String>,
}

impl SaveForBest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clicks(mut self, profile: ClickProfile) -> Self {
        self.click_profile = Some(profile);
        self
    }

    pub fn saving_for(&self) -> Option<&str> {
        self.saving_for.as_deref()
    }
}

impl Strategy for SaveForBest {
    fn decide_purchases(&mut self, runtime: &mut GameRuntime, affordable: &[ElementStatus]) -> Vec<String> {
        let available = runtime.available_purchases();

        if let Some(target) = self.saving_for.take() {
            if affordable.iter().any(|e| e.id == target) {
                return vec![target];
            }
            // Keep saving unless the target has left the shop (max count or reset).
            if available.iter().any(|e| e.id == target) {
                self.saving_for = Some(target);
                return Vec::new();
            }
        }

        let unaffordable: Vec<ElementStatus> = available.into_iter().filter(|e| !e.affordable).collect();
        if let Some(next) = cheapest(&unaffordable, ElementStatus::total_cost) {
            self.saving_for = Some(next.id.clone());
            return Vec::new();
        }

        cheapest(affordable, ElementStatus::total_cost)
            .map(|e| vec![e.id.clone()])
            .unwrap_or_default()
    }

    fn click_profile(&self) -> Option<&ClickProfile> {
        self.click_profile.as_ref()
    }

    fn describe(&self) -> String {
        "SaveForBest".to_string()
    }
}

/// Follows a designer-written build order of `(element, target count)`.
/// When no unmet entry is affordable this step, the fallback decides.
pub struct PriorityList {
    pub priorities: Vec<(String, u32)>,
    pub fallback: Option<Box<dyn Strategy>>,
    pub click_profile: Option<ClickProfile>,
}

impl PriorityList {
    pub fn new(priorities: Vec<(String, u32)>) -> Self {
        PriorityList { priorities, fallback: None, click_profile: None }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn Strategy>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_clicks(mut self, profile: ClickProfile) -> Self {
        self.click_profile = Some(profile);
        self
    }
}

impl Strategy for PriorityList {
    fn decide_purchases(&mut self, runtime: &mut GameRuntime, affordable: &[ElementStatus]) -> Vec<String> {
        let affordable_ids: HashSet<&str> = affordable.iter().map(|e| e.id.as_str()).collect();
        let state = runtime.state();
        let next = self
            .priorities
            .iter()
            .find(|(id, target)| state.element_count(id) < *target && affordable_ids.contains(id.as_str()));
        if let Some((id, _)) = next {
            return vec![id.clone()];
        }
        match &mut self.fallback {
            Some(fallback) => fallback.decide_purchases(runtime, affordable),
            None => Vec::new(),
        }
    }

    fn click_profile(&self) -> Option<&ClickProfile> {
        self.click_profile.as_ref()
    }

    fn should_prestige(&mut self, state: &GameState, layer_id: &str) -> bool {
        self.fallback
            .as_mut()
            .is_some_and(|f| f.should_prestige(state, layer_id))
    }

    fn describe(&self) -> String {
        let items = self
            .priorities
            .iter()
            .map(|(id, n)| format!("{id}x{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("PriorityList([{items}])")
    }
}

type DecideFn = Box<dyn FnMut(&GameState, &[ElementStatus]) -> Vec<String>>;
type ClicksFn = Box<dyn Fn(&GameState, f64, bool) -> ClickPlan>;
type PrestigeFn = Box<dyn FnMut(&GameState, &str) -> bool>;

/// Strategy assembled from closures. Missing closures buy nothing, click
/// nothing and never prestige.
pub struct CustomStrategy {
    name: String,
    decide: Option<DecideFn>,
    clicks: Option<ClicksFn>,
    prestige: Option<PrestigeFn>,
}

impl CustomStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        CustomStrategy { name: name.into(), decide: None, clicks: None, prestige: None }
    }

    pub fn on_decide(mut self, f: impl FnMut(&GameState, &[ElementStatus]) -> Vec<String> + 'static) -> Self {
        self.decide = Some(Box::new(f));
        self
    }

    pub fn on_clicks(mut self, f: impl Fn(&GameState, f64, bool) -> ClickPlan + 'static) -> Self {
        self.clicks = Some(Box::new(f));
        self
    }

    pub fn on_prestige(mut self, f: impl FnMut(&GameState, &str) -> bool + 'static) -> Self {
        self.prestige = Some(Box::new(f));
        self
    }
}

impl Strategy for CustomStrategy {
    fn decide_purchases(&mut self, runtime: &mut GameRuntime, affordable: &[ElementStatus]) -> Vec<String> {
        match &mut self.decide {
            Some(f) => f(runtime.state(), affordable),
            None => Vec::new(),
        }
    }

    fn get_clicks(&self, state: &GameState, duration: f64, is_waiting: bool) -> ClickPlan {
        self.clicks
            .as_ref()
            .map(|f| f(state, duration, is_waiting))
            .unwrap_or_default()
    }

    fn should_prestige(&mut self, state: &GameState, layer_id: &str) -> bool {
        self.prestige.as_mut().is_some_and(|f| f(state, layer_id))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::definition::{CurrencyDef, ElementDef, GameDefinition};
    use crate::game::effect::{EffectDef, EffectType};
    use crate::game::value::Comparison;
    use crate::runtime::tests::{mining_game, runtime};

    fn shop() -> GameDefinition {
        GameDefinition::new("shop")
            .with_currency(CurrencyDef::new("gold").with_initial_value(100.0))
            .with_currency(CurrencyDef::new("gems").with_initial_value(100.0))
            .with_element(
                ElementDef::new("cart")
                    .cost("gold", 50.0)
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 1.0)),
            )
            .with_element(
                ElementDef::new("mine")
                    .cost("gold", 20.0)
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 0.1)),
            )
            .with_element(
                ElementDef::new("crystal")
                    .cost("gems", 10.0)
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gems", 0.3)),
            )
            .with_element(ElementDef::new("castle").cost("gold", 5000.0))
    }

    #[test]
    fn click_profile_floors_clicks() {
        let p = ClickProfile::new("gold", 2.5);
        let state = GameState::default();
        assert_eq!(p.clicks(&state, 1.0, false)["gold"], 2);
        assert!(p.clicks(&state, 0.1, false).is_empty());
        assert!(p.clicks(&state, 1.0, true).is_empty());
        let p = p.active_during_wait(true);
        assert_eq!(p.clicks(&state, 10.0, true)["gold"], 25);
    }

    #[test]
    fn click_profile_stops_after_requirement() {
        let p = ClickProfile::new("gold", 5.0).active_until(Requirement::time(Comparison::Ge, 10.0));
        let mut state = GameState::default();
        assert_eq!(p.clicks(&state, 1.0, false)["gold"], 5);
        state.time_elapsed = 10.0;
        assert!(p.clicks(&state, 1.0, false).is_empty());
    }

    #[test]
    fn greedy_cheapest_orders_by_cost() {
        let mut rt = runtime(shop());
        let affordable = rt.affordable_purchases();
        let mut s = GreedyCheapest::new();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["crystal", "mine", "cart"]);
    }

    #[test]
    fn greedy_cheapest_uses_cost_weights() {
        let mut rt = runtime(shop());
        let affordable = rt.affordable_purchases();
        let mut s = GreedyCheapest::new().with_cost_weight("gems", 10.0);
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["mine", "cart", "crystal"]);
    }

    #[test]
    fn greedy_cheapest_describes_clicks() {
        let s = GreedyCheapest::new().with_clicks(ClickProfile::new("gold", 5.0));
        assert_eq!(s.describe(), "GreedyCheapest (gold:5 CPS)");
        assert_eq!(GreedyCheapest::new().describe(), "GreedyCheapest");
    }

    #[test]
    fn greedy_roi_ranks_by_rate_per_cost() {
        let mut rt = runtime(shop());
        let before = rt.state().clone();
        let affordable = rt.affordable_purchases();
        let mut s = GreedyRoi::new();
        // crystal 0.3/10, cart 1/50, mine 0.1/20.
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["crystal", "cart", "mine"]);
        assert_eq!(rt.state(), &before);
    }

    #[test]
    fn save_for_best_waits_for_target() {
        let mut rt = runtime(mining_game());
        let mut s = SaveForBest::new();
        // Nothing out of reach yet, so it buys the cheapest.
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["miner"]);

        // Drain gold so the miner is out of reach.
        while rt.try_purchase("miner") {}
        let affordable = rt.affordable_purchases();
        assert!(s.decide_purchases(&mut rt, &affordable).is_empty());
        assert_eq!(s.saving_for(), Some("miner"));

        while !rt.state().elements["miner"].affordable {
            rt.tick(1.0);
        }
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["miner"]);
        assert_eq!(s.saving_for(), None);
    }

    #[test]
    fn priority_list_follows_order_then_falls_back() {
        let mut rt = runtime(shop());
        let mut s = PriorityList::new(vec![("cart".into(), 1), ("mine".into(), 2)])
            .with_fallback(Box::new(GreedyCheapest::new()));
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["cart"]);
        rt.try_purchase("cart");
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["mine"]);
        rt.try_purchase("mine");
        rt.try_purchase("mine");
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["crystal"]);
        assert_eq!(s.describe(), "PriorityList([cartx1, minex2])");
    }

    #[test]
    fn priority_list_falls_back_while_entry_unaffordable() {
        let mut rt = runtime(shop());
        let mut s = PriorityList::new(vec![("castle".into(), 1)])
            .with_fallback(Box::new(GreedyCheapest::new()));
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable)[0], "crystal");

        let mut bare = PriorityList::new(vec![("castle".into(), 1)]);
        assert!(bare.decide_purchases(&mut rt, &affordable).is_empty());
    }

    #[test]
    fn priority_list_unreachable_target_does_not_block() {
        let mut rt = runtime(mining_game());
        for _ in 0..3 {
            assert!(rt.try_purchase("miner"));
        }
        assert!(rt.try_purchase("doubler"));
        // doubler is capped at 1, so a target of 2 can never be met.
        let mut s = PriorityList::new(vec![("doubler".into(), 2)])
            .with_fallback(Box::new(GreedyCheapest::new()));
        for _ in 0..100 {
            rt.tick(1.0);
        }
        let affordable = rt.affordable_purchases();
        let ids: Vec<&str> = affordable.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["miner"]);
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["miner"]);
    }

    #[test]
    fn custom_strategy_delegates() {
        let mut rt = runtime(shop());
        let mut s = CustomStrategy::new("OnlyMines")
            .on_decide(|_, affordable| {
                affordable.iter().filter(|e| e.id == "mine").map(|e| e.id.clone()).collect()
            })
            .on_clicks(|_, d, _| ClickPlan::from([("gold".to_string(), d as u64)]))
            .on_prestige(|s, _| s.time_elapsed > 5.0);
        let affordable = rt.affordable_purchases();
        assert_eq!(s.decide_purchases(&mut rt, &affordable), vec!["mine"]);
        assert_eq!(s.get_clicks(rt.state(), 3.0, false)["gold"], 3);
        assert!(!s.should_prestige(rt.state(), "any"));
        assert_eq!(s.describe(), "OnlyMines");
        assert!(CustomStrategy::new("idle").decide_purchases(&mut rt, &affordable).is_empty());
    }
}
