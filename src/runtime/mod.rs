//! Authoritative game logic. A [`GameRuntime`] owns the [`GameState`] of one
//! game instance and is the only thing that mutates it.

pub mod pipeline;
pub mod prestige;
pub mod subsystem;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::{debug, trace};

use crate::game::cost::{self, CostMap};
use crate::game::definition::{CurrencyDef, DefinitionError, ElementDef, GameDefinition};
use crate::game::effect::{EffectDef, EffectPhase, EffectType};
use crate::game::state::GameState;

pub use pipeline::{ProductionPipeline, ResolvedEffect};
pub use prestige::PrestigeResult;
pub use subsystem::Subsystem;

/// Read-only snapshot of one element as offered to strategies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementStatus {
    pub id: String,
    pub display_name: String,
    pub count: u32,
    pub available: bool,
    pub affordable: bool,
    pub current_cost: CostMap,
    pub max_count: Option<u32>,
    pub category: String,
    pub tags: BTreeSet<String>,
}

impl ElementStatus {
    /// Unweighted sum of every currency in the cost.
    pub fn total_cost(&self) -> f64 {
        self.current_cost.values().sum()
    }
}

/// Everything needed to undo one speculative purchase exactly.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub element_id: String,
    pub cost_paid: CostMap,
    prior_state: GameState,
    prior_rates_dirty: bool,
}

pub struct GameRuntime {
    definition: Rc<GameDefinition>,
    state: GameState,
    pipeline: ProductionPipeline,
    rates_dirty: bool,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl GameRuntime {
    /// Validates the definition and builds a fresh state. Element
    /// availability is computed immediately so purchases work before the
    /// first tick.
    pub fn new(definition: Rc<GameDefinition>) -> Result<Self, DefinitionError> {
        definition.validate()?;
        let state = GameState::new(&definition);
        let mut runtime = GameRuntime {
            definition,
            state,
            pipeline: ProductionPipeline::default(),
            rates_dirty: true,
            subsystems: Vec::new(),
        };
        runtime.update_element_statuses();
        Ok(runtime)
    }

    pub fn definition(&self) -> &GameDefinition {
        &self.definition
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    // Core loop

    /// Advances the game by `delta` seconds: production, auto-clicks, time,
    /// element statuses, milestones, then subsystems.
    pub fn tick(&mut self, delta: f64) {
        self.refresh_rates();
        let definition = Rc::clone(&self.definition);

        for cdef in definition.currencies() {
            let Some(cs) = self.state.currencies.get_mut(&cdef.id) else {
                continue;
            };
            if cs.current_rate == 0.0 {
                continue;
            }
            let earned = cs.current_rate * delta;
            cs.current += earned;
            if earned > 0.0 {
                cs.total_earned += earned;
            }
            self.clamp_to_cap(&cdef.id);
        }

        self.process_auto_clicks(delta);

        self.state.time_elapsed += delta;
        self.update_element_statuses();
        self.check_milestones();

        for sub in self.subsystems.iter_mut() {
            sub.tick(&mut self.state, delta);
        }
    }

    /// Recomputes every currency rate if a purchase or reset invalidated them.
    pub fn refresh_rates(&mut self) {
        if self.rates_dirty {
            self.recompute_rates();
            self.rates_dirty = false;
        }
    }

    // Player actions

    pub fn try_purchase(&mut self, element_id: &str) -> bool {
        self.purchase(element_id).is_some()
    }

    /// Buys one unit and returns the cost paid, or `None` if the element is
    /// unknown, at its max count, unavailable, blocked by a purchase
    /// requirement or unaffordable. A failed attempt changes nothing.
    pub fn purchase(&mut self, element_id: &str) -> Option<CostMap> {
        let cost = self.apply_purchase(element_id)?;
        debug!(
            element = element_id,
            count = self.state.element_count(element_id),
            time = self.state.time_elapsed,
            "Purchased element"
        );
        Some(cost)
    }

    fn apply_purchase(&mut self, element_id: &str) -> Option<CostMap> {
        let definition = Rc::clone(&self.definition);
        let edef = definition.element(element_id)?;
        let es = self.state.elements.get(element_id)?;

        if edef.max_count.is_some_and(|max| es.count >= max) {
            return None;
        }
        if !es.available && !es.unlocked {
            return None;
        }
        if !edef.purchase_requirements.iter().all(|r| r.evaluate(&self.state)) {
            return None;
        }

        let cost = self.cost_of(edef);
        if cost.iter().any(|(cid, amount)| self.state.currency_value(cid) < *amount) {
            return None;
        }

        for (cid, amount) in &cost {
            if let Some(cs) = self.state.currencies.get_mut(cid) {
                cs.current -= amount;
            }
        }
        if let Some(es) = self.state.elements.get_mut(element_id) {
            es.count += 1;
        }

        for effect in edef.effects.iter().filter(|e| e.phase == EffectPhase::Immediate) {
            self.apply_immediate_effect(effect);
        }
        if let Some(action) = &edef.on_purchase {
            action.call(&mut self.state);
        }

        self.rates_dirty = true;
        self.update_element_statuses();
        Some(cost)
    }

    /// Purchases and refreshes rates, keeping enough to undo the purchase
    /// with [`GameRuntime::reverse_purchase`]. Used to evaluate candidates
    /// without cloning the runtime.
    ///
    /// The element's `on_purchase` action runs here as it would for a real
    /// purchase. Reversal restores [`GameState`] only, so an action with side
    /// effects outside the state (a captured counter, say) is not undone.
    pub fn speculative_purchase(&mut self, element_id: &str) -> Option<PurchaseReceipt> {
        let prior_state = self.state.clone();
        let prior_rates_dirty = self.rates_dirty;
        let cost_paid = self.apply_purchase(element_id)?;
        trace!(element = element_id, "Speculative purchase");
        self.refresh_rates();
        Some(PurchaseReceipt {
            element_id: element_id.to_string(),
            cost_paid,
            prior_state,
            prior_rates_dirty,
        })
    }

    /// Restores the state exactly as it was before the receipt's purchase,
    /// including anything its purchase callback or immediate effects touched.
    pub fn reverse_purchase(&mut self, receipt: PurchaseReceipt) {
        self.state = receipt.prior_state;
        self.rates_dirty = receipt.prior_rates_dirty;
    }

    /// Applies one click to `currency` and returns the amount added. Zero if
    /// the currency has no click target.
    pub fn process_click(&mut self, currency: &str) -> f64 {
        let Some(value) = self.click_value(currency) else {
            return 0.0;
        };
        if let Some(cs) = self.state.currencies.get_mut(currency) {
            cs.current += value;
            cs.total_earned += value;
        }
        self.clamp_to_cap(currency);
        value
    }

    /// Applies `clicks` clicks in one step at the base click value, the way
    /// auto-clickers accrue. Used when simulated time jumps.
    pub fn apply_bulk_clicks(&mut self, currency: &str, clicks: u64) -> f64 {
        let Some(ct) = self.definition.click_target(currency) else {
            return 0.0;
        };
        let value = ct.base_value * clicks as f64;
        if let Some(cs) = self.state.currencies.get_mut(currency) {
            cs.current += value;
            cs.total_earned += value;
        }
        value
    }

    // Queries

    /// Elements that are available (or unlocked) and below their max count,
    /// in definition order.
    pub fn available_purchases(&self) -> Vec<ElementStatus> {
        self.definition
            .elements()
            .iter()
            .filter_map(|edef| {
                let es = self.state.elements.get(&edef.id)?;
                if !(es.available || es.unlocked) {
                    return None;
                }
                if edef.max_count.is_some_and(|max| es.count >= max) {
                    return None;
                }
                Some(ElementStatus {
                    id: edef.id.clone(),
                    display_name: edef.display_name.clone(),
                    count: es.count,
                    available: true,
                    affordable: es.affordable,
                    current_cost: self.cost_of(edef),
                    max_count: edef.max_count,
                    category: edef.category.clone(),
                    tags: edef.tags.clone(),
                })
            })
            .collect()
    }

    pub fn affordable_purchases(&self) -> Vec<ElementStatus> {
        self.available_purchases().into_iter().filter(|e| e.affordable).collect()
    }

    /// Price of the next unit including cost modifiers. Empty for unknown ids.
    pub fn compute_current_cost(&self, element_id: &str) -> CostMap {
        self.definition
            .element(element_id)
            .map(|edef| self.cost_of(edef))
            .unwrap_or_default()
    }

    /// Seconds until the element is affordable at current rates; zero if it
    /// already is. `None` if some currency is short and not growing, or the
    /// element is unknown.
    pub fn compute_time_to_afford(&self, element_id: &str) -> Option<f64> {
        self.time_to_afford_with_income(element_id, &BTreeMap::new())
    }

    /// Like [`GameRuntime::compute_time_to_afford`], with extra per-second
    /// income (from clicking) added to the current rates.
    pub fn time_to_afford_with_income(
        &self,
        element_id: &str,
        extra_income: &BTreeMap<String, f64>,
    ) -> Option<f64> {
        let edef = self.definition.element(element_id)?;
        let mut longest: f64 = 0.0;
        for (cid, amount) in self.cost_of(edef) {
            let current = self.state.currency_value(&cid);
            if current >= amount {
                continue;
            }
            let rate = self.state.currency_rate(&cid) + extra_income.get(&cid).copied().unwrap_or(0.0);
            if rate <= 0.0 {
                return None;
            }
            longest = longest.max((amount - current) / rate);
        }
        Some(longest)
    }

    /// Currencies whose visibility requirement (if any) currently holds.
    pub fn visible_currencies(&self) -> Vec<&CurrencyDef> {
        self.definition
            .currencies()
            .iter()
            .filter(|c| c.hidden_until.as_ref().is_none_or(|r| r.evaluate(&self.state)))
            .collect()
    }

    /// Resolves the element's description against the current state.
    pub fn describe_element(&self, element_id: &str) -> Option<String> {
        self.definition
            .element(element_id)
            .map(|e| e.description.resolve(&self.state))
    }

    /// Income over `duration` that registered subsystems expect to produce.
    pub fn estimate_subsystem_production(&self, duration: f64) -> BTreeMap<String, f64> {
        let mut total = BTreeMap::new();
        for sub in &self.subsystems {
            for (cid, amount) in sub.estimate_production(&self.state, duration) {
                *total.entry(cid).or_insert(0.0) += amount;
            }
        }
        total
    }

    // Extension points

    pub fn set_production_pipeline(
        &mut self,
        currency: impl Into<String>,
        f: impl Fn(&str, &[ResolvedEffect], &GameState) -> f64 + 'static,
    ) {
        self.pipeline.set_custom(currency, f);
        self.rates_dirty = true;
    }

    pub fn add_subsystem(&mut self, subsystem: Box<dyn Subsystem>) {
        debug!(subsystem = subsystem.name(), "Registered subsystem");
        self.subsystems.push(subsystem);
    }

    // Internals

    /// Active effects of owned elements, in definition order.
    fn active_effects(&self) -> impl Iterator<Item = &EffectDef> + '_ {
        self.definition
            .elements()
            .iter()
            .filter(|edef| self.state.element_count(&edef.id) > 0)
            .flat_map(|edef| edef.effects.iter())
            .filter(|effect| effect.is_active(&self.state))
    }

    fn recompute_rates(&mut self) {
        let definition = Rc::clone(&self.definition);
        let mut global: Vec<ResolvedEffect> = Vec::new();
        let mut per_currency: BTreeMap<&str, Vec<ResolvedEffect>> = definition
            .currencies()
            .iter()
            .map(|c| (c.id.as_str(), Vec::new()))
            .collect();

        for effect in self.active_effects() {
            if matches!(effect.phase, EffectPhase::Immediate | EffectPhase::Cost) {
                continue;
            }
            let pair = (effect.kind, effect.resolve(&self.state));
            if effect.kind == EffectType::GlobalMult {
                global.push(pair);
            } else if let Some(list) = per_currency.get_mut(effect.target.as_str()) {
                list.push(pair);
            }
        }

        // Definition order, so a custom pipeline sees earlier currencies' new rates.
        for cdef in definition.currencies() {
            let mut effects = per_currency.remove(cdef.id.as_str()).unwrap_or_default();
            effects.extend_from_slice(&global);
            let rate = self.pipeline.compute_rate(&cdef.id, &effects, &self.state);
            if let Some(cs) = self.state.currencies.get_mut(&cdef.id) {
                cs.current_rate = rate;
            }
        }
    }

    fn update_element_statuses(&mut self) {
        let definition = Rc::clone(&self.definition);
        for edef in definition.elements() {
            let Some(es) = self.state.elements.get(&edef.id) else {
                continue;
            };
            let available = es.unlocked || edef.requirements.iter().all(|r| r.evaluate(&self.state));
            let below_max = edef.max_count.is_none_or(|max| es.count < max);
            let affordable = available
                && below_max
                && self
                    .cost_of(edef)
                    .iter()
                    .all(|(cid, amount)| self.state.currency_value(cid) >= *amount);
            if let Some(es) = self.state.elements.get_mut(&edef.id) {
                es.available = available;
                es.affordable = affordable;
            }
        }
    }

    fn check_milestones(&mut self) {
        let definition = Rc::clone(&self.definition);
        for mdef in definition.milestones() {
            if self.state.has_milestone(&mdef.id) || !mdef.trigger.evaluate(&self.state) {
                continue;
            }
            self.state.milestones_reached.insert(mdef.id.clone(), self.state.time_elapsed);
            debug!(milestone = %mdef.id, time = self.state.time_elapsed, "Milestone reached");
            if let Some(action) = &mdef.on_trigger {
                action.call(&mut self.state);
            }
        }
    }

    fn apply_immediate_effect(&mut self, effect: &EffectDef) {
        match effect.kind {
            EffectType::Grant => {
                let amount = effect.resolve(&self.state);
                if let Some(cs) = self.state.currencies.get_mut(&effect.target) {
                    cs.current += amount;
                    if amount > 0.0 {
                        cs.total_earned += amount;
                    }
                }
            }
            EffectType::Unlock => {
                if let Some(es) = self.state.elements.get_mut(&effect.target) {
                    es.unlocked = true;
                    es.available = true;
                }
            }
            _ => {}
        }
    }

    /// Auto-clicks accrue at the base click value and are not clamped to the
    /// currency cap.
    fn process_auto_clicks(&mut self, delta: f64) {
        let definition = Rc::clone(&self.definition);
        for edef in definition.elements() {
            if self.state.element_count(&edef.id) == 0 {
                continue;
            }
            for effect in edef.effects.iter().filter(|e| e.kind == EffectType::AutoClick) {
                if !effect.is_active(&self.state) {
                    continue;
                }
                let clicks = effect.resolve(&self.state) * delta;
                let Some(ct) = definition.click_target(&effect.target) else {
                    continue;
                };
                if let Some(cs) = self.state.currencies.get_mut(&effect.target) {
                    let value = ct.base_value * clicks;
                    cs.current += value;
                    cs.total_earned += value;
                }
            }
        }
    }

    fn click_value(&self, currency: &str) -> Option<f64> {
        let ct = self.definition.click_target(currency)?;
        let effects: Vec<ResolvedEffect> = self
            .active_effects()
            .filter(|e| matches!(e.kind, EffectType::ClickFlat | EffectType::ClickMult))
            .filter(|e| e.target == currency)
            .map(|e| (e.kind, e.resolve(&self.state)))
            .collect();
        Some(self.pipeline.compute_click_value(ct.base_value, &effects))
    }

    /// Effective cap: `(base + sum(cap_flat)) * prod(cap_mult)`.
    fn resolve_cap(&self, currency: &str) -> Option<f64> {
        let base = self.definition.currency(currency)?.cap.as_ref()?.resolve(&self.state);
        let mut flat = 0.0;
        let mut mult = 1.0;
        for effect in self.active_effects().filter(|e| e.target == currency) {
            match effect.kind {
                EffectType::CapFlat => flat += effect.resolve(&self.state),
                EffectType::CapMult => mult *= effect.resolve(&self.state),
                _ => {}
            }
        }
        Some((base + flat) * mult)
    }

    fn clamp_to_cap(&mut self, currency: &str) {
        if let Some(cap) = self.resolve_cap(currency) {
            if let Some(cs) = self.state.currencies.get_mut(currency) {
                if cs.current > cap {
                    cs.current = cap;
                }
            }
        }
    }

    fn cost_multiplier(&self, element_id: &str) -> f64 {
        self.active_effects()
            .filter(|e| e.kind == EffectType::CostMult && e.target == element_id)
            .map(|e| e.resolve(&self.state))
            .product()
    }

    fn cost_of(&self, edef: &ElementDef) -> CostMap {
        let base = edef
            .cost_scaling
            .compute(&edef.base_cost, self.state.element_count(&edef.id));
        let mult = self.cost_multiplier(&edef.id);
        if mult == 1.0 { base } else { cost::scale(&base, mult) }
    }
}
