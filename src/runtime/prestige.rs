use serde::Serialize;
use std::rc::Rc;
use tracing::info;

use crate::game::definition::{GameDefinition, ResetScope};
use crate::runtime::GameRuntime;

/// Outcome of a prestige attempt. On failure nothing was mutated and
/// `reason` says why; a reward below the minimum is still reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrestigeResult {
    pub success: bool,
    pub reward_amount: f64,
    pub currencies_reset: Vec<String>,
    pub elements_reset: Vec<String>,
    pub reason: String,
}

impl PrestigeResult {
    fn failed(reason: impl Into<String>) -> Self {
        PrestigeResult { reason: reason.into(), ..Default::default() }
    }
}

impl GameRuntime {
    /// Resets the layer's currencies and elements in exchange for its
    /// prestige currency. Persistent currencies and elements survive even
    /// when listed explicitly.
    pub fn trigger_prestige(&mut self, layer_id: &str) -> PrestigeResult {
        let definition = Rc::clone(&self.definition);
        let Some(layer) = definition.prestige_layer(layer_id) else {
            return PrestigeResult::failed("Unknown prestige layer");
        };
        if !layer.requirements.iter().all(|r| r.evaluate(&self.state)) {
            return PrestigeResult::failed("Requirements not met");
        }
        let Some(formula) = &layer.reward_formula else {
            return PrestigeResult::failed("No reward formula");
        };

        let reward = formula.call(&self.state);
        if reward < layer.minimum_reward {
            return PrestigeResult {
                reward_amount: reward,
                ..PrestigeResult::failed(format!(
                    "Reward {:.2} below minimum {:.2}",
                    reward, layer.minimum_reward
                ))
            };
        }

        let currencies = currencies_to_reset(&definition, &layer.currencies_reset);
        let elements = elements_to_reset(&definition, &layer.elements_reset);

        for cid in &currencies {
            let initial = definition.currency(cid).map_or(0.0, |c| c.initial_value);
            if let Some(cs) = self.state.currencies.get_mut(cid) {
                cs.current = initial;
                cs.total_earned = initial;
                cs.current_rate = 0.0;
            }
        }
        for eid in &elements {
            if let Some(es) = self.state.elements.get_mut(eid) {
                es.count = 0;
                es.available = false;
                es.affordable = false;
            }
        }

        if let Some(pcs) = self.state.currencies.get_mut(&layer.prestige_currency) {
            pcs.current += reward;
            pcs.total_earned += reward;
        }
        *self.state.prestige_counts.entry(layer_id.to_string()).or_insert(0) += 1;
        self.state.run_number += 1;

        self.rates_dirty = true;
        self.update_element_statuses();

        info!(
            layer = layer_id,
            reward,
            run = self.state.run_number,
            time = self.state.time_elapsed,
            "Prestige"
        );
        PrestigeResult {
            success: true,
            reward_amount: reward,
            currencies_reset: currencies,
            elements_reset: elements,
            reason: String::new(),
        }
    }
}

fn currencies_to_reset(definition: &GameDefinition, scope: &ResetScope) -> Vec<String> {
    let candidates: Vec<&str> = match scope {
        ResetScope::AllNonPersistent => definition.currencies().iter().map(|c| c.id.as_str()).collect(),
        ResetScope::Listed(ids) => ids.iter().map(String::as_str).collect(),
    };
    candidates
        .into_iter()
        .filter(|id| definition.currency(id).is_some_and(|c| !c.persistent))
        .map(str::to_string)
        .collect()
}

fn elements_to_reset(definition: &GameDefinition, scope: &ResetScope) -> Vec<String> {
    let candidates: Vec<&str> = match scope {
        ResetScope::AllNonPersistent => definition.elements().iter().map(|e| e.id.as_str()).collect(),
        ResetScope::Listed(ids) => ids.iter().map(String::as_str).collect(),
    };
    candidates
        .into_iter()
        .filter(|id| definition.element(id).is_some_and(|e| !e.is_persistent()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::definition::{CurrencyDef, ElementDef, PrestigeLayerDef};
    use crate::game::effect::{EffectDef, EffectType};
    use crate::game::requirement::Requirement;
    use crate::game::value::Comparison;
    use crate::runtime::tests::runtime;

    fn prestige_game(minimum_reward: f64) -> GameDefinition {
        GameDefinition::new("prestige")
            .with_currency(CurrencyDef::new("gold").with_initial_value(1e6))
            .with_currency(CurrencyDef::new("souls").persistent())
            .with_element(
                ElementDef::new("mine")
                    .cost("gold", 100.0)
                    .effect(EffectDef::constant(EffectType::ProductionFlat, "gold", 5.0)),
            )
            .with_element(ElementDef::new("altar").cost("gold", 100.0).tag("persistent"))
            .with_prestige_layer(
                PrestigeLayerDef::new("ascend", "souls")
                    .reward(|s| (s.total_earned("gold") / 1e6).sqrt())
                    .resets_currencies(ResetScope::AllNonPersistent)
                    .resets_elements(ResetScope::AllNonPersistent)
                    .requires(Requirement::total_earned("gold", Comparison::Ge, 1e6))
                    .minimum_reward(minimum_reward),
            )
    }

    #[test]
    fn prestige_resets_and_rewards() {
        let mut rt = runtime(prestige_game(0.0));
        rt.try_purchase("mine");
        rt.try_purchase("altar");
        rt.tick(10.0);

        let result = rt.trigger_prestige("ascend");
        assert!(result.success, "{}", result.reason);
        assert!(result.reward_amount > 1.0);
        assert_eq!(result.currencies_reset, vec!["gold"]);
        assert_eq!(result.elements_reset, vec!["mine"]);

        let s = rt.state();
        assert_eq!(s.currency_value("gold"), 1e6);
        assert_eq!(s.total_earned("gold"), 1e6);
        assert_eq!(s.element_count("mine"), 0);
        assert_eq!(s.element_count("altar"), 1);
        assert_eq!(s.currency_value("souls"), result.reward_amount);
        assert_eq!(s.prestige_count("ascend"), 1);
        assert_eq!(s.run_number, 2);

        rt.tick(1.0);
        assert_eq!(rt.state().currency_rate("gold"), 0.0);
    }

    #[test]
    fn reward_below_minimum_changes_nothing() {
        let mut rt = runtime(prestige_game(1.5));
        let before = rt.state().clone();
        let result = rt.trigger_prestige("ascend");
        assert!(!result.success);
        assert!((result.reward_amount - 1.0).abs() < 1e-12);
        assert_eq!(result.reason, "Reward 1.00 below minimum 1.50");
        assert_eq!(rt.state(), &before);
    }

    #[test]
    fn failure_reasons() {
        let mut rt = runtime(prestige_game(0.0));
        assert_eq!(rt.trigger_prestige("nope").reason, "Unknown prestige layer");

        let def = GameDefinition::new("p")
            .with_currency(CurrencyDef::new("gold"))
            .with_prestige_layer(PrestigeLayerDef::new("a", "gold"))
            .with_prestige_layer(
                PrestigeLayerDef::new("b", "gold").requires(Requirement::time(Comparison::Ge, 99.0)),
            );
        let mut rt = runtime(def);
        assert_eq!(rt.trigger_prestige("a").reason, "No reward formula");
        assert_eq!(rt.trigger_prestige("b").reason, "Requirements not met");
    }

    #[test]
    fn explicitly_listed_persistent_entries_survive() {
        let def = GameDefinition::new("p")
            .with_currency(CurrencyDef::new("gold").with_initial_value(100.0))
            .with_currency(CurrencyDef::new("souls").persistent().with_initial_value(3.0))
            .with_element(ElementDef::new("relic").tag("persistent"))
            .with_prestige_layer(
                PrestigeLayerDef::new("ascend", "souls")
                    .reward(|_| 1.0)
                    .resets_currencies(ResetScope::Listed(vec!["gold".into(), "souls".into()]))
                    .resets_elements(ResetScope::Listed(vec!["relic".into()])),
            );
        let mut rt = runtime(def);
        rt.try_purchase("relic");
        let result = rt.trigger_prestige("ascend");
        assert!(result.success);
        assert_eq!(result.currencies_reset, vec!["gold"]);
        assert!(result.elements_reset.is_empty());
        assert_eq!(rt.state().currency_value("souls"), 4.0);
        assert_eq!(rt.state().element_count("relic"), 1);
    }
}
