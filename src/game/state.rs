use serde::Serialize;
use std::collections::BTreeMap;

use crate::game::definition::GameDefinition;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrencyState {
    pub current: f64,
    /// Monotone sum of positive income; never decreases on spending.
    pub total_earned: f64,
    pub current_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElementState {
    pub count: u32,
    pub available: bool,
    pub affordable: bool,
    /// Sticky: once set by an unlock effect it bypasses requirements.
    pub unlocked: bool,
}

/// Mutable state of one game instance.
///
/// Only the runtime holds a mutable reference outside of purchase and
/// milestone callbacks; everything else reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameState {
    pub time_elapsed: f64,
    pub currencies: BTreeMap<String, CurrencyState>,
    pub elements: BTreeMap<String, ElementState>,
    /// Milestone id to the simulated time it was first reached.
    pub milestones_reached: BTreeMap<String, f64>,
    pub prestige_counts: BTreeMap<String, u32>,
    pub run_number: u32,
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            time_elapsed: 0.0,
            currencies: BTreeMap::new(),
            elements: BTreeMap::new(),
            milestones_reached: BTreeMap::new(),
            prestige_counts: BTreeMap::new(),
            run_number: 1,
        }
    }
}

impl GameState {
    /// Fresh state for a definition: currencies at their initial values
    /// (which also count as earned), zero elements, run number 1.
    pub fn new(definition: &GameDefinition) -> Self {
        let mut state = GameState::default();
        for c in definition.currencies() {
            state.currencies.insert(
                c.id.clone(),
                CurrencyState {
                    current: c.initial_value,
                    total_earned: c.initial_value,
                    current_rate: 0.0,
                },
            );
        }
        for e in definition.elements() {
            state.elements.insert(e.id.clone(), ElementState::default());
        }
        for p in definition.prestige_layers() {
            state.prestige_counts.insert(p.id.clone(), 0);
        }
        state
    }

    pub fn currency_value(&self, id: &str) -> f64 {
        self.currencies.get(id).map_or(0.0, |c| c.current)
    }

    pub fn currency_rate(&self, id: &str) -> f64 {
        self.currencies.get(id).map_or(0.0, |c| c.current_rate)
    }

    pub fn total_earned(&self, id: &str) -> f64 {
        self.currencies.get(id).map_or(0.0, |c| c.total_earned)
    }

    pub fn element_count(&self, id: &str) -> u32 {
        self.elements.get(id).map_or(0, |e| e.count)
    }

    pub fn has_milestone(&self, id: &str) -> bool {
        self.milestones_reached.contains_key(id)
    }

    pub fn milestone_time(&self, id: &str) -> Option<f64> {
        self.milestones_reached.get(id).copied()
    }

    pub fn prestige_count(&self, layer: &str) -> u32 {
        self.prestige_counts.get(layer).copied().unwrap_or(0)
    }

    /// Sum of the current rates of every currency.
    pub fn total_rate(&self) -> f64 {
        self.currencies.values().map(|c| c.current_rate).sum()
    }

    /// First currency whose balance is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<&str> {
        self.currencies
            .iter()
            .find(|(_, c)| !c.current.is_finite())
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::definition::{CurrencyDef, ElementDef, PrestigeLayerDef};

    fn definition() -> GameDefinition {
        GameDefinition::new("test")
            .with_currency(CurrencyDef::new("gold").with_initial_value(50.0))
            .with_currency(CurrencyDef::new("gems"))
            .with_element(ElementDef::new("miner").cost("gold", 10.0))
            .with_prestige_layer(PrestigeLayerDef::new("ascend", "gems"))
    }

    #[test]
    fn new_state_seeds_initial_values() {
        let state = GameState::new(&definition());
        assert_eq!(state.currency_value("gold"), 50.0);
        assert_eq!(state.total_earned("gold"), 50.0);
        assert_eq!(state.currency_value("gems"), 0.0);
        assert_eq!(state.element_count("miner"), 0);
        assert_eq!(state.prestige_count("ascend"), 0);
        assert_eq!(state.run_number, 1);
        assert_eq!(state.time_elapsed, 0.0);
    }

    #[test]
    fn unknown_ids_read_as_zero() {
        let state = GameState::new(&definition());
        assert_eq!(state.currency_value("nope"), 0.0);
        assert_eq!(state.element_count("nope"), 0);
        assert!(!state.has_milestone("nope"));
        assert_eq!(state.milestone_time("nope"), None);
    }

    #[test]
    fn non_finite_currency_detected() {
        let mut state = GameState::new(&definition());
        assert_eq!(state.first_non_finite(), None);
        state.currencies.get_mut("gems").unwrap().current = f64::NAN;
        assert_eq!(state.first_non_finite(), Some("gems"));
    }
}
