use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::game::effect::EffectType;
use crate::game::state::GameState;

/// An effect that is active this tick, reduced to its type and resolved value.
pub type ResolvedEffect = (EffectType, f64);

type RateFn = Rc<dyn Fn(&str, &[ResolvedEffect], &GameState) -> f64>;

/// Turns the active effects on a currency into one production rate.
///
/// The default formula is
/// `(sum(flat) * (1 + sum(add_pct)) * prod(mult)) * prod(global)`.
/// A per-currency replacement can be installed for games whose production
/// does not fit that shape; it also receives `custom` phase effects.
#[derive(Clone, Default)]
pub struct ProductionPipeline {
    custom: HashMap<String, RateFn>,
}

impl ProductionPipeline {
    pub fn set_custom(
        &mut self,
        currency: impl Into<String>,
        f: impl Fn(&str, &[ResolvedEffect], &GameState) -> f64 + 'static,
    ) {
        self.custom.insert(currency.into(), Rc::new(f));
    }

    pub fn has_custom(&self, currency: &str) -> bool {
        self.custom.contains_key(currency)
    }

    pub fn compute_rate(&self, currency: &str, effects: &[ResolvedEffect], state: &GameState) -> f64 {
        if let Some(f) = self.custom.get(currency) {
            return f(currency, effects, state);
        }

        let mut flat = 0.0;
        let mut add_pct = 0.0;
        let mut mult = 1.0;
        let mut global = 1.0;
        for &(kind, value) in effects {
            match kind {
                EffectType::ProductionFlat => flat += value,
                EffectType::ProductionAddPct => add_pct += value,
                EffectType::ProductionMult => mult *= value,
                EffectType::GlobalMult => global *= value,
                _ => {}
            }
        }
        flat * (1.0 + add_pct) * mult * global
    }

    /// `(base + sum(flat)) * prod(mult)`
    pub fn compute_click_value(&self, base_value: f64, effects: &[ResolvedEffect]) -> f64 {
        let mut flat = 0.0;
        let mut mult = 1.0;
        for &(kind, value) in effects {
            match kind {
                EffectType::ClickFlat => flat += value,
                EffectType::ClickMult => mult *= value,
                _ => {}
            }
        }
        (base_value + flat) * mult
    }
}

impl fmt::Debug for ProductionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.custom.keys().collect();
        keys.sort();
        f.debug_struct("ProductionPipeline").field("custom", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EffectType::*;

    #[test]
    fn default_formula_composes_all_stages() {
        let p = ProductionPipeline::default();
        let effects = [
            (ProductionFlat, 10.0),
            (ProductionFlat, 5.0),
            (ProductionAddPct, 0.5),
            (ProductionMult, 2.0),
            (GlobalMult, 1.5),
        ];
        let rate = p.compute_rate("gold", &effects, &GameState::default());
        assert!((rate - 15.0 * 1.5 * 2.0 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn no_effects_means_zero_rate() {
        let p = ProductionPipeline::default();
        assert_eq!(p.compute_rate("gold", &[], &GameState::default()), 0.0);
    }

    #[test]
    fn multiplier_without_flat_is_zero() {
        let p = ProductionPipeline::default();
        let rate = p.compute_rate("gold", &[(ProductionMult, 3.0)], &GameState::default());
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn custom_pipeline_replaces_formula() {
        let mut p = ProductionPipeline::default();
        p.set_custom("mana", |_, effects, state| {
            effects.iter().map(|(_, v)| v).sum::<f64>() + state.time_elapsed
        });
        let mut state = GameState::default();
        state.time_elapsed = 1.0;
        let effects = [(ProductionFlat, 2.0), (Custom, 3.0)];
        assert_eq!(p.compute_rate("mana", &effects, &state), 6.0);
        assert!(p.has_custom("mana"));
        assert_eq!(p.compute_rate("gold", &effects, &state), 2.0);
    }

    #[test]
    fn click_value_formula() {
        let p = ProductionPipeline::default();
        let v = p.compute_click_value(1.0, &[(ClickFlat, 2.0), (ClickMult, 3.0), (ClickMult, 2.0)]);
        assert_eq!(v, 18.0);
    }
}
