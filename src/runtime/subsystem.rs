use std::collections::BTreeMap;

use crate::game::state::GameState;

/// An optional game mechanic with its own per-tick update, such as a
/// minigame or a decaying buff. Subsystems run after production and
/// milestone checks each tick, in registration order.
pub trait Subsystem {
    fn name(&self) -> &str;

    fn tick(&mut self, state: &mut GameState, delta: f64);

    /// Currency gained over `duration` seconds if nothing else changes.
    /// Used by callers that want to reason about subsystem income without
    /// running it.
    fn estimate_production(&self, _state: &GameState, _duration: f64) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Grants a fixed amount of one currency per second.
    pub(crate) struct Trickle {
        pub currency: String,
        pub per_second: f64,
    }

    impl Subsystem for Trickle {
        fn name(&self) -> &str {
            "trickle"
        }

        fn tick(&mut self, state: &mut GameState, delta: f64) {
            if let Some(c) = state.currencies.get_mut(&self.currency) {
                let gained = self.per_second * delta;
                c.current += gained;
                c.total_earned += gained;
            }
        }

        fn estimate_production(&self, _state: &GameState, duration: f64) -> BTreeMap<String, f64> {
            BTreeMap::from([(self.currency.clone(), self.per_second * duration)])
        }
    }

    #[test]
    fn trickle_adds_income() {
        let mut state = GameState::default();
        state.currencies.entry("gold".into()).or_default();
        let mut t = Trickle { currency: "gold".into(), per_second: 2.0 };
        t.tick(&mut state, 3.0);
        assert_eq!(state.currency_value("gold"), 6.0);
        assert_eq!(t.estimate_production(&state, 5.0)["gold"], 10.0);
    }
}
