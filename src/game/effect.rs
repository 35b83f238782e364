use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::requirement::Requirement;
use crate::game::state::GameState;
use crate::game::value::Value;

/// What an effect modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    ProductionFlat,
    ProductionAddPct,
    ProductionMult,
    GlobalMult,
    ClickFlat,
    ClickMult,
    CostMult,
    CapFlat,
    CapMult,
    AutoClick,
    Grant,
    Unlock,
    Custom,
}

/// When an effect is applied during rate, click, cost or cap computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectPhase {
    Base,
    BonusAdd,
    BonusMult,
    Global,
    Click,
    Cost,
    Cap,
    Auto,
    Immediate,
    Custom,
}

impl EffectType {
    pub const ALL: [EffectType; 13] = [
        EffectType::ProductionFlat,
        EffectType::ProductionAddPct,
        EffectType::ProductionMult,
        EffectType::GlobalMult,
        EffectType::ClickFlat,
        EffectType::ClickMult,
        EffectType::CostMult,
        EffectType::CapFlat,
        EffectType::CapMult,
        EffectType::AutoClick,
        EffectType::Grant,
        EffectType::Unlock,
        EffectType::Custom,
    ];

    pub fn default_phase(self) -> EffectPhase {
        match self {
            EffectType::ProductionFlat => EffectPhase::Base,
            EffectType::ProductionAddPct => EffectPhase::BonusAdd,
            EffectType::ProductionMult => EffectPhase::BonusMult,
            EffectType::GlobalMult => EffectPhase::Global,
            EffectType::ClickFlat | EffectType::ClickMult => EffectPhase::Click,
            EffectType::CostMult => EffectPhase::Cost,
            EffectType::CapFlat | EffectType::CapMult => EffectPhase::Cap,
            EffectType::AutoClick => EffectPhase::Auto,
            EffectType::Grant | EffectType::Unlock => EffectPhase::Immediate,
            EffectType::Custom => EffectPhase::Custom,
        }
    }

    /// Multiplies production, so per-unit linear scaling is almost always a
    /// modelling mistake.
    pub fn is_multiplicative(self) -> bool {
        matches!(self, EffectType::ProductionMult | EffectType::GlobalMult)
    }

    /// The target names an element rather than a currency.
    pub fn targets_element(self) -> bool {
        matches!(self, EffectType::CostMult | EffectType::Unlock)
    }

    /// The target must name a currency.
    pub fn targets_currency(self) -> bool {
        !self.targets_element() && !matches!(self, EffectType::GlobalMult | EffectType::Custom)
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectType::ProductionFlat => "production_flat",
            EffectType::ProductionAddPct => "production_add_pct",
            EffectType::ProductionMult => "production_mult",
            EffectType::GlobalMult => "global_mult",
            EffectType::ClickFlat => "click_flat",
            EffectType::ClickMult => "click_mult",
            EffectType::CostMult => "cost_mult",
            EffectType::CapFlat => "cap_flat",
            EffectType::CapMult => "cap_mult",
            EffectType::AutoClick => "auto_click",
            EffectType::Grant => "grant",
            EffectType::Unlock => "unlock",
            EffectType::Custom => "custom",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One effect attached to an element. Active only while the owning element
/// has a count of at least one and the optional condition holds.
#[derive(Debug, Clone)]
pub struct EffectDef {
    pub kind: EffectType,
    pub target: String,
    pub value: Value,
    pub condition: Option<Requirement>,
    pub phase: EffectPhase,
}

impl EffectDef {
    pub fn new(kind: EffectType, target: impl Into<String>, value: impl Into<Value>) -> Self {
        EffectDef {
            kind,
            target: target.into(),
            value: value.into(),
            condition: None,
            phase: kind.default_phase(),
        }
    }

    /// `count(source) * per_unit` applied to `target`.
    pub fn per_count(
        kind: EffectType,
        target: impl Into<String>,
        source: impl Into<String>,
        per_unit: f64,
    ) -> Self {
        EffectDef::new(
            kind,
            target,
            Value::PerCount { element: source.into(), per_unit },
        )
    }

    pub fn constant(kind: EffectType, target: impl Into<String>, value: f64) -> Self {
        EffectDef::new(kind, target, Value::Literal(value))
    }

    /// Bonus to `target` that grows with how many `source` elements are owned.
    pub fn synergy(
        kind: EffectType,
        target: impl Into<String>,
        source: impl Into<String>,
        per_unit: f64,
    ) -> Self {
        EffectDef::per_count(kind, target, source, per_unit)
    }

    /// `base ^ count(source)` applied to `target`.
    pub fn per_count_exponential(
        kind: EffectType,
        target: impl Into<String>,
        source: impl Into<String>,
        base: f64,
    ) -> Self {
        EffectDef::new(
            kind,
            target,
            Value::PerCountExponential { element: source.into(), base },
        )
    }

    pub fn with_condition(mut self, condition: Requirement) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_phase(mut self, phase: EffectPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn is_active(&self, state: &GameState) -> bool {
        self.condition.as_ref().is_none_or(|c| c.evaluate(state))
    }

    pub fn resolve(&self, state: &GameState) -> f64 {
        self.value.resolve(state)
    }
}
