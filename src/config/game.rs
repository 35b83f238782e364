//! Declarative game files.
//!
//! A TOML game file lists currencies, elements, milestones, prestige layers,
//! click targets and pacing bounds. Only data-expressible behavior is
//! supported: values are literals or scale with an element count, and
//! prestige rewards come from a fixed set of formulas. Games that need
//! arbitrary closures are built in code instead.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::game::cost::CostScaling;
use crate::game::definition::{
    ClickTarget, CurrencyDef, ElementDef, GameDefinition, MilestoneDef, PrestigeLayerDef,
    ResetScope,
};
use crate::game::effect::{EffectDef, EffectPhase, EffectType};
use crate::game::requirement::Requirement;
use crate::game::value::{Comparison, Value};
use crate::simulation::pacing::{PacingBound, Severity};

#[derive(Debug, Error)]
pub enum GameFileError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("{path}:\n{}", .problems.join("\n"))]
    Invalid { path: String, problems: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub name: String,
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    #[serde(default)]
    pub currencies: Vec<CurrencySpec>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub milestones: Vec<MilestoneSpec>,
    #[serde(default)]
    pub prestige_layers: Vec<PrestigeSpec>,
    #[serde(default)]
    pub click_targets: Vec<ClickTargetSpec>,
    #[serde(default)]
    pub pacing_bounds: Vec<PacingBoundSpec>,
}

fn default_tick_rate() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencySpec {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub initial_value: f64,
    pub cap: Option<f64>,
    #[serde(default)]
    pub persistent: bool,
    pub hidden_until: Option<RequirementSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cost: BTreeMap<String, f64>,
    #[serde(default)]
    pub scaling: ScalingSpec,
    pub max_count: Option<u32>,
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub requires: Vec<RequirementSpec>,
    #[serde(default)]
    pub purchase_requires: Vec<RequirementSpec>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingSpec {
    #[default]
    Fixed,
    Exponential { rate: f64 },
    Linear { increment_pct: f64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectSpec {
    #[serde(rename = "type")]
    pub kind: EffectType,
    pub target: String,
    #[serde(default)]
    pub value: f64,
    /// Multiply `value` by the count of this element.
    pub per_count: Option<String>,
    /// Use `value` as the base of `value ^ count(element)`.
    pub per_count_exponential: Option<String>,
    pub phase: Option<EffectPhase>,
    pub condition: Option<RequirementSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequirementSpec {
    Resource { currency: String, op: Comparison, value: f64 },
    TotalEarned { currency: String, op: Comparison, value: f64 },
    Rate { currency: String, op: Comparison, value: f64 },
    Owns { element: String },
    Count { element: String, op: Comparison, value: f64 },
    Milestone { id: String },
    Time { op: Comparison, seconds: f64 },
    EstimatedTime {
        mean: f64,
        #[serde(default)]
        variance: f64,
        #[serde(default)]
        description: String,
    },
    All { of: Vec<RequirementSpec> },
    Any { of: Vec<RequirementSpec> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub trigger: RequirementSpec,
    pub pacing_note: Option<String>,
}

/// `"all_non_persistent"` or an explicit list of ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResetSpec {
    Keyword(String),
    Ids(Vec<String>),
}

impl Default for ResetSpec {
    fn default() -> Self {
        ResetSpec::Ids(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardSpec {
    Fixed { amount: f64 },
    /// `floor((total_earned(currency) / divisor) ^ exponent)`.
    TotalEarnedRoot {
        currency: String,
        #[serde(default = "default_divisor")]
        divisor: f64,
        #[serde(default = "default_exponent")]
        exponent: f64,
    },
}

fn default_divisor() -> f64 {
    1.0
}
fn default_exponent() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrestigeSpec {
    pub id: String,
    pub currency: String,
    pub reward: RewardSpec,
    #[serde(default)]
    pub resets_currencies: ResetSpec,
    #[serde(default)]
    pub resets_elements: ResetSpec,
    #[serde(default)]
    pub requires: Vec<RequirementSpec>,
    #[serde(default)]
    pub minimum_reward: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickTargetSpec {
    pub currency: String,
    #[serde(default = "default_click_value")]
    pub base_value: f64,
}

fn default_click_value() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PacingBoundSpec {
    MilestoneBetween {
        milestone: String,
        min: f64,
        max: f64,
        severity: Option<Severity>,
    },
    MaxGap {
        max: f64,
        #[serde(default)]
        after: f64,
        severity: Option<Severity>,
    },
    NoStalls { severity: Option<Severity> },
    DeadTimeRatio { max: f64, severity: Option<Severity> },
}

impl RequirementSpec {
    pub fn build(&self) -> Requirement {
        match self {
            RequirementSpec::Resource { currency, op, value } => Requirement::resource(currency, *op, *value),
            RequirementSpec::TotalEarned { currency, op, value } => {
                Requirement::total_earned(currency, *op, *value)
            }
            RequirementSpec::Rate { currency, op, value } => Requirement::rate(currency, *op, *value),
            RequirementSpec::Owns { element } => Requirement::owns(element),
            RequirementSpec::Count { element, op, value } => Requirement::count(element, *op, *value),
            RequirementSpec::Milestone { id } => Requirement::milestone(id),
            RequirementSpec::Time { op, seconds } => Requirement::time(*op, *seconds),
            RequirementSpec::EstimatedTime { mean, variance, description } => {
                Requirement::estimated_time(*mean, *variance, description)
            }
            RequirementSpec::All { of } => Requirement::All(of.iter().map(Self::build).collect()),
            RequirementSpec::Any { of } => Requirement::Any(of.iter().map(Self::build).collect()),
        }
    }
}

impl EffectSpec {
    fn build(&self) -> EffectDef {
        let mut effect = match (&self.per_count, &self.per_count_exponential) {
            (Some(source), _) => EffectDef::per_count(self.kind, &self.target, source, self.value),
            (None, Some(source)) => {
                EffectDef::per_count_exponential(self.kind, &self.target, source, self.value)
            }
            (None, None) => EffectDef::constant(self.kind, &self.target, self.value),
        };
        if let Some(phase) = self.phase {
            effect = effect.with_phase(phase);
        }
        if let Some(condition) = &self.condition {
            effect = effect.with_condition(condition.build());
        }
        effect
    }
}

impl ResetSpec {
    fn build(&self, field: &str, errors: &mut Vec<String>) -> ResetScope {
        match self {
            ResetSpec::Ids(ids) => ResetScope::Listed(ids.clone()),
            ResetSpec::Keyword(k) if k == "all_non_persistent" => ResetScope::AllNonPersistent,
            ResetSpec::Keyword(k) => {
                errors.push(format!(
                    "{field} must be a list of ids or \"all_non_persistent\", got '{k}'. \
                     Example: {field} = [\"gold\"]"
                ));
                ResetScope::default()
            }
        }
    }
}

impl RewardSpec {
    fn apply(&self, layer: PrestigeLayerDef) -> PrestigeLayerDef {
        match self.clone() {
            RewardSpec::Fixed { amount } => layer.reward(move |_| amount),
            RewardSpec::TotalEarnedRoot { currency, divisor, exponent } => layer.reward(move |s| {
                (s.total_earned(&currency) / divisor).max(0.0).powf(exponent).floor()
            }),
        }
    }
}

impl PacingBoundSpec {
    fn build(&self) -> PacingBound {
        let (bound, severity) = match self {
            PacingBoundSpec::MilestoneBetween { milestone, min, max, severity } => {
                (PacingBound::milestone_between(milestone, *min, *max), severity)
            }
            PacingBoundSpec::MaxGap { max, after, severity } => {
                (PacingBound::max_gap_between_purchases(*max, *after), severity)
            }
            PacingBoundSpec::NoStalls { severity } => (PacingBound::no_stalls(), severity),
            PacingBoundSpec::DeadTimeRatio { max, severity } => (PacingBound::dead_time_ratio(*max), severity),
        };
        match severity {
            Some(s) => bound.with_severity(*s),
            None => bound,
        }
    }
}

impl GameFile {
    pub fn from_file(path: &Path) -> Result<Self, GameFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| GameFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, GameFileError> {
        let file: GameFile = toml::from_str(content).map_err(|source| GameFileError::Parse {
            path: source_path.display().to_string(),
            source,
        })?;
        let problems = file.validate();
        if problems.is_empty() {
            Ok(file)
        } else {
            Err(GameFileError::Invalid { path: source_path.display().to_string(), problems })
        }
    }

    /// Value-level problems the type system does not catch. Cross-references
    /// are checked later by [`GameDefinition::validate`].
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name must not be empty. Example: name = \"Cookie Clicker\"".to_string());
        }
        for e in &self.elements {
            match e.scaling {
                ScalingSpec::Exponential { rate } if !(rate > 0.0) => errors.push(format!(
                    "elements.{}.scaling.rate must be > 0.0, got {}. Example: scaling = {{ kind = \"exponential\", rate = 1.15 }}",
                    e.id, rate
                )),
                _ => {}
            }
            for (cid, amount) in &e.cost {
                if !(*amount >= 0.0) {
                    errors.push(format!(
                        "elements.{}.cost.{} must be >= 0.0, got {}. Example: cost = {{ {} = 15.0 }}",
                        e.id, cid, amount, cid
                    ));
                }
            }
            for fx in &e.effects {
                if fx.per_count.is_some() && fx.per_count_exponential.is_some() {
                    errors.push(format!(
                        "elements.{}: an effect may set per_count or per_count_exponential, not both. \
                         Example: per_count = \"{}\"",
                        e.id, e.id
                    ));
                }
            }
        }
        for c in &self.click_targets {
            if !(c.base_value > 0.0) {
                errors.push(format!(
                    "click_targets.{}.base_value must be > 0.0, got {}. Example: base_value = 1.0",
                    c.currency, c.base_value
                ));
            }
        }
        for p in &self.prestige_layers {
            for (field, spec) in [("resets_currencies", &p.resets_currencies), ("resets_elements", &p.resets_elements)] {
                spec.build(&format!("prestige_layers.{}.{}", p.id, field), &mut errors);
            }
        }
        errors
    }

    /// Builds the definition. Reset keywords that failed validation fall back
    /// to resetting nothing.
    pub fn to_definition(&self) -> GameDefinition {
        let mut def = GameDefinition::new(&self.name).with_tick_rate(self.tick_rate);

        for c in &self.currencies {
            let mut currency = CurrencyDef::new(&c.id).with_initial_value(c.initial_value);
            if let Some(name) = &c.display_name {
                currency = currency.with_display_name(name);
            }
            if let Some(cap) = c.cap {
                currency = currency.with_cap(Value::Literal(cap));
            }
            if c.persistent {
                currency = currency.persistent();
            }
            if let Some(r) = &c.hidden_until {
                currency = currency.hidden_until(r.build());
            }
            def = def.with_currency(currency);
        }

        for e in &self.elements {
            let mut element = ElementDef::new(&e.id).with_description(e.description.as_str());
            if let Some(name) = &e.display_name {
                element = element.with_display_name(name);
            }
            for (cid, amount) in &e.cost {
                element = element.cost(cid, *amount);
            }
            element = element.scaling(match e.scaling {
                ScalingSpec::Fixed => CostScaling::Fixed,
                ScalingSpec::Exponential { rate } => CostScaling::exponential(rate),
                ScalingSpec::Linear { increment_pct } => CostScaling::linear(increment_pct),
            });
            if let Some(max) = e.max_count {
                element = element.max_count(max);
            }
            for fx in &e.effects {
                element = element.effect(fx.build());
            }
            for r in &e.requires {
                element = element.requires(r.build());
            }
            for r in &e.purchase_requires {
                element = element.purchase_requires(r.build());
            }
            for tag in &e.tags {
                element = element.tag(tag);
            }
            if let Some(category) = &e.category {
                element = element.category(category);
            }
            def = def.with_element(element);
        }

        for m in &self.milestones {
            let mut milestone = MilestoneDef::new(&m.id, &m.description, m.trigger.build());
            if let Some(note) = &m.pacing_note {
                milestone = milestone.pacing_note(note);
            }
            def = def.with_milestone(milestone);
        }

        for p in &self.prestige_layers {
            let mut ignored = Vec::new();
            let mut layer = PrestigeLayerDef::new(&p.id, &p.currency)
                .resets_currencies(p.resets_currencies.build("resets_currencies", &mut ignored))
                .resets_elements(p.resets_elements.build("resets_elements", &mut ignored))
                .minimum_reward(p.minimum_reward);
            layer = p.reward.apply(layer);
            for r in &p.requires {
                layer = layer.requires(r.build());
            }
            def = def.with_prestige_layer(layer);
        }

        for c in &self.click_targets {
            def = def.with_click_target(ClickTarget::new(&c.currency, c.base_value));
        }

        for b in &self.pacing_bounds {
            def = def.with_pacing_bound(b.build());
        }

        def
    }
}

/// Reads, checks and converts a game file in one step.
pub fn load_game_file(path: &Path) -> Result<GameDefinition, GameFileError> {
    Ok(GameFile::from_file(path)?.to_definition())
}
