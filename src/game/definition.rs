use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::warn;

use crate::game::cost::{CostMap, CostScaling};
use crate::game::effect::EffectDef;
use crate::game::requirement::Requirement;
use crate::game::state::GameState;
use crate::game::value::{StateAction, StateFn, Text, Value};
use crate::simulation::pacing::PacingBound;

/// Tag that shields a currency or element from prestige resets.
pub const PERSISTENT_TAG: &str = "persistent";

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub name: String,
    /// Nominal ticks per second of the game being modelled. Informational.
    pub tick_rate: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig { name: "Untitled".to_string(), tick_rate: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct CurrencyDef {
    pub id: String,
    pub display_name: String,
    pub initial_value: f64,
    pub cap: Option<Value>,
    pub persistent: bool,
    /// Hidden from player-facing listings until this holds.
    pub hidden_until: Option<Requirement>,
}

impl CurrencyDef {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        CurrencyDef {
            display_name: id.clone(),
            id,
            initial_value: 0.0,
            cap: None,
            persistent: false,
            hidden_until: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_initial_value(mut self, value: f64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn with_cap(mut self, cap: impl Into<Value>) -> Self {
        self.cap = Some(cap.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn hidden_until(mut self, requirement: Requirement) -> Self {
        self.hidden_until = Some(requirement);
        self
    }
}

/// A purchasable thing: generator, upgrade, building or achievement.
#[derive(Debug, Clone)]
pub struct ElementDef {
    pub id: String,
    pub display_name: String,
    pub description: Text,
    pub base_cost: CostMap,
    pub cost_scaling: CostScaling,
    pub max_count: Option<u32>,
    pub effects: Vec<EffectDef>,
    /// Gate visibility. Ignored once the element is unlocked.
    pub requirements: Vec<Requirement>,
    /// Checked only at purchase time.
    pub purchase_requirements: Vec<Requirement>,
    pub on_purchase: Option<StateAction>,
    pub tags: BTreeSet<String>,
    pub category: String,
}

impl ElementDef {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        ElementDef {
            display_name: id.clone(),
            id,
            description: Text::default(),
            base_cost: CostMap::new(),
            cost_scaling: CostScaling::Fixed,
            max_count: None,
            effects: Vec::new(),
            requirements: Vec::new(),
            purchase_requirements: Vec::new(),
            on_purchase: None,
            tags: BTreeSet::new(),
            category: String::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<Text>) -> Self {
        self.description = description.into();
        self
    }

    pub fn cost(mut self, currency: impl Into<String>, amount: f64) -> Self {
        self.base_cost.insert(currency.into(), amount);
        self
    }

    pub fn scaling(mut self, scaling: CostScaling) -> Self {
        self.cost_scaling = scaling;
        self
    }

    pub fn max_count(mut self, max: u32) -> Self {
        self.max_count = Some(max);
        self
    }

    pub fn effect(mut self, effect: EffectDef) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn purchase_requires(mut self, requirement: Requirement) -> Self {
        self.purchase_requirements.push(requirement);
        self
    }

    pub fn on_purchase(mut self, action: StateAction) -> Self {
        self.on_purchase = Some(action);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.tags.contains(PERSISTENT_TAG)
    }
}

#[derive(Debug, Clone)]
pub struct MilestoneDef {
    pub id: String,
    pub description: String,
    pub trigger: Requirement,
    pub on_trigger: Option<StateAction>,
    /// Designer note shown next to the milestone in reports.
    pub pacing_note: Option<String>,
}

impl MilestoneDef {
    pub fn new(id: impl Into<String>, description: impl Into<String>, trigger: Requirement) -> Self {
        MilestoneDef {
            id: id.into(),
            description: description.into(),
            trigger,
            on_trigger: None,
            pacing_note: None,
        }
    }

    pub fn on_trigger(mut self, action: StateAction) -> Self {
        self.on_trigger = Some(action);
        self
    }

    pub fn pacing_note(mut self, note: impl Into<String>) -> Self {
        self.pacing_note = Some(note.into());
        self
    }
}

/// Which currencies or elements a prestige layer resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    Listed(Vec<String>),
    /// Everything not marked persistent.
    AllNonPersistent,
}

impl Default for ResetScope {
    fn default() -> Self {
        ResetScope::Listed(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct PrestigeLayerDef {
    pub id: String,
    pub prestige_currency: String,
    pub reward_formula: Option<StateFn<f64>>,
    pub currencies_reset: ResetScope,
    pub elements_reset: ResetScope,
    pub requirements: Vec<Requirement>,
    pub minimum_reward: f64,
}

impl PrestigeLayerDef {
    pub fn new(id: impl Into<String>, prestige_currency: impl Into<String>) -> Self {
        PrestigeLayerDef {
            id: id.into(),
            prestige_currency: prestige_currency.into(),
            reward_formula: None,
            currencies_reset: ResetScope::default(),
            elements_reset: ResetScope::default(),
            requirements: Vec::new(),
            minimum_reward: 0.0,
        }
    }

    pub fn reward(mut self, formula: impl Fn(&GameState) -> f64 + 'static) -> Self {
        self.reward_formula = Some(StateFn::new(formula));
        self
    }

    pub fn resets_currencies(mut self, scope: ResetScope) -> Self {
        self.currencies_reset = scope;
        self
    }

    pub fn resets_elements(mut self, scope: ResetScope) -> Self {
        self.elements_reset = scope;
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn minimum_reward(mut self, minimum: f64) -> Self {
        self.minimum_reward = minimum;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickTarget {
    pub currency: String,
    pub base_value: f64,
}

impl ClickTarget {
    pub fn new(currency: impl Into<String>, base_value: f64) -> Self {
        ClickTarget { currency: currency.into(), base_value }
    }
}

/// Every structural violation found in a game definition.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid game definition:\n{}", bullet_list(.violations))]
pub struct DefinitionError {
    pub violations: Vec<String>,
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n")
}

/// Immutable declaration of a game. Built once, then shared read-only by
/// runtimes and simulations.
#[derive(Debug, Clone, Default)]
pub struct GameDefinition {
    pub config: GameConfig,
    currencies: Vec<CurrencyDef>,
    elements: Vec<ElementDef>,
    milestones: Vec<MilestoneDef>,
    prestige_layers: Vec<PrestigeLayerDef>,
    click_targets: Vec<ClickTarget>,
    pacing_bounds: Vec<PacingBound>,
    currency_index: HashMap<String, usize>,
    element_index: HashMap<String, usize>,
    milestone_index: HashMap<String, usize>,
    prestige_index: HashMap<String, usize>,
    click_index: HashMap<String, usize>,
}

impl GameDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        GameDefinition {
            config: GameConfig { name: name.into(), ..GameConfig::default() },
            ..GameDefinition::default()
        }
    }

    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.config.tick_rate = tick_rate;
        self
    }

    pub fn with_currency(mut self, currency: CurrencyDef) -> Self {
        self.currency_index.entry(currency.id.clone()).or_insert(self.currencies.len());
        self.currencies.push(currency);
        self
    }

    pub fn with_element(mut self, element: ElementDef) -> Self {
        self.element_index.entry(element.id.clone()).or_insert(self.elements.len());
        self.elements.push(element);
        self
    }

    pub fn with_milestone(mut self, milestone: MilestoneDef) -> Self {
        self.milestone_index.entry(milestone.id.clone()).or_insert(self.milestones.len());
        self.milestones.push(milestone);
        self
    }

    pub fn with_prestige_layer(mut self, layer: PrestigeLayerDef) -> Self {
        self.prestige_index.entry(layer.id.clone()).or_insert(self.prestige_layers.len());
        self.prestige_layers.push(layer);
        self
    }

    pub fn with_click_target(mut self, target: ClickTarget) -> Self {
        self.click_index.entry(target.currency.clone()).or_insert(self.click_targets.len());
        self.click_targets.push(target);
        self
    }

    pub fn with_pacing_bound(mut self, bound: PacingBound) -> Self {
        self.pacing_bounds.push(bound);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn currencies(&self) -> &[CurrencyDef] {
        &self.currencies
    }

    pub fn elements(&self) -> &[ElementDef] {
        &self.elements
    }

    pub fn milestones(&self) -> &[MilestoneDef] {
        &self.milestones
    }

    pub fn prestige_layers(&self) -> &[PrestigeLayerDef] {
        &self.prestige_layers
    }

    pub fn click_targets(&self) -> &[ClickTarget] {
        &self.click_targets
    }

    pub fn pacing_bounds(&self) -> &[PacingBound] {
        &self.pacing_bounds
    }

    pub fn currency(&self, id: &str) -> Option<&CurrencyDef> {
        self.currency_index.get(id).map(|&i| &self.currencies[i])
    }

    pub fn element(&self, id: &str) -> Option<&ElementDef> {
        self.element_index.get(id).map(|&i| &self.elements[i])
    }

    pub fn milestone(&self, id: &str) -> Option<&MilestoneDef> {
        self.milestone_index.get(id).map(|&i| &self.milestones[i])
    }

    pub fn prestige_layer(&self, id: &str) -> Option<&PrestigeLayerDef> {
        self.prestige_index.get(id).map(|&i| &self.prestige_layers[i])
    }

    pub fn click_target(&self, currency: &str) -> Option<&ClickTarget> {
        self.click_index.get(currency).map(|&i| &self.click_targets[i])
    }

    /// Every requirement tree reachable from the definition, used to bind
    /// random sources before a run.
    pub fn requirement_roots(&self) -> impl Iterator<Item = &Requirement> {
        let currencies = self.currencies.iter().filter_map(|c| c.hidden_until.as_ref());
        let elements = self.elements.iter().flat_map(|e| {
            e.requirements
                .iter()
                .chain(e.purchase_requirements.iter())
                .chain(e.effects.iter().filter_map(|fx| fx.condition.as_ref()))
        });
        let milestones = self.milestones.iter().map(|m| &m.trigger);
        let prestige = self.prestige_layers.iter().flat_map(|p| p.requirements.iter());
        currencies.chain(elements).chain(milestones).chain(prestige)
    }

    /// Collects every structural violation.
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();

        duplicates("currency", self.currencies.iter().map(|c| c.id.as_str()), &mut errors);
        duplicates("element", self.elements.iter().map(|e| e.id.as_str()), &mut errors);
        duplicates("milestone", self.milestones.iter().map(|m| m.id.as_str()), &mut errors);
        duplicates(
            "prestige layer",
            self.prestige_layers.iter().map(|p| p.id.as_str()),
            &mut errors,
        );

        for e in &self.elements {
            for cid in e.base_cost.keys() {
                if self.currency(cid).is_none() {
                    errors.push(format!("Element '{}' costs unknown currency '{}'", e.id, cid));
                }
            }
            for fx in &e.effects {
                if fx.kind.targets_currency() && self.currency(&fx.target).is_none() {
                    errors.push(format!(
                        "Element '{}' effect {} targets unknown currency '{}'",
                        e.id, fx.kind, fx.target
                    ));
                }
                if fx.kind.targets_element() && self.element(&fx.target).is_none() {
                    errors.push(format!(
                        "Element '{}' effect {} targets unknown element '{}'",
                        e.id, fx.kind, fx.target
                    ));
                }
            }
        }

        for ct in &self.click_targets {
            if self.currency(&ct.currency).is_none() {
                errors.push(format!("Click target references unknown currency '{}'", ct.currency));
            }
        }

        for p in &self.prestige_layers {
            if self.currency(&p.prestige_currency).is_none() {
                errors.push(format!(
                    "Prestige layer '{}' awards unknown currency '{}'",
                    p.id, p.prestige_currency
                ));
            }
            if let ResetScope::Listed(ids) = &p.currencies_reset {
                for cid in ids.iter().filter(|cid| self.currency(cid).is_none()) {
                    errors.push(format!("Prestige layer '{}' resets unknown currency '{}'", p.id, cid));
                }
            }
            if let ResetScope::Listed(ids) = &p.elements_reset {
                for eid in ids.iter().filter(|eid| self.element(eid).is_none()) {
                    errors.push(format!("Prestige layer '{}' resets unknown element '{}'", p.id, eid));
                }
            }
        }

        errors
    }

    /// Suspicious but legal constructs.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for e in &self.elements {
            for fx in &e.effects {
                if fx.kind.is_multiplicative() && fx.value.is_per_unit() {
                    warnings.push(format!(
                        "Element '{}' uses linear per-count scaling on a {} effect targeting '{}'; \
                         the multiplier grows additively and may collapse to zero at count 0",
                        e.id, fx.kind, fx.target
                    ));
                }
            }
        }
        warnings
    }

    /// Fails with every violation at once; logs warnings.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        for w in self.warnings() {
            warn!(game = %self.config.name, "{}", w);
        }
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(DefinitionError { violations })
        }
    }
}

fn duplicates<'a>(kind: &str, ids: impl Iterator<Item = &'a str>, errors: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            errors.push(format!("Duplicate {} id '{}'", kind, id));
        }
    }
}
