pub mod cost;
pub mod definition;
pub mod effect;
pub mod requirement;
pub mod state;
pub mod value;

pub use cost::{CostMap, CostScaling};
pub use definition::{
    ClickTarget, CurrencyDef, DefinitionError, ElementDef, GameConfig, GameDefinition,
    MilestoneDef, PrestigeLayerDef, ResetScope,
};
pub use effect::{EffectDef, EffectPhase, EffectType};
pub use requirement::{EstimatedTime, Requirement, SharedRng};
pub use state::{CurrencyState, ElementState, GameState};
pub use value::{Comparison, StateAction, StateFn, Text, Value};
