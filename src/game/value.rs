use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::game::state::GameState;

/// A pure function of the current game state.
pub struct StateFn<T>(Rc<dyn Fn(&GameState) -> T>);

impl<T> StateFn<T> {
    pub fn new(f: impl Fn(&GameState) -> T + 'static) -> Self {
        StateFn(Rc::new(f))
    }

    pub fn call(&self, state: &GameState) -> T {
        (self.0)(state)
    }
}

impl<T> Clone for StateFn<T> {
    fn clone(&self) -> Self {
        StateFn(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for StateFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateFn(..)")
    }
}

/// A callback allowed to mutate state (purchase and milestone hooks).
#[derive(Clone)]
pub struct StateAction(Rc<dyn Fn(&mut GameState)>);

impl StateAction {
    pub fn new(f: impl Fn(&mut GameState) + 'static) -> Self {
        StateAction(Rc::new(f))
    }

    pub fn call(&self, state: &mut GameState) {
        (self.0)(state)
    }
}

impl fmt::Debug for StateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateAction(..)")
    }
}

/// A number that is either fixed or derived from state at the point of use.
///
/// Values are resolved every time they are needed and never cached across
/// ticks.
#[derive(Debug, Clone)]
pub enum Value {
    Literal(f64),
    /// `count(element) * per_unit`
    PerCount { element: String, per_unit: f64 },
    /// `base ^ count(element)`
    PerCountExponential { element: String, base: f64 },
    Computed(StateFn<f64>),
}

impl Value {
    pub fn computed(f: impl Fn(&GameState) -> f64 + 'static) -> Self {
        Value::Computed(StateFn::new(f))
    }

    pub fn resolve(&self, state: &GameState) -> f64 {
        match self {
            Value::Literal(v) => *v,
            Value::PerCount { element, per_unit } => {
                f64::from(state.element_count(element)) * per_unit
            }
            Value::PerCountExponential { element, base } => {
                base.powf(f64::from(state.element_count(element)))
            }
            Value::Computed(f) => f.call(state),
        }
    }

    /// True for the linear per-unit helper, which grows additively with count.
    pub fn is_per_unit(&self) -> bool {
        matches!(self, Value::PerCount { .. })
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Literal(v)
    }
}

/// A display string that is either fixed or derived from state.
#[derive(Debug, Clone)]
pub enum Text {
    Literal(String),
    Computed(StateFn<String>),
}

impl Text {
    pub fn computed(f: impl Fn(&GameState) -> String + 'static) -> Self {
        Text::Computed(StateFn::new(f))
    }

    pub fn resolve(&self, state: &GameState) -> String {
        match self {
            Text::Literal(s) => s.clone(),
            Text::Computed(f) => f.call(state),
        }
    }
}

impl Default for Text {
    fn default() -> Self {
        Text::Literal(String::new())
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::Literal(s.to_string())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::Literal(s)
    }
}

/// Comparison operator used by threshold requirements and terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Ge => left >= right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Lt => left < right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">=" => Ok(Comparison::Ge),
            "<=" => Ok(Comparison::Le),
            ">" => Ok(Comparison::Gt),
            "<" => Ok(Comparison::Lt),
            "==" => Ok(Comparison::Eq),
            "!=" => Ok(Comparison::Ne),
            other => Err(format!(
                "Unknown operator '{}'. Expected one of >=, <=, >, <, ==, !=",
                other
            )),
        }
    }
}
