use std::fmt;

use crate::game::state::GameState;
use crate::game::value::Comparison;

/// Loop bookkeeping that terminal conditions may read. Only the simulation
/// writes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationContext {
    pub last_purchase_time: f64,
    pub stall_detected: bool,
    pub total_purchases: u64,
}

/// When a simulation run stops.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Time(f64),
    Milestone(String),
    Currency { currency: String, op: Comparison, threshold: f64 },
    /// Every listed element owned at least once.
    AllPurchased(Vec<String>),
    /// No purchase for `max_idle` seconds, or the loop flagged a stall.
    Stall { max_idle: f64 },
    Any(Vec<Terminal>),
    All(Vec<Terminal>),
}

impl Terminal {
    pub fn time(seconds: f64) -> Self {
        Terminal::Time(seconds)
    }

    pub fn milestone(id: impl Into<String>) -> Self {
        Terminal::Milestone(id.into())
    }

    pub fn currency(currency: impl Into<String>, op: Comparison, threshold: f64) -> Self {
        Terminal::Currency { currency: currency.into(), op, threshold }
    }

    pub fn all_purchased<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Terminal::AllPurchased(ids.into_iter().map(Into::into).collect())
    }

    pub fn stall(max_idle: f64) -> Self {
        Terminal::Stall { max_idle }
    }

    pub fn is_met(&self, state: &GameState, context: &SimulationContext) -> bool {
        match self {
            Terminal::Time(seconds) => state.time_elapsed >= *seconds,
            Terminal::Milestone(id) => state.has_milestone(id),
            Terminal::Currency { currency, op, threshold } => {
                op.compare(state.currency_value(currency), *threshold)
            }
            // An empty list would stop every run before it starts.
            Terminal::AllPurchased(ids) => {
                !ids.is_empty() && ids.iter().all(|id| state.element_count(id) >= 1)
            }
            Terminal::Stall { max_idle } => {
                context.stall_detected
                    || state.time_elapsed - context.last_purchase_time >= *max_idle
            }
            Terminal::Any(children) => children.iter().any(|t| t.is_met(state, context)),
            Terminal::All(children) => children.iter().all(|t| t.is_met(state, context)),
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Time(seconds) => write!(f, "time({seconds})"),
            Terminal::Milestone(id) => write!(f, "milestone(\"{id}\")"),
            Terminal::Currency { currency, op, threshold } => {
                write!(f, "currency(\"{currency}\", \"{op}\", {threshold})")
            }
            Terminal::AllPurchased(ids) => write!(f, "all_purchased({})", ids.join(", ")),
            Terminal::Stall { max_idle } => write!(f, "stall({max_idle})"),
            Terminal::Any(children) => write_joined(f, children, " OR "),
            Terminal::All(children) => write_joined(f, children, " AND "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Terminal], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}
