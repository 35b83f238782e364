use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use std::cell::{Cell, RefCell};
use std::ops::{BitAnd, BitOr};
use std::rc::Rc;

use crate::game::state::GameState;
use crate::game::value::{Comparison, StateFn};

/// Random source shared by every estimated-time requirement of a run.
pub type SharedRng = Rc<RefCell<ChaCha8Rng>>;

/// A requirement that becomes true after a randomly sampled amount of
/// simulated time, standing in for a skill-based or otherwise unsimulated
/// activity.
///
/// The sample is drawn once, on first evaluation, from a normal distribution
/// with `variance` used as the standard deviation, clamped to be non-negative.
#[derive(Debug, Clone)]
pub struct EstimatedTime {
    pub mean: f64,
    pub variance: f64,
    pub description: String,
    sampled: Cell<Option<f64>>,
    rng: RefCell<Option<SharedRng>>,
}

impl EstimatedTime {
    pub fn new(mean: f64, variance: f64, description: impl Into<String>) -> Self {
        EstimatedTime {
            mean,
            variance,
            description: description.into(),
            sampled: Cell::new(None),
            rng: RefCell::new(None),
        }
    }

    /// Binds the random source and forgets any earlier sample.
    pub fn inject_rng(&self, rng: &SharedRng) {
        *self.rng.borrow_mut() = Some(Rc::clone(rng));
        self.sampled.set(None);
    }

    pub fn sampled_time(&self) -> Option<f64> {
        self.sampled.get()
    }

    pub fn reset(&self) {
        self.sampled.set(None);
    }

    fn draw(&self) -> f64 {
        if self.variance <= 0.0 {
            return self.mean.max(0.0);
        }
        let normal = match Normal::new(self.mean, self.variance) {
            Ok(n) => n,
            Err(_) => return self.mean.max(0.0),
        };
        let t = match self.rng.borrow().as_ref() {
            Some(rng) => rng.borrow_mut().sample(normal),
            None => rand::thread_rng().sample(normal),
        };
        t.max(0.0)
    }

    fn evaluate(&self, state: &GameState) -> bool {
        let threshold = match self.sampled.get() {
            Some(t) => t,
            None => {
                let t = self.draw();
                self.sampled.set(Some(t));
                t
            }
        };
        state.time_elapsed >= threshold
    }
}

/// A composable predicate over game state.
///
/// Leaves test one quantity; `All` and `Any` combine children. An empty `All`
/// is vacuously true and an empty `Any` is false.
#[derive(Debug, Clone)]
pub enum Requirement {
    Resource { currency: String, op: Comparison, threshold: f64 },
    TotalEarned { currency: String, op: Comparison, threshold: f64 },
    Rate { currency: String, op: Comparison, threshold: f64 },
    Owns(String),
    Count { element: String, op: Comparison, threshold: f64 },
    Milestone(String),
    Time { op: Comparison, seconds: f64 },
    EstimatedTime(EstimatedTime),
    All(Vec<Requirement>),
    Any(Vec<Requirement>),
    Custom(StateFn<bool>),
}

impl Requirement {
    pub fn resource(currency: impl Into<String>, op: Comparison, threshold: f64) -> Self {
        Requirement::Resource { currency: currency.into(), op, threshold }
    }

    pub fn total_earned(currency: impl Into<String>, op: Comparison, threshold: f64) -> Self {
        Requirement::TotalEarned { currency: currency.into(), op, threshold }
    }

    pub fn rate(currency: impl Into<String>, op: Comparison, threshold: f64) -> Self {
        Requirement::Rate { currency: currency.into(), op, threshold }
    }

    pub fn owns(element: impl Into<String>) -> Self {
        Requirement::Owns(element.into())
    }

    pub fn count(element: impl Into<String>, op: Comparison, threshold: f64) -> Self {
        Requirement::Count { element: element.into(), op, threshold }
    }

    pub fn milestone(id: impl Into<String>) -> Self {
        Requirement::Milestone(id.into())
    }

    pub fn time(op: Comparison, seconds: f64) -> Self {
        Requirement::Time { op, seconds }
    }

    pub fn estimated_time(mean: f64, variance: f64, description: impl Into<String>) -> Self {
        Requirement::EstimatedTime(EstimatedTime::new(mean, variance, description))
    }

    pub fn custom(f: impl Fn(&GameState) -> bool + 'static) -> Self {
        Requirement::Custom(StateFn::new(f))
    }

    pub fn evaluate(&self, state: &GameState) -> bool {
        match self {
            Requirement::Resource { currency, op, threshold } => {
                op.compare(state.currency_value(currency), *threshold)
            }
            Requirement::TotalEarned { currency, op, threshold } => {
                op.compare(state.total_earned(currency), *threshold)
            }
            Requirement::Rate { currency, op, threshold } => {
                op.compare(state.currency_rate(currency), *threshold)
            }
            Requirement::Owns(element) => state.element_count(element) >= 1,
            Requirement::Count { element, op, threshold } => {
                op.compare(f64::from(state.element_count(element)), *threshold)
            }
            Requirement::Milestone(id) => state.has_milestone(id),
            Requirement::Time { op, seconds } => op.compare(state.time_elapsed, *seconds),
            Requirement::EstimatedTime(est) => est.evaluate(state),
            Requirement::All(children) => children.iter().all(|r| r.evaluate(state)),
            Requirement::Any(children) => children.iter().any(|r| r.evaluate(state)),
            Requirement::Custom(f) => f.call(state),
        }
    }

    /// Binds `rng` to every estimated-time leaf in this tree, clearing any
    /// memoized samples.
    pub fn inject_rng(&self, rng: &SharedRng) {
        match self {
            Requirement::EstimatedTime(est) => est.inject_rng(rng),
            Requirement::All(children) | Requirement::Any(children) => {
                for child in children {
                    child.inject_rng(rng);
                }
            }
            _ => {}
        }
    }
}

impl BitAnd for Requirement {
    type Output = Requirement;

    fn bitand(self, rhs: Requirement) -> Requirement {
        Requirement::All(vec![self, rhs])
    }
}

impl BitOr for Requirement {
    type Output = Requirement;

    fn bitor(self, rhs: Requirement) -> Requirement {
        Requirement::Any(vec![self, rhs])
    }
}
