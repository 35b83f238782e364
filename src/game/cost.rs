use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Currency id to amount.
pub type CostMap = BTreeMap<String, f64>;

type CostCurve = Rc<dyn Fn(&CostMap, u32) -> CostMap>;

/// How an element's price grows with the number already owned.
#[derive(Clone, Default)]
pub enum CostScaling {
    #[default]
    Fixed,
    /// `base * growth_rate ^ count`
    Exponential { growth_rate: f64 },
    /// `base * (1 + increment_pct * count)`
    Linear { increment_pct: f64 },
    Custom(CostCurve),
}

impl CostScaling {
    pub fn exponential(growth_rate: f64) -> Self {
        CostScaling::Exponential { growth_rate }
    }

    pub fn linear(increment_pct: f64) -> Self {
        CostScaling::Linear { increment_pct }
    }

    pub fn custom(f: impl Fn(&CostMap, u32) -> CostMap + 'static) -> Self {
        CostScaling::Custom(Rc::new(f))
    }

    /// Price of the next unit when `count` are already owned.
    pub fn compute(&self, base: &CostMap, count: u32) -> CostMap {
        match self {
            CostScaling::Fixed => base.clone(),
            CostScaling::Exponential { growth_rate } => {
                let factor = growth_rate.powf(f64::from(count));
                scale(base, factor)
            }
            CostScaling::Linear { increment_pct } => {
                let factor = 1.0 + increment_pct * f64::from(count);
                scale(base, factor)
            }
            CostScaling::Custom(f) => f(base, count),
        }
    }
}

impl fmt::Debug for CostScaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostScaling::Fixed => f.write_str("Fixed"),
            CostScaling::Exponential { growth_rate } => {
                write!(f, "Exponential({growth_rate})")
            }
            CostScaling::Linear { increment_pct } => write!(f, "Linear({increment_pct})"),
            CostScaling::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Multiplies every entry of a cost map by `factor`.
pub fn scale(cost: &CostMap, factor: f64) -> CostMap {
    cost.iter().map(|(k, v)| (k.clone(), v * factor)).collect()
}
