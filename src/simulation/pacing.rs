use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::simulation::report::SimulationReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

type ReportCheck = Rc<dyn Fn(&SimulationReport) -> bool>;
type ReportDetail = Rc<dyn Fn(&SimulationReport) -> String>;

/// A pass/fail balance check over a finished report.
#[derive(Clone)]
pub struct PacingBound {
    pub description: String,
    pub severity: Severity,
    condition: ReportCheck,
    detail: Option<ReportDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacingBoundResult {
    pub description: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

impl PacingBoundResult {
    /// `PASS`, or `FAIL`/`WARN` depending on severity.
    pub fn status(&self) -> &'static str {
        match (self.passed, self.severity) {
            (true, _) => "PASS",
            (false, Severity::Error) => "FAIL",
            (false, Severity::Warning) => "WARN",
        }
    }
}

impl PacingBound {
    pub fn new(
        description: impl Into<String>,
        severity: Severity,
        condition: impl Fn(&SimulationReport) -> bool + 'static,
    ) -> Self {
        PacingBound {
            description: description.into(),
            severity,
            condition: Rc::new(condition),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Fn(&SimulationReport) -> String + 'static) -> Self {
        self.detail = Some(Rc::new(detail));
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn evaluate(&self, report: &SimulationReport) -> PacingBoundResult {
        PacingBoundResult {
            description: self.description.clone(),
            severity: self.severity,
            passed: (self.condition)(report),
            message: self.detail.as_ref().map(|d| d(report)).unwrap_or_default(),
        }
    }

    /// The milestone is reached within `[min_sec, max_sec]`. Not reaching it
    /// fails.
    pub fn milestone_between(milestone_id: impl Into<String>, min_sec: f64, max_sec: f64) -> Self {
        let id: String = milestone_id.into();
        let description = format!("{id} between {min_sec}-{max_sec}s");
        let check_id = id.clone();
        PacingBound::new(description, Severity::Error, move |r| {
            r.milestone_time(&check_id).is_some_and(|t| (min_sec..=max_sec).contains(&t))
        })
        .with_detail(move |r| match r.milestone_time(&id) {
            None => format!("{id}: not reached [bound: {min_sec}-{max_sec}s]"),
            Some(t) => {
                let status = if (min_sec..=max_sec).contains(&t) { "OK" } else { "FAIL" };
                format!("{id}: {t:.1}s [bound: {min_sec}-{max_sec}s] {status}")
            }
        })
    }

    /// No gap between purchases made after `after_time` exceeds `max_sec`.
    pub fn max_gap_between_purchases(max_sec: f64, after_time: f64) -> Self {
        let max_gap = move |r: &SimulationReport| {
            r.purchase_gaps_after(after_time).into_iter().fold(None, |acc: Option<f64>, g| {
                Some(acc.map_or(g, |a| a.max(g)))
            })
        };
        PacingBound::new(
            format!("Max purchase gap <= {max_sec}s after {after_time}s"),
            Severity::Warning,
            move |r| max_gap(r).is_none_or(|g| g <= max_sec),
        )
        .with_detail(move |r| {
            if r.purchases.is_empty() {
                return "Max purchase gap: N/A (no purchases)".to_string();
            }
            let g = max_gap(r).unwrap_or(0.0);
            format!("Max purchase gap: {g:.0}s (limit: {max_sec:.0}s after {after_time:.0}s)")
        })
    }

    pub fn no_stalls() -> Self {
        PacingBound::new("No stalls detected", Severity::Error, |r| r.stalls.is_empty())
            .with_detail(|r| match r.stalls.len() {
                0 => "No stalls detected".to_string(),
                n => format!("{n} stall(s) detected"),
            })
    }

    /// Share of the run spent waiting stays at or below `max_ratio`.
    pub fn dead_time_ratio(max_ratio: f64) -> Self {
        PacingBound::new(
            format!("Dead time ratio <= {:.0}%", max_ratio * 100.0),
            Severity::Warning,
            move |r| r.dead_time_ratio <= max_ratio,
        )
        .with_detail(move |r| {
            format!("Dead time ratio: {:.2} (limit: {:.2})", r.dead_time_ratio, max_ratio)
        })
    }

    pub fn custom(
        description: impl Into<String>,
        severity: Severity,
        condition: impl Fn(&SimulationReport) -> bool + 'static,
    ) -> Self {
        PacingBound::new(description, severity, condition)
    }
}

impl fmt::Debug for PacingBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacingBound")
            .field("description", &self.description)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// Evaluates every bound against one report.
pub fn evaluate_all(bounds: &[PacingBound], report: &SimulationReport) -> Vec<PacingBoundResult> {
    bounds.iter().map(|b| b.evaluate(report)).collect()
}
