//! Run bookkeeping
//!
//! Counts passed and total cases and derives the success rate and exit code.

use std::time::Duration;

use crate::common::FailureKind;

/// How a single case ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    Failed { kind: FailureKind, message: String },
}

/// Result of one executed case
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub name: String,
    pub outcome: CaseOutcome,
    pub elapsed: Duration,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Passed)
    }

    /// 1 for a pass, 0 for a failure
    pub fn score(&self) -> usize {
        usize::from(self.passed())
    }
}

/// Aggregate counters for one harness invocation
#[derive(Debug, Default)]
pub struct RunSummary {
    total: usize,
    passed: usize,
    reports: Vec<CaseReport>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished case
    pub fn record(&mut self, report: CaseReport) {
        self.total += 1;
        self.passed += report.score();
        self.reports.push(report);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn reports(&self) -> &[CaseReport] {
        &self.reports
    }

    /// Percentage of passed cases; 0 when nothing ran
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total as f64 * 100.0
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// `<passed>/<total> passed (<percent>%)`
    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} passed ({}%)",
            self.passed,
            self.total,
            self.success_rate().round() as u32
        )
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}
