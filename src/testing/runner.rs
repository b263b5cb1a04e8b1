//! Test driver
//!
//! Runs the registered cases one after another. Each case runs in its own
//! task so that an error or a panic inside it ends as a failed report rather
//! than aborting the sequence.

use std::any::Any;
use std::time::Instant;

use super::cases::{build_cases, TestCase};
use super::report;
use super::summary::{CaseOutcome, CaseReport, RunSummary};
use crate::common::config::Config;
use crate::common::paths::program_name;
use crate::common::FailureKind;

/// Where the driver is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    NotStarted,
    /// Executing the case at this index
    Running(usize),
    Done,
}

/// Sequential runner for a fixed list of cases
pub struct Driver {
    program: String,
    cases: Vec<Box<dyn TestCase>>,
    state: DriverState,
}

impl Driver {
    pub fn new(cases: Vec<Box<dyn TestCase>>) -> Self {
        Self {
            program: program_name(),
            cases,
            state: DriverState::NotStarted,
        }
    }

    /// Driver over the cases named in `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(build_cases(config))
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Run every case once, in order, and print the summary line
    pub async fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::new();
        let cases = std::mem::take(&mut self.cases);

        tracing::debug!(program = %self.program, cases = cases.len(), "starting run");

        for (index, case) in cases.into_iter().enumerate() {
            self.state = DriverState::Running(index);
            let report = run_isolated(&self.program, case).await;
            summary.record(report);
        }

        self.state = DriverState::Done;
        report::summary(&summary);
        summary
    }
}

/// Run one case, converting every kind of failure into a report
async fn run_isolated(program: &str, case: Box<dyn TestCase>) -> CaseReport {
    let name = case.name().to_string();
    report::case_started(program, &name, case.detail().as_deref());

    let started = Instant::now();
    let joined = tokio::spawn(async move { case.run().await }).await;
    let elapsed = started.elapsed();

    let outcome = match joined {
        Ok(Ok(())) => CaseOutcome::Passed,
        Ok(Err(e)) => CaseOutcome::Failed {
            kind: e.kind(),
            message: e.to_string(),
        },
        Err(join) => CaseOutcome::Failed {
            kind: FailureKind::Unexpected,
            message: if join.is_panic() {
                format!("panicked: {}", panic_message(join.into_panic()))
            } else {
                format!("aborted: {}", join)
            },
        },
    };

    match &outcome {
        CaseOutcome::Passed => report::case_passed(&name, elapsed),
        CaseOutcome::Failed { kind, message } => report::case_failed(&name, *kind, message),
    }

    CaseReport {
        name,
        outcome,
        elapsed,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
