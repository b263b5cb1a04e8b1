//! Human-readable progress lines on stderr

use std::time::Duration;

use colored::Colorize;

use super::summary::RunSummary;
use crate::common::FailureKind;

/// Announce a case before it runs
pub fn case_started(program: &str, name: &str, detail: Option<&str>) {
    match detail {
        Some(detail) => eprintln!("{}: {}: {}", program.dimmed(), name.bold(), detail),
        None => eprintln!("{}: {}", program.dimmed(), name.bold()),
    }
}

pub fn case_passed(name: &str, elapsed: Duration) {
    eprintln!(
        "  {} {} {}",
        "✓".green(),
        name,
        format!("({:.2}s)", elapsed.as_secs_f64()).dimmed()
    );
}

/// One line per failure, naming the case and the reason
pub fn case_failed(name: &str, kind: FailureKind, message: &str) {
    eprintln!("  {} {}: {}", "✗".red(), name, message);
    tracing::debug!(case = name, %kind, "case failed");
}

/// Relay captured output of a child process
pub fn child_output(label: &str, output: &str) {
    let output = output.trim_end();
    if output.is_empty() {
        tracing::debug!(label, "no output captured");
        return;
    }
    for line in output.lines() {
        eprintln!("    {} {}", format!("{}>", label).dimmed(), line);
    }
}

/// Final summary line; never colored so it can be matched literally
pub fn summary(summary: &RunSummary) {
    eprintln!("{}", summary.summary_line());
}
