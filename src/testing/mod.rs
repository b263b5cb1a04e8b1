//! Acceptance test cases and the driver that runs them
//!
//! Cases report a typed error; the driver turns that into a pass/fail count
//! and the final exit code.

mod cases;
mod report;
mod runner;
mod summary;

pub use cases::{build_cases, HelpCheck, StreamCheck, TestCase, UsageCheck, VersionCheck};
pub use runner::{Driver, DriverState};
pub use summary::{CaseOutcome, CaseReport, RunSummary};
