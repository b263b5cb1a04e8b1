//! Stream acceptance harness
//!
//! Black-box acceptance checks for a streaming-source client: the client's
//! help surface, and a bounded streaming session against a media server the
//! harness spawns and tears down.

pub mod cli;
pub mod commands;
pub mod common;
pub mod process;
pub mod testing;

// Re-export commonly used types for tests
pub use common::config::Config;
pub use common::{Error, FailureKind, Result};
pub use testing::{Driver, RunSummary};
