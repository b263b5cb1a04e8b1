//! Common utilities shared by the harness modules

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{expect_exit, Error, FailureKind, Result};
