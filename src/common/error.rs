//! Error types for the acceptance harness
//!
//! Every failure a test case can hit maps onto one of four kinds so the
//! driver can report it without knowing which case produced it.

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Process Errors ===
    #[error("failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    #[error("{what}: expected {expected}, got {actual}")]
    Assertion {
        what: String,
        expected: i32,
        actual: i32,
    },

    #[error("{what} timed out after {}ms", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Unexpected(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of a test case failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The executable could not be started
    Launch,
    /// An observed exit status did not match the expected one
    Assertion,
    /// A child wait or readiness check ran past its deadline
    Timeout,
    /// Anything else
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Launch => write!(f, "launch error"),
            FailureKind::Assertion => write!(f, "assertion failure"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

impl Error {
    /// Create a launch error for a program
    pub fn launch(program: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Launch {
            program: program.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an exit status assertion failure
    pub fn exit_status(expected: i32, actual: i32) -> Self {
        Self::Assertion {
            what: "exit status".to_string(),
            expected,
            actual,
        }
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Classify this error for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Launch { .. } => FailureKind::Launch,
            Error::Assertion { .. } => FailureKind::Assertion,
            Error::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Unexpected,
        }
    }
}

/// Ensure an observed exit status matches the expected one
pub fn expect_exit(expected: i32, actual: i32) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::exit_status(expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_message_names_expected_and_actual() {
        let err = Error::exit_status(0, 2);
        assert_eq!(err.to_string(), "exit status: expected 0, got 2");
        assert_eq!(err.kind(), FailureKind::Assertion);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::launch("x", "not found").kind(), FailureKind::Launch);
        assert_eq!(
            Error::timeout("client", Duration::from_millis(1500)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            Error::Unexpected("boom".into()).kind(),
            FailureKind::Unexpected
        );
        let io = io::Error::new(io::ErrorKind::Other, "pipe");
        assert_eq!(Error::from(io).kind(), FailureKind::Unexpected);
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::timeout("waiting for client", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "waiting for client timed out after 1500ms");
    }

    #[test]
    fn test_expect_exit() {
        assert!(expect_exit(0, 0).is_ok());
        assert!(matches!(
            expect_exit(0, 3),
            Err(Error::Assertion { actual: 3, .. })
        ));
    }
}
