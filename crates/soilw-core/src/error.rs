//! Error kinds and the cooperative-cancellation run log.
//!
//! The original engine threads a `LOG_INFO` struct through every call:
//! a fatal flag plus a bounded warnings ring. We keep that shape as
//! [`RunLog`] rather than unwinding through `Result` alone, because
//! several call sites (site init, vegetation estimation, the daily
//! flow controller) need to keep running after a non-fatal problem
//! and report *all* of the warnings they accumulated, not just the
//! first one.

use thiserror::Error;

/// Maximum number of warnings retained per run; further warnings are
/// dropped and only counted.
pub const MAX_MSGS: usize = 50;

/// The closed set of ways a core operation can fail.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SoilwError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed input at {file}:{line}: {message}")]
    MalformedInput {
        file: String,
        line: usize,
        message: String,
    },

    #[error("value outside the defined domain: {0}")]
    OutOfDomain(String),

    #[error("root finder failed to converge: {0}")]
    Nonconvergence(String),

    #[error("invalid covariance: {0}")]
    BadCovariance(String),

    #[error("vegetation composition is underdetermined: {0}")]
    Underdetermined(String),

    #[error("incompatible configuration: {0}")]
    Incompatibility(String),

    #[error("I/O failure: {0}")]
    IOFailure(String),
}

/// Cooperative error/warning surface threaded through every core entry
/// point. Mirrors the source's `LOG_INFO`: a fatal latch plus a
/// bounded warnings buffer.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    stop_run: bool,
    error_message: Option<String>,
    warnings: Vec<String>,
    dropped_warnings: usize,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a fatal error has been recorded. Every core function
    /// must check this on entry and return immediately without
    /// further mutation if it is set.
    pub fn stop_run(&self) -> bool {
        self.stop_run
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn dropped_warnings(&self) -> usize {
        self.dropped_warnings
    }

    /// Record a fatal error. Idempotent: the first error wins, later
    /// calls are ignored so a cascade of downstream failures does not
    /// overwrite the root cause.
    pub fn fatal(&mut self, err: SoilwError) {
        if !self.stop_run {
            self.stop_run = true;
            self.error_message = Some(err.to_string());
        }
    }

    /// Record a non-fatal warning. Never sets `stop_run`.
    pub fn warn(&mut self, message: impl Into<String>) {
        if self.warnings.len() < MAX_MSGS {
            self.warnings.push(message.into());
        } else {
            self.dropped_warnings += 1;
        }
    }

    /// Convert the current fatal state into a `Result`, consuming
    /// nothing — callers use this at the boundary of a `pub fn` that
    /// wants to return `Result` instead of checking `stop_run` by hand.
    pub fn into_result(self) -> Result<(), SoilwError> {
        match self.error_message {
            Some(msg) if self.stop_run => Err(SoilwError::InvalidInput(msg)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_latches_first_error() {
        let mut log = RunLog::new();
        log.fatal(SoilwError::InvalidInput("first".into()));
        log.fatal(SoilwError::InvalidInput("second".into()));
        assert!(log.stop_run());
        assert_eq!(log.error_message(), Some("invalid input: first".to_string()).as_deref());
    }

    #[test]
    fn warnings_are_bounded() {
        let mut log = RunLog::new();
        for i in 0..(MAX_MSGS + 5) {
            log.warn(format!("warning {i}"));
        }
        assert_eq!(log.warnings().len(), MAX_MSGS);
        assert_eq!(log.dropped_warnings(), 5);
        assert!(!log.stop_run());
    }
}
