//! Error taxonomy for timing reconstruction
//!
//! Every failure here is fatal for the analysis: a post-mortem over corrupt
//! logs must stop and name the invariant that broke instead of emitting
//! misleading statistics.

use thiserror::Error;

/// Errors that abort a timing analysis
#[derive(Error, Debug)]
pub enum TimingError {
    /// A line needed to establish an anchor or a consistency set is missing or unparsable
    #[error("Malformed log {source_name} (line {line}): {reason}")]
    MalformedLog {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// Start/end bookkeeping or interval ordering does not hold
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// A result's provenance graph does not identify its originating batch
    #[error("Provenance error: {0}")]
    Provenance(String),

    /// The run directory is missing a required file or holds an ambiguous set
    #[error("Run directory: {0}")]
    RunLayout(String),

    /// Invalid timing configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TimingError {
    /// Build a [`TimingError::MalformedLog`] for a 1-based line of a named source
    pub fn malformed(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedLog {
            source_name: source_name.to_string(),
            line,
            reason: reason.into(),
        }
    }

    /// Build a [`TimingError::ConsistencyViolation`]
    pub fn consistency(reason: impl Into<String>) -> Self {
        Self::ConsistencyViolation(reason.into())
    }
}

/// Result type for timing reconstruction
pub type Result<T> = std::result::Result<T, TimingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_names_source_and_line() {
        let err = TimingError::malformed("driver.o", 7, "no anchor");
        let msg = err.to_string();
        assert!(msg.contains("driver.o"));
        assert!(msg.contains("line 7"));
        assert!(msg.contains("no anchor"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TimingError = io.into();
        assert!(matches!(err, TimingError::Io(_)));
    }
}
