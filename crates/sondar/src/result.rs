//! Result and error types for Sondar.

use thiserror::Error;

/// Result type for Sondar operations
pub type SondarResult<T> = Result<T, SondarError>;

/// Errors that can occur in Sondar
#[derive(Debug, Error)]
pub enum SondarError {
    /// A locator resolved to zero candidates after the full timeout budget
    #[error("Element not found: '{locator}' (waited {timeout_ms}ms)")]
    NotFound {
        /// The locator term that failed to resolve
        locator: String,
        /// How long resolution was retried before giving up
        timeout_ms: u64,
    },

    /// A locator matched more than one candidate and the tie-break rules
    /// could not single one out
    #[error("Ambiguous locator: '{locator}' matched {count} candidates")]
    Ambiguous {
        /// The locator term
        locator: String,
        /// Number of equally-ranked candidates
        count: usize,
    },

    /// The field exists but is administratively disabled
    #[error("Field disabled: '{field}'")]
    Disabled {
        /// The field that was found disabled
        field: String,
    },

    /// A committed value never matched the read-back within the retry budget
    #[error(
        "Verification failed for '{field}' after {attempts} attempts: \
         expected '{expected}', observed '{observed}'"
    )]
    VerificationFailed {
        /// The field that was written
        field: String,
        /// The value the caller asked for
        expected: String,
        /// The last value read back from the field
        observed: String,
        /// Number of commit attempts performed
        attempts: usize,
    },

    /// A bound live handle no longer corresponds to a live element.
    /// Recovered internally by re-resolving from a fresh snapshot.
    #[error("Stale element reference: {path}")]
    Stale {
        /// Structural path that failed to re-resolve
        path: String,
    },

    /// The browser session collaborator reported an error
    #[error("Session error: {message}")]
    Session {
        /// Error message from the session
        message: String,
    },

    /// A bounded wait expired
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Description of the awaited condition
        waited_for: String,
    },

    /// A CSS selector failed to parse
    #[error("Invalid selector: '{selector}'")]
    SelectorParse {
        /// The selector text that failed to parse
        selector: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SondarError {
    /// Whether the engine recovers from this error internally by retrying
    /// against a fresh snapshot. Only staleness qualifies; everything else
    /// surfaces to the current test step.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    /// Shorthand for a session-boundary error
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }
}
