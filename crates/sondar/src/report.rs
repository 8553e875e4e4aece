//! Step reporting boundary.
//!
//! Fatal failures are loud and specific: the reporting collaborator gets a
//! human-readable message naming the field and the expected versus observed
//! values, an optional screenshot, and a pass/fail record. The engine never
//! guesses which test it is running — the runner hands it an explicit
//! [`StepContext`] for log correlation.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::{error, info};

/// Identity of the currently executing test step, supplied by the runner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepContext {
    /// Current test identifier
    pub test_id: String,
    /// Current step within the test
    pub step: String,
}

impl StepContext {
    /// Create a context for a test
    #[must_use]
    pub fn new(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            step: String::new(),
        }
    }

    /// Set the current step label
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }
}

/// A pass/fail record for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Test identifier
    pub test_id: String,
    /// Step label
    pub step: String,
    /// Whether the step passed
    pub passed: bool,
    /// Human-readable result message
    pub message: String,
    /// Time the step took, in milliseconds
    pub elapsed_ms: u64,
}

/// Receives step results and failure evidence
pub trait StepReporter {
    /// Record a pass/fail outcome
    fn record(&self, outcome: &Outcome);

    /// Record a fatal failure with optional screenshot evidence
    fn fail(&self, context: &StepContext, message: &str, screenshot: Option<&[u8]>);
}

/// Default reporter: routes everything through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl LogReporter {
    /// Create a log reporter
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StepReporter for LogReporter {
    fn record(&self, outcome: &Outcome) {
        info!(
            test_id = %outcome.test_id,
            step = %outcome.step,
            passed = outcome.passed,
            elapsed_ms = outcome.elapsed_ms,
            "{}",
            outcome.message
        );
    }

    fn fail(&self, context: &StepContext, message: &str, screenshot: Option<&[u8]>) {
        error!(
            test_id = %context.test_id,
            step = %context.step,
            screenshot_bytes = screenshot.map_or(0, <[u8]>::len),
            "{message}"
        );
    }
}

/// Reporter that keeps everything in memory, for asserting on failure
/// behavior in tests
#[derive(Debug, Default)]
pub struct RecordingReporter {
    outcomes: RefCell<Vec<Outcome>>,
    failures: RefCell<Vec<RecordedFailure>>,
}

/// One recorded failure
#[derive(Debug, Clone)]
pub struct RecordedFailure {
    /// Test identifier at the time of failure
    pub test_id: String,
    /// Failure message
    pub message: String,
    /// Whether a screenshot accompanied the failure
    pub had_screenshot: bool,
}

impl RecordingReporter {
    /// Create a recording reporter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded outcomes
    #[must_use]
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.borrow().clone()
    }

    /// All recorded failures
    #[must_use]
    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.borrow().clone()
    }
}

impl StepReporter for RecordingReporter {
    fn record(&self, outcome: &Outcome) {
        self.outcomes.borrow_mut().push(outcome.clone());
    }

    fn fail(&self, context: &StepContext, message: &str, screenshot: Option<&[u8]>) {
        self.failures.borrow_mut().push(RecordedFailure {
            test_id: context.test_id.clone(),
            message: message.to_string(),
            had_screenshot: screenshot.is_some(),
        });
    }
}

/// Install a `tracing` subscriber reading `RUST_LOG`, once per process.
/// Safe to call from every test or runner entry point.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
