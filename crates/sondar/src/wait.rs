//! Wait/Poll Engine.
//!
//! The system's only concurrency primitive. Every synchronization point is
//! a blocking, single-threaded poll loop: take a fresh snapshot, evaluate
//! the predicate against it, sleep one step, repeat until the predicate
//! holds or the deadline passes. Nothing is ever concluded from a cached
//! snapshot, and predicates must be side-effect free so that retrying after
//! a false negative is always safe.
//!
//! Two polarities share one loop: waiting for presence and waiting for
//! absence (the predicate negated). On timeout, a presence wait is fatal —
//! logged, screenshot captured, surfaced as an error — unless the caller
//! marked the wait advisory, in which case the caller gets a `false` result
//! and keeps control.

use crate::config::{SyncConfig, MIN_POLL_INTERVAL_MS};
use crate::report::{StepContext, StepReporter};
use crate::result::{SondarError, SondarResult};
use crate::session::Session;
use crate::snapshot::{Snapshot, SnapshotProvider};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Options for one wait operation
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Advisory waits yield `false` on timeout instead of failing the step
    pub advisory: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl WaitOptions {
    /// Create options from the engine configuration
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
            advisory: false,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Mark the wait advisory: timeout becomes a boolean result
    #[must_use]
    pub const fn advisory(mut self) -> Self {
        self.advisory = true;
        self
    }

    /// Effective step, with the busy-spin floor applied
    #[must_use]
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

/// Result of a wait operation
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the awaited condition held before the deadline
    pub satisfied: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// The condition held
    #[must_use]
    pub fn satisfied(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            elapsed,
            waited_for: waited_for.into(),
        }
    }

    /// The deadline passed first (advisory waits only)
    #[must_use]
    pub fn expired(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

/// Bounded-time poll loops over fresh snapshots
pub struct Waiter<'a> {
    session: &'a dyn Session,
    provider: SnapshotProvider,
    reporter: Option<&'a dyn StepReporter>,
    context: StepContext,
}

impl std::fmt::Debug for Waiter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<'a> Waiter<'a> {
    /// Create a waiter over the session
    #[must_use]
    pub fn new(session: &'a dyn Session, provider: SnapshotProvider) -> Self {
        Self {
            session,
            provider,
            reporter: None,
            context: StepContext::default(),
        }
    }

    /// Attach the reporting collaborator for fatal-timeout evidence
    #[must_use]
    pub fn with_reporter(mut self, reporter: &'a dyn StepReporter, context: StepContext) -> Self {
        self.reporter = Some(reporter);
        self.context = context;
        self
    }

    /// Poll until `predicate` holds against a fresh snapshot.
    ///
    /// The predicate is evaluated immediately, then once per step until the
    /// deadline; it is never evaluated faster than the step interval.
    pub fn wait_until<F>(
        &self,
        waited_for: &str,
        options: &WaitOptions,
        mut predicate: F,
    ) -> SondarResult<WaitResult>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let start = Instant::now();
        let timeout = Duration::from_millis(options.timeout_ms);
        let step = options.step();

        loop {
            let snapshot = self.provider.capture(self.session);
            if predicate(&snapshot) {
                debug!(waited_for, elapsed_ms = start.elapsed().as_millis() as u64, "wait satisfied");
                return Ok(WaitResult::satisfied(start.elapsed(), waited_for));
            }
            if start.elapsed() >= timeout {
                break;
            }
            std::thread::sleep(step);
        }

        if options.advisory {
            debug!(waited_for, timeout_ms = options.timeout_ms, "advisory wait expired");
            return Ok(WaitResult::expired(start.elapsed(), waited_for));
        }
        self.fatal_timeout(waited_for, options.timeout_ms)
    }

    /// Poll until `predicate` stops holding: the same loop, negated
    pub fn wait_gone<F>(
        &self,
        waited_for: &str,
        options: &WaitOptions,
        mut predicate: F,
    ) -> SondarResult<WaitResult>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let description = format!("absence of {waited_for}");
        self.wait_until(&description, options, move |snapshot| !predicate(snapshot))
    }

    fn fatal_timeout(&self, waited_for: &str, timeout_ms: u64) -> SondarResult<WaitResult> {
        let message = format!("timed out after {timeout_ms}ms waiting for {waited_for}");
        error!(test_id = %self.context.test_id, "{message}");
        if let Some(reporter) = self.reporter {
            let screenshot = self.session.screenshot().ok();
            reporter.fail(&self.context, &message, screenshot.as_deref());
        }
        Err(SondarError::Timeout {
            ms: timeout_ms,
            waited_for: waited_for.to_string(),
        })
    }
}
