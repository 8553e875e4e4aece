//! Engine configuration.
//!
//! The external configuration collaborator supplies two numbers: a timeout
//! budget and a poll step. Everything else here is the class/selector
//! vocabulary of the target application, configurable because the engine
//! defines the mechanism, not any one screen's markup conventions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait timeout (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Minimum polling interval. Steps below this floor busy-spin against the
/// browser session without observing anything new.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Default fraction of a container's width/height accepted as label-to-input
/// distance by the geometry strategy
pub const DEFAULT_GEOMETRY_TOLERANCE: f32 = 0.25;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Timeout budget for wait loops, in milliseconds
    pub timeout_ms: u64,
    /// Poll step for wait loops, in milliseconds
    pub poll_interval_ms: u64,
    /// Selector for top-level interactive containers (modals, page body)
    pub container_selector: String,
    /// Selector for the well-known embedded-session iframe, if the target
    /// application renders inside one
    pub frame_selector: Option<String>,
    /// Class marking a container as administratively blocked
    pub blocked_marker: String,
    /// Class marking content on an inactive tab of a tabbed widget
    pub inactive_tab_marker: String,
    /// Class marking the current row of a grid
    pub row_marker: String,
    /// Base geometry tolerance as a fraction of container size
    pub geometry_tolerance: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            container_selector: String::from("body, .dialog, [role='dialog']"),
            frame_selector: Some(String::from("iframe.embedded-session")),
            blocked_marker: String::from("blocked"),
            inactive_tab_marker: String::from("inactive-tab"),
            row_marker: String::from("current-row"),
            geometry_tolerance: DEFAULT_GEOMETRY_TOLERANCE,
        }
    }
}

impl SyncConfig {
    /// Create a config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from the configuration collaborator's seconds-based values
    #[must_use]
    pub fn from_secs(timeout_secs: f64, poll_secs: f64) -> Self {
        Self {
            timeout_ms: (timeout_secs * 1000.0) as u64,
            poll_interval_ms: ((poll_secs * 1000.0) as u64).max(MIN_POLL_INTERVAL_MS),
            ..Self::default()
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set poll interval in milliseconds, clamped to the floor
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        self
    }

    /// Set the container selector
    #[must_use]
    pub fn with_container_selector(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = selector.into();
        self
    }

    /// Set the embedded-session frame selector, or `None` to disable frame
    /// descent
    #[must_use]
    pub fn with_frame_selector(mut self, selector: Option<String>) -> Self {
        self.frame_selector = selector;
        self
    }

    /// Set the blocked-container marker class
    #[must_use]
    pub fn with_blocked_marker(mut self, class: impl Into<String>) -> Self {
        self.blocked_marker = class.into();
        self
    }

    /// Set the inactive-tab marker class
    #[must_use]
    pub fn with_inactive_tab_marker(mut self, class: impl Into<String>) -> Self {
        self.inactive_tab_marker = class.into();
        self
    }

    /// Set the current-row marker class
    #[must_use]
    pub fn with_row_marker(mut self, class: impl Into<String>) -> Self {
        self.row_marker = class.into();
        self
    }

    /// Set the geometry tolerance fraction
    #[must_use]
    pub const fn with_geometry_tolerance(mut self, fraction: f32) -> Self {
        self.geometry_tolerance = fraction;
        self
    }

    /// Get timeout as a Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
