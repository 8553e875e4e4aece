//! Engine facade.
//!
//! One object wiring the layers together the way a test step uses them:
//! snapshot, wait, click, write-and-verify, grid addressing. The engine owns
//! no browser state — it borrows the session for the lifetime of a suite
//! run and passes an explicit step context down to the reporting
//! collaborator. Failures surfaced here are terminal for the current step:
//! they are logged, a screenshot is requested, and the error carries the
//! specifics the operator debugs from.

use crate::bind::Rebind;
use crate::config::SyncConfig;
use crate::field::FieldDescriptor;
use crate::grid::GridIndexer;
use crate::input::{FieldWriter, WriteOptions};
use crate::layer::{Container, LayerPolicy, LayerResolver};
use crate::locator::{LocatorSpec, Resolver};
use crate::report::{Outcome, StepContext, StepReporter};
use crate::result::{SondarError, SondarResult};
use crate::session::Session;
use crate::snapshot::{Snapshot, SnapshotProvider};
use crate::wait::{WaitOptions, WaitResult, Waiter};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::error;

/// Facade over the resolution and synchronization layers
pub struct Engine<'a> {
    session: &'a dyn Session,
    config: SyncConfig,
    provider: SnapshotProvider,
    layer: LayerResolver,
    resolver: Resolver,
    writer: FieldWriter<'a>,
    grid: GridIndexer,
    reporter: Option<&'a dyn StepReporter>,
    context: StepContext,
}

impl std::fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<'a> Engine<'a> {
    /// Create an engine over the session
    #[must_use]
    pub fn new(session: &'a dyn Session, config: SyncConfig) -> Self {
        Self {
            session,
            provider: SnapshotProvider::new(config.clone()),
            layer: LayerResolver::new(config.clone()),
            resolver: Resolver::new(config.clone()),
            writer: FieldWriter::new(session, config.clone()),
            grid: GridIndexer::new(config.clone()),
            config,
            reporter: None,
            context: StepContext::default(),
        }
    }

    /// Attach the reporting collaborator and the runner-supplied context
    #[must_use]
    pub fn with_reporter(mut self, reporter: &'a dyn StepReporter, context: StepContext) -> Self {
        self.reporter = Some(reporter);
        self.context = context;
        self
    }

    /// Update the current step label
    pub fn set_step(&mut self, step: impl Into<String>) {
        self.context.step = step.into();
    }

    /// The engine configuration
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Capture a fresh snapshot of the active context
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.provider.capture(self.session)
    }

    /// The currently active container in `snapshot`, per layer policy
    pub fn active_container(&self, snapshot: &Snapshot) -> SondarResult<Option<Container>> {
        self.layer
            .top_container(snapshot, &self.config.container_selector, LayerPolicy::new())
    }

    /// Whether `spec` resolves right now, on one fresh snapshot
    #[must_use]
    pub fn is_present(&self, spec: &LocatorSpec) -> bool {
        let snapshot = self.snapshot();
        self.spec_present(&snapshot, spec)
    }

    /// Wait for `spec` to resolve, with the configured budget
    pub fn wait_present(&self, spec: &LocatorSpec) -> SondarResult<WaitResult> {
        self.wait_present_with(spec, &WaitOptions::from_config(&self.config))
    }

    /// Wait for `spec` to resolve, with explicit options
    pub fn wait_present_with(
        &self,
        spec: &LocatorSpec,
        options: &WaitOptions,
    ) -> SondarResult<WaitResult> {
        self.waiter()
            .wait_until(&spec.describe(), options, |snapshot| {
                self.spec_present(snapshot, spec)
            })
    }

    /// Wait for `spec` to stop resolving, with the configured budget
    pub fn wait_gone(&self, spec: &LocatorSpec) -> SondarResult<WaitResult> {
        self.wait_gone_with(spec, &WaitOptions::from_config(&self.config))
    }

    /// Wait for `spec` to stop resolving, with explicit options
    pub fn wait_gone_with(
        &self,
        spec: &LocatorSpec,
        options: &WaitOptions,
    ) -> SondarResult<WaitResult> {
        self.waiter()
            .wait_gone(&spec.describe(), options, |snapshot| {
                self.spec_present(snapshot, spec)
            })
    }

    /// Wait until no blocked container sits on top: the one caller allowed
    /// to look at blocked state
    pub fn wait_unblocked(&self, options: &WaitOptions) -> SondarResult<WaitResult> {
        let selector = self.config.container_selector.clone();
        let blocked = self.config.blocked_marker.clone();
        self.waiter()
            .wait_until("top container unblocked", options, move |snapshot| {
                self.layer
                    .top_container(snapshot, &selector, LayerPolicy::new().with_blocked())
                    .ok()
                    .flatten()
                    .map_or(true, |top| !snapshot.has_class(top.node, &blocked))
            })
    }

    /// Click the element resolved by `spec`, retrying stale handles from
    /// fresh snapshots until the timeout budget runs out
    pub fn click(&self, spec: &LocatorSpec) -> SondarResult<()> {
        let start = Instant::now();
        loop {
            let snapshot = self.snapshot();
            match self.resolve_in(&snapshot, spec) {
                Ok(Some(node)) => {
                    let rebind = Rebind::from_node(&snapshot, node);
                    match rebind
                        .live(self.session)
                        .and_then(|path| self.session.click(path))
                    {
                        Ok(()) => {
                            self.record_pass(
                                &format!("clicked {}", spec.describe()),
                                start.elapsed(),
                            );
                            return Ok(());
                        }
                        Err(err) if err.is_recoverable() => {}
                        Err(err) => return Err(self.step_fail(err)),
                    }
                }
                Ok(None) => {}
                Err(err) => return Err(self.step_fail(err)),
            }
            if start.elapsed() >= self.config.timeout() {
                return Err(self.step_fail(SondarError::NotFound {
                    locator: spec.describe(),
                    timeout_ms: self.config.timeout_ms,
                }));
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    /// Write `value` into the field resolved by `spec` and verify the echo
    pub fn set_value(&self, spec: &LocatorSpec, value: &str) -> SondarResult<String> {
        self.set_value_with(spec, value, WriteOptions::new())
    }

    /// [`set_value`](Self::set_value) with caller declarations
    pub fn set_value_with(
        &self,
        spec: &LocatorSpec,
        value: &str,
        options: WriteOptions,
    ) -> SondarResult<String> {
        let start = Instant::now();
        match self.writer.set_value_with(spec, value, options) {
            Ok(committed) => {
                self.record_pass(
                    &format!("{} <- '{value}'", spec.describe()),
                    start.elapsed(),
                );
                Ok(committed)
            }
            Err(err) => Err(self.step_fail(err)),
        }
    }

    /// Read the current value of the field resolved by `spec`, type-aware
    pub fn value_of(&self, spec: &LocatorSpec) -> SondarResult<String> {
        let (rebind, descriptor) = self
            .writer
            .resolve_field(spec)
            .map_err(|err| self.step_fail(err))?;
        self.writer
            .read_back(&rebind, &descriptor)
            .map_err(|err| self.step_fail(err))
    }

    /// Resolved metadata for the field located by `spec`
    pub fn descriptor_of(&self, spec: &LocatorSpec) -> SondarResult<FieldDescriptor> {
        let (_, descriptor) = self
            .writer
            .resolve_field(spec)
            .map_err(|err| self.step_fail(err))?;
        Ok(descriptor)
    }

    /// Ordinal of the column headed `header_text` in the active container's
    /// `grid_ordinal`-th grid
    pub fn column_of(&mut self, grid_ordinal: usize, header_text: &str) -> SondarResult<usize> {
        let snapshot = self.snapshot();
        let container = self.require_container(&snapshot)?;
        self.grid
            .column_of(&snapshot, &container, grid_ordinal, header_text)
            .map_err(|err| self.step_fail(err))
    }

    /// Move the row cursor of the active container's `grid_ordinal`-th grid
    pub fn select_row(&mut self, grid_ordinal: usize, row_ordinal: usize) -> SondarResult<()> {
        let snapshot = self.snapshot();
        let container = self.require_container(&snapshot)?;
        self.grid
            .select_row(self.session, &snapshot, &container, grid_ordinal, row_ordinal)
            .map_err(|err| self.step_fail(err))
    }

    /// Append a new line to the active container's `grid_ordinal`-th grid,
    /// returning the row the cursor landed on
    pub fn new_row(&mut self, grid_ordinal: usize) -> SondarResult<usize> {
        let snapshot = self.snapshot();
        let container = self.require_container(&snapshot)?;
        self.grid
            .new_row(self.session, &snapshot, &container, grid_ordinal)
            .map_err(|err| self.step_fail(err))
    }

    fn waiter(&self) -> Waiter<'a> {
        let waiter = Waiter::new(self.session, self.provider.clone());
        match self.reporter {
            Some(reporter) => waiter.with_reporter(reporter, self.context.clone()),
            None => waiter,
        }
    }

    fn spec_present(&self, snapshot: &Snapshot, spec: &LocatorSpec) -> bool {
        matches!(self.resolve_in(snapshot, spec), Ok(Some(_)))
    }

    fn resolve_in(
        &self,
        snapshot: &Snapshot,
        spec: &LocatorSpec,
    ) -> SondarResult<Option<crate::snapshot::NodeId>> {
        let Some(container) = self.active_container(snapshot)? else {
            return Ok(None);
        };
        self.resolver
            .resolve_one(self.session, snapshot, container.node, spec, &HashSet::new())
    }

    fn require_container(&self, snapshot: &Snapshot) -> SondarResult<Container> {
        self.active_container(snapshot)?
            .ok_or_else(|| {
                self.step_fail(SondarError::NotFound {
                    locator: self.config.container_selector.clone(),
                    timeout_ms: 0,
                })
            })
    }

    fn record_pass(&self, message: &str, elapsed: Duration) {
        if let Some(reporter) = self.reporter {
            reporter.record(&Outcome {
                test_id: self.context.test_id.clone(),
                step: self.context.step.clone(),
                passed: true,
                message: message.to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
    }

    fn step_fail(&self, err: SondarError) -> SondarError {
        error!(test_id = %self.context.test_id, step = %self.context.step, "{err}");
        if let Some(reporter) = self.reporter {
            let screenshot = self.session.screenshot().ok();
            reporter.fail(&self.context, &err.to_string(), screenshot.as_deref());
        }
        err
    }
}
