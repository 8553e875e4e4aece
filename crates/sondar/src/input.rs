//! Input Commit & Verify Loop.
//!
//! The only component permitted to mutate field state. A write is not done
//! when the keystrokes are dispatched — it is done when the field echoes the
//! value back. The loop commits, reads back through a freshly bound live
//! handle, compares mask-normalized forms, and retries with escalating
//! technique until the echo matches or the attempt budget runs out. The
//! budget is a local loop counter: exhaustion is a deterministic
//! `VerificationFailed` carrying both values, never a hang.
//!
//! Escalation is lazy. The cheap technique succeeds in the common case, so
//! the ladder only climbs after a verification actually fails.

use crate::bind::Rebind;
use crate::config::SyncConfig;
use crate::field::{mask, FieldDescriptor, FieldKind};
use crate::layer::{LayerPolicy, LayerResolver};
use crate::locator::{LocatorSpec, Resolver};
use crate::result::{SondarError, SondarResult};
use crate::session::{Key, Session};
use crate::snapshot::SnapshotProvider;
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

/// Bounded attempt budget for one `set_value` call
pub const MAX_COMMIT_ATTEMPTS: usize = 100;

/// Input technique escalation ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    /// Direct key dispatch
    SendKeys,
    /// Synthetic action-chain dispatch
    ActionChain,
    /// Script-assisted focus plus dispatch
    Scripted,
}

impl Technique {
    /// Stable identifier, also the rung index on the ladder
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::SendKeys => 0,
            Self::ActionChain => 1,
            Self::Scripted => 2,
        }
    }

    /// The technique to use after `failures` failed verifications
    #[must_use]
    pub const fn for_failures(failures: usize) -> Self {
        match failures {
            0 => Self::SendKeys,
            1 => Self::ActionChain,
            _ => Self::Scripted,
        }
    }

    /// Short name for log events
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendKeys => "send-keys",
            Self::ActionChain => "action-chain",
            Self::Scripted => "scripted",
        }
    }
}

/// Caller declarations about the write
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// The caller knows the field is disabled; skip the write instead of
    /// failing the step
    pub expect_disabled: bool,
}

impl WriteOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the field intentionally disabled
    #[must_use]
    pub const fn expecting_disabled(mut self) -> Self {
        self.expect_disabled = true;
        self
    }
}

/// Writes values into resolved fields and verifies the echo
pub struct FieldWriter<'a> {
    session: &'a dyn Session,
    provider: SnapshotProvider,
    layer: LayerResolver,
    resolver: Resolver,
    config: SyncConfig,
}

impl std::fmt::Debug for FieldWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldWriter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> FieldWriter<'a> {
    /// Create a writer over the session
    #[must_use]
    pub fn new(session: &'a dyn Session, config: SyncConfig) -> Self {
        Self {
            session,
            provider: SnapshotProvider::new(config.clone()),
            layer: LayerResolver::new(config.clone()),
            resolver: Resolver::new(config.clone()),
            config,
        }
    }

    /// Write `value` into the field located by `spec` and verify the echo
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
        let (mut rebind, mut descriptor) = self.resolve_field(spec)?;

        let enabled = descriptor.enabled && self.session.is_enabled(&descriptor.path)?;
        if !enabled {
            if options.expect_disabled {
                // Declared disabled: zero write attempts, report what's there.
                return self.read_back(&rebind, &descriptor);
            }
            return Err(SondarError::Disabled {
                field: spec.describe(),
            });
        }

        let mut failures = 0usize;
        let mut last_observed = String::new();
        for attempt in 0..MAX_COMMIT_ATTEMPTS {
            let technique = Technique::for_failures(failures);
            debug!(
                field = %spec.describe(),
                attempt,
                technique = technique.as_str(),
                "commit attempt"
            );
            match self.commit_once(&rebind, &descriptor, value, technique) {
                Ok(observed) => {
                    if Self::verified(&descriptor, value, &observed) {
                        return Ok(observed);
                    }
                    last_observed = observed;
                    failures += 1;
                }
                Err(err) if err.is_recoverable() => {
                    // Stale handle: the container re-rendered under us.
                    // Re-resolve from a fresh snapshot and keep the budget.
                    match self.try_resolve_field(spec)? {
                        Some((fresh_rebind, fresh_descriptor)) => {
                            rebind = fresh_rebind;
                            descriptor = fresh_descriptor;
                        }
                        None => failures += 1,
                    }
                }
                Err(err) => return Err(err),
            }
            // Retry pacing is the floor, not the wait-loop step: the budget
            // is attempts, and a failed echo is worth re-trying promptly.
            std::thread::sleep(std::time::Duration::from_millis(
                crate::config::MIN_POLL_INTERVAL_MS,
            ));
        }

        Err(SondarError::VerificationFailed {
            field: spec.describe(),
            expected: value.to_string(),
            observed: last_observed,
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    /// Read the field's current value, type-aware
    pub fn read_back(
        &self,
        rebind: &Rebind,
        descriptor: &FieldDescriptor,
    ) -> SondarResult<String> {
        match descriptor.kind {
            FieldKind::Combo => {
                let snapshot = self.provider.capture(self.session);
                let node = rebind.node_in(&snapshot)?;
                let selected = snapshot.select(Some(node), "option[selected]")?;
                Ok(selected
                    .first()
                    .map(|option| snapshot.text(*option))
                    .unwrap_or_default())
            }
            FieldKind::MultiLine | FieldKind::Label => {
                let snapshot = self.provider.capture(self.session);
                let node = rebind.node_in(&snapshot)?;
                Ok(snapshot.text(node))
            }
            FieldKind::PlainText | FieldKind::MaskedNumeric => {
                self.session.read_value(rebind.live(self.session)?)
            }
        }
    }

    /// Resolve the field or fail with `NotFound` after the timeout budget
    pub fn resolve_field(&self, spec: &LocatorSpec) -> SondarResult<(Rebind, FieldDescriptor)> {
        let start = Instant::now();
        loop {
            if let Some(found) = self.try_resolve_field(spec)? {
                return Ok(found);
            }
            if start.elapsed() >= self.config.timeout() {
                return Err(SondarError::NotFound {
                    locator: spec.describe(),
                    timeout_ms: self.config.timeout_ms,
                });
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    fn try_resolve_field(
        &self,
        spec: &LocatorSpec,
    ) -> SondarResult<Option<(Rebind, FieldDescriptor)>> {
        let snapshot = self.provider.capture(self.session);
        let Some(container) = self.layer.top_container(
            &snapshot,
            &self.config.container_selector,
            LayerPolicy::new(),
        )?
        else {
            return Ok(None);
        };
        let Some(node) = self.resolver.resolve_one(
            self.session,
            &snapshot,
            container.node,
            spec,
            &HashSet::new(),
        )?
        else {
            return Ok(None);
        };
        Ok(Some((
            Rebind::from_node(&snapshot, node),
            FieldDescriptor::classify(&snapshot, node),
        )))
    }

    fn commit_once(
        &self,
        rebind: &Rebind,
        descriptor: &FieldDescriptor,
        value: &str,
        technique: Technique,
    ) -> SondarResult<String> {
        let path = rebind.live(self.session)?.to_string();
        self.session.write_value(&path, "")?;
        match technique {
            Technique::SendKeys => self.session.send_keys(&path, value)?,
            Technique::ActionChain => self.session.dispatch_chain(&path, value)?,
            Technique::Scripted => self.session.focus_and_type(&path, value)?,
        }
        if descriptor.kind == FieldKind::MaskedNumeric {
            // Numeric masks reject partial input; the explicit commit key
            // makes the field accept or restore, so the read-back is real.
            self.session.press_key(&path, Key::Enter)?;
        }
        self.read_back(rebind, descriptor)
    }

    fn verified(descriptor: &FieldDescriptor, expected: &str, observed: &str) -> bool {
        match descriptor.kind {
            FieldKind::MaskedNumeric => mask::numeric_echo_matches(expected, observed),
            _ => mask::echo_matches(expected, observed, descriptor.mask.as_deref()),
        }
    }
}
