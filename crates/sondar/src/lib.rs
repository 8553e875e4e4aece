//! Sondar: resilient element resolution and synchronization for stateful
//! web UI test automation.
//!
//! Sondar drives applications that offer no addressable DOM contract: no
//! test ids, identifiers that shift between page loads, stacked modal
//! layers, content inside frames, values echoed back through input masks.
//! It takes a human-level locator ("the field labeled X", "the button named
//! Y") and resolves it, under timing races, to a concrete live control —
//! then guarantees that a value written to that control actually took
//! effect, with bounded retries and deterministic failure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SONDAR Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────┐   ┌──────────────────────────┐  │
//! │  │ Grid      │   │ Input       │   │ Wait/Poll Engine         │  │
//! │  │ Indexer   │   │ Commit &    │──►│ (fresh snapshot per      │  │
//! │  │           │   │ Verify      │   │  tick, bounded budget)   │  │
//! │  └─────┬─────┘   └──────┬──────┘   └────────────┬─────────────┘  │
//! │        │                │                       │                │
//! │  ┌─────▼────────────────▼──────┐   ┌────────────▼─────────────┐  │
//! │  │ Live Binder (rebindable     │   │ Locator Engine +         │  │
//! │  │ structural-path references) │──►│ Layer Resolver           │  │
//! │  └─────────────────────────────┘   └────────────┬─────────────┘  │
//! │                                    ┌────────────▼─────────────┐  │
//! │                                    │ Snapshot Provider        │  │
//! │                                    │ (parsed page "soup")     │  │
//! │                                    └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The whole engine is single-threaded and cooperative: every wait is a
//! blocking poll loop over freshly parsed snapshots, and the browser
//! session is one exclusive resource held for the lifetime of a suite run.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod bind;
pub mod config;
pub mod engine;
pub mod field;
pub mod grid;
pub mod input;
pub mod lang;
pub mod layer;
pub mod locator;
pub mod mock;
pub mod report;
pub mod result;
pub mod session;
pub mod snapshot;
pub mod wait;

pub use bind::Rebind;
pub use config::SyncConfig;
pub use engine::Engine;
pub use field::{FieldDescriptor, FieldKind};
pub use grid::GridIndexer;
pub use input::{FieldWriter, Technique, WriteOptions, MAX_COMMIT_ATTEMPTS};
pub use lang::{LanguagePack, StaticPack};
pub use layer::{Container, LayerPolicy, LayerResolver};
pub use locator::{Direction, LocatorSpec, Point, Rect, Resolver, Strategy};
pub use report::{LogReporter, Outcome, StepContext, StepReporter};
pub use result::{SondarError, SondarResult};
pub use session::{Key, Session};
pub use snapshot::{ContextOrigin, NodeId, Snapshot, SnapshotProvider};
pub use wait::{WaitOptions, WaitResult, Waiter};

/// Common imports for test suites built on Sondar
pub mod prelude {
    pub use crate::bind::Rebind;
    pub use crate::config::SyncConfig;
    pub use crate::engine::Engine;
    pub use crate::field::{mask, FieldDescriptor, FieldKind};
    pub use crate::grid::GridIndexer;
    pub use crate::input::{FieldWriter, Technique, WriteOptions};
    pub use crate::lang::{LanguagePack, StaticPack};
    pub use crate::layer::{Container, LayerPolicy, LayerResolver};
    pub use crate::locator::{Direction, LocatorSpec, Point, Rect, Resolver, Strategy};
    pub use crate::report::{LogReporter, Outcome, StepContext, StepReporter};
    pub use crate::result::{SondarError, SondarResult};
    pub use crate::session::{Key, Session};
    pub use crate::snapshot::{ContextOrigin, NodeId, Snapshot, SnapshotProvider};
    pub use crate::wait::{WaitOptions, WaitResult, Waiter};
}
