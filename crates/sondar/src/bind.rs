//! Live Binder.
//!
//! A [`Rebind`] is a rebindable reference: the bridge from a snapshot-time
//! decision to the live DOM. It stores the structural path of the chosen
//! node — never a driver element object — and re-derives the live element on
//! every use, because the DOM may have been replaced between resolution and
//! dereference. A failed re-derivation is [`SondarError::Stale`], which
//! callers treat as "retry resolution from a fresh snapshot", not as a
//! fatal error.

use crate::result::{SondarError, SondarResult};
use crate::session::Session;
use crate::snapshot::{NodeId, Snapshot};

/// Rebindable reference to a live element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebind {
    path: String,
    description: String,
}

impl Rebind {
    /// Bind a resolved snapshot node
    #[must_use]
    pub fn from_node(snapshot: &Snapshot, node: NodeId) -> Self {
        let path = snapshot.css_path(node);
        let description = match snapshot.attr(node, "id") {
            Some(id) => format!(
                "{}#{id}",
                snapshot.tag(node).unwrap_or_else(|| "?".to_string())
            ),
            None => path.clone(),
        };
        Self { path, description }
    }

    /// Bind a known structural path directly
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            description: path.clone(),
            path,
        }
    }

    /// The structural path this reference re-resolves through
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Short human-readable form for error messages
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Re-derive the live element, returning the path to address it with.
    ///
    /// Called on every use; nothing is cached across calls.
    pub fn live(&self, session: &dyn Session) -> SondarResult<&str> {
        if session.exists(&self.path)? {
            Ok(&self.path)
        } else {
            Err(SondarError::Stale {
                path: self.path.clone(),
            })
        }
    }

    /// Re-derive the node in a fresh snapshot, for read-backs that go
    /// through parsed markup rather than the live session
    pub fn node_in(&self, snapshot: &Snapshot) -> SondarResult<NodeId> {
        snapshot
            .node_at_path(&self.path)
            .ok_or_else(|| SondarError::Stale {
                path: self.path.clone(),
            })
    }
}
