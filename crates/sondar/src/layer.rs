//! Layer Resolver.
//!
//! The target application stacks modal windows: several containers matching
//! the same selector can be present at once, and only the visually topmost
//! one is interactive. The resolver orders candidates by stacking key
//! (descending) and breaks ties by treating the later-encountered container
//! as the more recently opened one. Blocked containers and containers on an
//! inactive tab are filtered out by policy; finding zero containers is an
//! empty result, not an error — callers decide what absence means.

use crate::config::SyncConfig;
use crate::result::SondarResult;
use crate::snapshot::{NodeId, Snapshot};
use serde::{Deserialize, Serialize};

/// Filtering policy for container resolution
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerPolicy {
    /// Keep administratively blocked containers. Only the routine that
    /// waits on blocked state sets this.
    pub include_blocked: bool,
    /// Exclude containers sitting on an inactive tab of a tabbed widget
    pub honor_tabs: bool,
}

impl Default for LayerPolicy {
    fn default() -> Self {
        Self {
            include_blocked: false,
            honor_tabs: true,
        }
    }
}

impl LayerPolicy {
    /// Default policy: skip blocked containers, honor tab scoping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep blocked containers in the result
    #[must_use]
    pub const fn with_blocked(mut self) -> Self {
        self.include_blocked = true;
        self
    }

    /// Ignore tab scoping entirely
    #[must_use]
    pub const fn ignore_tabs(mut self) -> Self {
        self.honor_tabs = false;
        self
    }
}

/// A top-level interactive surface resolved from a snapshot
#[derive(Debug, Clone)]
pub struct Container {
    /// The container's node in the snapshot
    pub node: NodeId,
    /// Stable identity for caching (id attribute or structural path)
    pub structural_id: String,
    /// Stacking key extracted from the style attribute, default 0
    pub stacking_key: i32,
    /// Encounter order in the document
    pub order: usize,
}

/// Resolves which containers are currently active
#[derive(Debug, Clone)]
pub struct LayerResolver {
    config: SyncConfig,
}

impl LayerResolver {
    /// Create a resolver over the given configuration
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// All candidate containers matching `selector`, filtered by `policy`
    /// and sorted topmost-first: descending stacking key, equal keys broken
    /// by reverse encounter order (most recently opened first).
    pub fn active_containers(
        &self,
        snapshot: &Snapshot,
        selector: &str,
        policy: LayerPolicy,
    ) -> SondarResult<Vec<Container>> {
        let mut containers: Vec<Container> = snapshot
            .select(None, selector)?
            .into_iter()
            .enumerate()
            .filter(|(_, node)| snapshot.displayed(*node))
            .filter(|(_, node)| {
                policy.include_blocked || !snapshot.has_class(*node, &self.config.blocked_marker)
            })
            .map(|(order, node)| Container {
                node,
                structural_id: snapshot.structural_id(node),
                stacking_key: snapshot.stacking_key(node),
                order,
            })
            .collect();

        if policy.honor_tabs {
            let tab_scoped: Vec<Container> = containers
                .iter()
                .filter(|c| !self.on_inactive_tab(snapshot, c.node))
                .cloned()
                .collect();
            // Partial information beats a hard failure: when every candidate
            // sits on an inactive tab, fall back to the unfiltered set.
            if !tab_scoped.is_empty() {
                containers = tab_scoped;
            }
        }

        containers.sort_by(|a, b| {
            b.stacking_key
                .cmp(&a.stacking_key)
                .then(b.order.cmp(&a.order))
        });
        Ok(containers)
    }

    /// The single active container, if any: the head of
    /// [`active_containers`](Self::active_containers)
    pub fn top_container(
        &self,
        snapshot: &Snapshot,
        selector: &str,
        policy: LayerPolicy,
    ) -> SondarResult<Option<Container>> {
        Ok(self
            .active_containers(snapshot, selector, policy)?
            .into_iter()
            .next())
    }

    fn on_inactive_tab(&self, snapshot: &Snapshot, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if snapshot.has_class(id, &self.config.inactive_tab_marker) {
                return true;
            }
            current = snapshot.parent(id);
        }
        false
    }
}
