//! Snapshot Provider.
//!
//! A [`Snapshot`] is an immutable parse of the rendered page at one instant.
//! Snapshots are cheap and disposable: every poll tick takes a fresh one and
//! throws it away, because nothing observed through a stale tree can be
//! trusted. Node identifiers are only meaningful against the snapshot that
//! produced them.
//!
//! [`SnapshotProvider::capture`] owns the context dance: it resets the
//! session to the top-level document, descends into the well-known
//! embedded-session frame when one is present, and on a transient session
//! error retries once against the top-level document and returns a
//! best-effort snapshot instead of failing the caller — a marginally stale
//! tree beats aborting every wait loop in flight.

use crate::config::SyncConfig;
use crate::result::{SondarError, SondarResult};
use crate::session::Session;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Identifier of a node within one snapshot.
///
/// Ids are copyable handles into the snapshot's tree; they must never be
/// carried across snapshots.
pub type NodeId = ego_tree::NodeId;

/// Which browsing context a snapshot was serialized from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOrigin {
    /// The top-level document
    Top,
    /// The embedded-session frame
    Frame,
    /// Whatever context the session was already in (nested-context flag)
    Current,
}

/// Immutable parsed copy of the rendered page at one instant
#[derive(Debug, Clone)]
pub struct Snapshot {
    html: Html,
    origin: ContextOrigin,
}

impl Snapshot {
    /// Parse markup into a snapshot
    #[must_use]
    pub fn parse(markup: &str, origin: ContextOrigin) -> Self {
        Self {
            html: Html::parse_document(markup),
            origin,
        }
    }

    /// The browsing context this snapshot came from
    #[must_use]
    pub const fn origin(&self) -> ContextOrigin {
        self.origin
    }

    /// The document root element
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.html.root_element().id()
    }

    fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Whether `id` refers to an element node in this snapshot
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Tag name of the element, lowercased by the parser
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.element(id).map(|el| el.value().name().to_string())
    }

    /// Attribute value of the element
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|el| el.value().attr(name))
            .map(ToString::to_string)
    }

    /// Whether the element carries `class` in its class list
    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Full text content of the subtree, whitespace-normalized
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        self.element(id).map_or_else(String::new, |el| {
            el.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// Parent element of the node, if any
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.html
            .tree
            .get(id)
            .and_then(|node| node.parent())
            .and_then(ElementRef::wrap)
            .map(|el| el.id())
    }

    /// Element children of the node, in document order
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.html.tree.get(id).map_or_else(Vec::new, |node| {
            node.children()
                .filter_map(ElementRef::wrap)
                .map(|el| el.id())
                .collect()
        })
    }

    /// Element descendants of the node, in document order, excluding the
    /// node itself
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.element(id).map_or_else(Vec::new, |el| {
            el.descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .map(|d| d.id())
                .collect()
        })
    }

    /// Run a CSS query, scoped to the subtree under `scope` when given,
    /// returning matches in document order
    pub fn select(&self, scope: Option<NodeId>, css: &str) -> SondarResult<Vec<NodeId>> {
        let selector = Selector::parse(css).map_err(|_| SondarError::SelectorParse {
            selector: css.to_string(),
        })?;
        Ok(match scope.and_then(|id| self.element(id)) {
            Some(el) => el.select(&selector).map(|m| m.id()).collect(),
            None => self.html.select(&selector).map(|m| m.id()).collect(),
        })
    }

    /// Stacking key declared on the element itself: the z-index parsed from
    /// its inline style, default 0 when absent or malformed
    #[must_use]
    pub fn stacking_key(&self, id: NodeId) -> i32 {
        self.attr(id, "style")
            .as_deref()
            .and_then(|style| style_property(style, "z-index"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Stacking key in effect for the element: its own z-index, or the
    /// nearest ancestor's, default 0
    #[must_use]
    pub fn effective_stacking_key(&self, id: NodeId) -> i32 {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(style) = self.attr(node, "style") {
                if let Some(value) = style_property(&style, "z-index") {
                    if let Ok(key) = value.parse() {
                        return key;
                    }
                }
            }
            current = self.parent(node);
        }
        0
    }

    /// Whether the element is rendered at all, judging from its serialized
    /// attributes. Live visibility is the session's call; this filters what
    /// the markup already rules out.
    #[must_use]
    pub fn displayed(&self, id: NodeId) -> bool {
        if self.attr(id, "hidden").is_some() {
            return false;
        }
        !self
            .attr(id, "style")
            .as_deref()
            .and_then(|style| style_property(style, "display"))
            .is_some_and(|v| v.eq_ignore_ascii_case("none"))
    }

    /// Structural path from the document root to the element, expressed as
    /// a child-combinator CSS chain with `:nth-of-type` disambiguation.
    /// This is the Live Binder's re-resolution key.
    #[must_use]
    pub fn css_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = self.element(id);
        while let Some(el) = current {
            let tag = el.value().name();
            let parent = el.parent().and_then(ElementRef::wrap);
            if parent.is_none() {
                segments.push(tag.to_string());
            } else {
                let position = el
                    .prev_siblings()
                    .filter_map(ElementRef::wrap)
                    .filter(|sib| sib.value().name() == tag)
                    .count()
                    + 1;
                segments.push(format!("{tag}:nth-of-type({position})"));
            }
            current = parent;
        }
        segments.reverse();
        segments.join(" > ")
    }

    /// Re-resolve a structural path inside this snapshot
    #[must_use]
    pub fn node_at_path(&self, path: &str) -> Option<NodeId> {
        self.select(None, path).ok()?.into_iter().next()
    }

    /// Stable identity of the element for caching: its id attribute when it
    /// has one, its structural path otherwise
    #[must_use]
    pub fn structural_id(&self, id: NodeId) -> String {
        self.attr(id, "id")
            .unwrap_or_else(|| self.css_path(id))
    }
}

/// Extract one declaration from an inline style string
fn style_property<'a>(style: &'a str, name: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Captures snapshots from the live session
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    config: SyncConfig,
}

impl SnapshotProvider {
    /// Create a provider over the given configuration
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Capture the currently active context, resetting to the top-level
    /// document first and descending into the embedded-session frame when
    /// one is present. Never fails: a transient session error falls back to
    /// a best-effort top-level snapshot.
    pub fn capture(&self, session: &dyn Session) -> Snapshot {
        match self.try_capture(session) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "snapshot capture failed, retrying top-level");
                Self::fallback(session)
            }
        }
    }

    /// Capture whatever context the session is currently in, without the
    /// top-level reset. Same best-effort fallback on error.
    pub fn capture_in_place(&self, session: &dyn Session) -> Snapshot {
        match session.page_source() {
            Ok(markup) => Snapshot::parse(&markup, ContextOrigin::Current),
            Err(err) => {
                warn!(error = %err, "in-place capture failed, retrying top-level");
                Self::fallback(session)
            }
        }
    }

    fn try_capture(&self, session: &dyn Session) -> SondarResult<Snapshot> {
        session.leave_frame()?;
        let markup = session.page_source()?;
        let top = Snapshot::parse(&markup, ContextOrigin::Top);
        if let Some(frame_selector) = &self.config.frame_selector {
            if !top.select(None, frame_selector)?.is_empty() {
                session.enter_frame(frame_selector)?;
                let inner = session.page_source()?;
                return Ok(Snapshot::parse(&inner, ContextOrigin::Frame));
            }
        }
        Ok(top)
    }

    fn fallback(session: &dyn Session) -> Snapshot {
        let _ = session.leave_frame();
        let markup = session.page_source().unwrap_or_default();
        Snapshot::parse(&markup, ContextOrigin::Top)
    }
}
