//! Locator Engine.
//!
//! Turns a human-level search intent — "the field labeled X", "the button
//! named Y" — into candidate nodes within a container. Five strategies
//! cover the target application's unhelpful markup: exact text for buttons
//! and menu items, raw CSS for the rare stable structure, text-within-scope
//! for labels decorated with required-field punctuation, in-page script for
//! predicates that need live computed state, and geometry for layouts where
//! nothing but pixel adjacency ties a label to its input.
//!
//! Resolution is referentially transparent: the same spec against the same
//! snapshot yields the same candidates in the same order, and an empty
//! result is information, not an error. Callers that must not re-match an
//! already-consumed element pass an explicit per-operation exclusion set.

use crate::config::SyncConfig;
use crate::result::{SondarError, SondarResult};
use crate::session::Session;
use crate::snapshot::{NodeId, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Candidate selector used by the geometry strategy when the caller does
/// not narrow the input kind
pub const DEFAULT_INPUT_SELECTOR: &str = "input, select, textarea";

/// Container extent assumed when the session cannot report one, used to
/// scale the geometry tolerance
const FALLBACK_CONTAINER_EXTENT: (f32, f32) = (800.0, 600.0);

// =============================================================================
// GEOMETRY PRIMITIVES
// =============================================================================

/// A point in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.hypot(dy)
    }
}

/// On-screen extent of a live element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X position
    pub x: f32,
    /// Y position
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// Create a new rect
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check whether a point lies inside this rect
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

// =============================================================================
// LOCATOR SPEC
// =============================================================================

/// Matching strategy for a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Node's full text equals the term after trimming
    ExactText,
    /// Structural CSS query scoped to the container
    Css,
    /// Text containment within a secondary CSS scope
    Mixed,
    /// Predicate delegated to an in-page expression
    Script,
    /// Label located by text, input chosen by on-screen adjacency
    LabelGeometry,
}

/// Geometric direction hint for the geometry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// The input sits to the right of its label
    Right,
    /// The input sits below its label
    Down,
}

/// Search intent: a pure value object, no mutable state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorSpec {
    /// Primary term: text, selector or script expression per strategy
    pub term: String,
    /// Matching strategy
    pub strategy: Strategy,
    /// Secondary term: the CSS scope for Mixed, the candidate selector for
    /// LabelGeometry
    pub secondary: Option<String>,
    /// Desired ordinal among equally-ranked candidates
    pub position: usize,
    /// Direction restriction for the geometry strategy
    pub direction: Option<Direction>,
    /// Multiplier applied to the geometry tolerance for unusually spaced
    /// layouts
    pub tolerance_factor: f32,
    /// Require exactly one top-ranked candidate
    pub strict: bool,
}

impl LocatorSpec {
    fn with_strategy(term: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            term: term.into(),
            strategy,
            secondary: None,
            position: 0,
            direction: None,
            tolerance_factor: 1.0,
            strict: false,
        }
    }

    /// Locate by exact text
    #[must_use]
    pub fn text(term: impl Into<String>) -> Self {
        Self::with_strategy(term, Strategy::ExactText)
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::with_strategy(selector, Strategy::Css)
    }

    /// Locate by text containment within a CSS scope
    #[must_use]
    pub fn mixed(term: impl Into<String>, scope: impl Into<String>) -> Self {
        let mut spec = Self::with_strategy(term, Strategy::Mixed);
        spec.secondary = Some(scope.into());
        spec
    }

    /// Locate by in-page script predicate
    #[must_use]
    pub fn script(expression: impl Into<String>) -> Self {
        Self::with_strategy(expression, Strategy::Script)
    }

    /// Locate the input adjacent to the label with this text
    #[must_use]
    pub fn label(term: impl Into<String>) -> Self {
        Self::with_strategy(term, Strategy::LabelGeometry)
    }

    /// Set the desired ordinal among equally-ranked candidates
    #[must_use]
    pub const fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Set the secondary term
    #[must_use]
    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    /// Restrict the geometry strategy to one direction
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Scale the geometry tolerance
    #[must_use]
    pub const fn with_tolerance_factor(mut self, factor: f32) -> Self {
        self.tolerance_factor = factor;
        self
    }

    /// Require exactly one top-ranked candidate
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Short human-readable form for error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self.strategy {
            Strategy::ExactText => format!("text '{}'", self.term),
            Strategy::Css => format!("selector '{}'", self.term),
            Strategy::Mixed => format!(
                "text '{}' within '{}'",
                self.term,
                self.secondary.as_deref().unwrap_or("*")
            ),
            Strategy::Script => format!("script <{}>", self.term),
            Strategy::LabelGeometry => format!("label '{}'", self.term),
        }
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves locator specs against snapshots
#[derive(Debug, Clone)]
pub struct Resolver {
    config: SyncConfig,
}

impl Resolver {
    /// Create a resolver over the given configuration
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Resolve `spec` within `container`, returning candidates best-first.
    ///
    /// Candidates already consumed by the current operation are skipped via
    /// `exclusions`. An empty result is `Ok`: the caller decides whether
    /// absence is expected or fatal.
    pub fn resolve(
        &self,
        session: &dyn Session,
        snapshot: &Snapshot,
        container: NodeId,
        spec: &LocatorSpec,
        exclusions: &HashSet<NodeId>,
    ) -> SondarResult<Vec<NodeId>> {
        let mut candidates = match spec.strategy {
            Strategy::ExactText => {
                Self::by_text(snapshot, container, &spec.term, TextMatch::Exact)
            }
            Strategy::Css => snapshot.select(Some(container), &spec.term)?,
            Strategy::Mixed => {
                let scope = spec.secondary.as_deref().unwrap_or("*");
                snapshot
                    .select(Some(container), scope)?
                    .into_iter()
                    .filter(|id| contains_term(&snapshot.text(*id), &spec.term))
                    .filter(|id| {
                        !snapshot
                            .children(*id)
                            .iter()
                            .any(|child| contains_term(&snapshot.text(*child), &spec.term))
                    })
                    .collect()
            }
            Strategy::Script => {
                if truthy(&session.execute(&spec.term)?) {
                    vec![container]
                } else {
                    Vec::new()
                }
            }
            Strategy::LabelGeometry => {
                self.by_geometry(session, snapshot, container, spec, exclusions)?
            }
        };

        candidates.retain(|id| !exclusions.contains(id));
        if spec.strategy != Strategy::LabelGeometry {
            // Overlay elements beat background duplicates with the same
            // label; document order breaks the remaining ties (the sort is
            // stable over the document-ordered candidate list).
            candidates
                .sort_by_key(|id| std::cmp::Reverse(snapshot.effective_stacking_key(*id)));
        }
        Ok(candidates)
    }

    /// Resolve to a single node, applying the tie-break discipline:
    /// stacking order, then document order, then the declared ordinal.
    ///
    /// `Ok(None)` means nothing matched yet — the caller's wait loop keeps
    /// polling. `Ambiguous` is raised only in strict mode, when more than
    /// one candidate shares the top stacking rank and no ordinal was
    /// declared.
    pub fn resolve_one(
        &self,
        session: &dyn Session,
        snapshot: &Snapshot,
        container: NodeId,
        spec: &LocatorSpec,
        exclusions: &HashSet<NodeId>,
    ) -> SondarResult<Option<NodeId>> {
        let candidates = self.resolve(session, snapshot, container, spec, exclusions)?;
        if candidates.is_empty() || spec.position >= candidates.len() {
            return Ok(None);
        }
        if spec.strict && spec.position == 0 && candidates.len() > 1 {
            let top_key = snapshot.effective_stacking_key(candidates[0]);
            let top_ranked = candidates
                .iter()
                .filter(|id| snapshot.effective_stacking_key(**id) == top_key)
                .count();
            if top_ranked > 1 {
                return Err(SondarError::Ambiguous {
                    locator: spec.describe(),
                    count: top_ranked,
                });
            }
        }
        Ok(Some(candidates[spec.position]))
    }

    fn by_text(
        snapshot: &Snapshot,
        container: NodeId,
        term: &str,
        mode: TextMatch,
    ) -> Vec<NodeId> {
        let term = normalize_term(term);
        snapshot
            .descendants(container)
            .into_iter()
            .filter(|id| mode.matches(&snapshot.text(*id), &term))
            // Innermost match only: when a node matches, every ancestor up
            // the chain matches too, so drop nodes with a matching child.
            .filter(|id| {
                !snapshot
                    .children(*id)
                    .iter()
                    .any(|child| mode.matches(&snapshot.text(*child), &term))
            })
            .collect()
    }

    fn by_geometry(
        &self,
        session: &dyn Session,
        snapshot: &Snapshot,
        container: NodeId,
        spec: &LocatorSpec,
        exclusions: &HashSet<NodeId>,
    ) -> SondarResult<Vec<NodeId>> {
        let labels = {
            let exact = Self::by_text(snapshot, container, &spec.term, TextMatch::Exact);
            if exact.is_empty() {
                Self::by_text(snapshot, container, &spec.term, TextMatch::Contains)
            } else {
                exact
            }
        };
        let Some(label) = labels.first().copied() else {
            return Ok(Vec::new());
        };
        let Some(label_rect) = session.rect(&snapshot.css_path(label))? else {
            return Ok(Vec::new());
        };
        let anchor = label_rect.center();

        let (base_w, base_h) = session
            .rect(&snapshot.css_path(container))?
            .map_or(FALLBACK_CONTAINER_EXTENT, |r| (r.width, r.height));
        let tolerance = self.config.geometry_tolerance * spec.tolerance_factor;
        let tol_x = base_w * tolerance;
        let tol_y = base_h * tolerance;

        // A directed search additionally requires the candidate to stay in
        // the label's own row (Right) or column (Down); the label's extent
        // is the alignment band, scaled by the same caller multiplier.
        let band_x = label_rect.width.max(1.0) * spec.tolerance_factor;
        let band_y = label_rect.height.max(1.0) * spec.tolerance_factor;

        let candidate_selector = spec.secondary.as_deref().unwrap_or(DEFAULT_INPUT_SELECTOR);
        let mut scored: Vec<(f32, NodeId)> = Vec::new();
        for id in snapshot.select(Some(container), candidate_selector)? {
            if exclusions.contains(&id) || !snapshot.displayed(id) {
                continue;
            }
            let Some(rect) = session.rect(&snapshot.css_path(id))? else {
                continue;
            };
            let center = rect.center();
            let dx = center.x - anchor.x;
            let dy = center.y - anchor.y;
            let score = match spec.direction {
                Some(Direction::Right) if dx > 0.0 && dx <= tol_x && dy.abs() <= band_y => dx,
                Some(Direction::Down) if dy > 0.0 && dy <= tol_y && dx.abs() <= band_x => dy,
                None if dx.abs() <= tol_x && dy.abs() <= tol_y => anchor.distance_to(&center),
                _ => continue,
            };
            scored.push((score, id));
        }
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored.into_iter().map(|(_, id)| id).collect())
    }
}

#[derive(Debug, Clone, Copy)]
enum TextMatch {
    Exact,
    Contains,
}

impl TextMatch {
    fn matches(self, text: &str, term: &str) -> bool {
        let text = normalize_term(text);
        match self {
            Self::Exact => text == term,
            Self::Contains => text.contains(term),
        }
    }
}

fn normalize_term(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_term(text: &str, term: &str) -> bool {
    normalize_term(text).contains(&normalize_term(term))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSession;
    use crate::snapshot::ContextOrigin;

    fn resolver() -> Resolver {
        Resolver::new(SyncConfig::new())
    }

    fn parse(markup: &str) -> Snapshot {
        Snapshot::parse(markup, ContextOrigin::Top)
    }

    fn no_exclusions() -> HashSet<NodeId> {
        HashSet::new()
    }

    mod geometry_primitive_tests {
        use super::*;

        #[test]
        fn test_rect_center() {
            let rect = Rect::new(10.0, 20.0, 100.0, 40.0);
            assert_eq!(rect.center(), Point::new(60.0, 40.0));
        }

        #[test]
        fn test_rect_contains() {
            let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
            assert!(rect.contains(&Point::new(50.0, 50.0)));
            assert!(rect.contains(&Point::new(0.0, 100.0)));
            assert!(!rect.contains(&Point::new(101.0, 50.0)));
        }

        #[test]
        fn test_point_distance() {
            let a = Point::new(0.0, 0.0);
            let b = Point::new(3.0, 4.0);
            assert!((a.distance_to(&b) - 5.0).abs() < f32::EPSILON);
        }
    }

    mod spec_tests {
        use super::*;

        #[test]
        fn test_constructors_set_strategy() {
            assert_eq!(LocatorSpec::text("x").strategy, Strategy::ExactText);
            assert_eq!(LocatorSpec::css("div").strategy, Strategy::Css);
            assert_eq!(LocatorSpec::mixed("x", "label").strategy, Strategy::Mixed);
            assert_eq!(LocatorSpec::script("1").strategy, Strategy::Script);
            assert_eq!(LocatorSpec::label("x").strategy, Strategy::LabelGeometry);
        }

        #[test]
        fn test_builder_chain() {
            let spec = LocatorSpec::label("Code")
                .with_direction(Direction::Right)
                .with_tolerance_factor(2.0)
                .with_position(1)
                .with_strict(true);
            assert_eq!(spec.direction, Some(Direction::Right));
            assert!((spec.tolerance_factor - 2.0).abs() < f32::EPSILON);
            assert_eq!(spec.position, 1);
            assert!(spec.strict);
        }

        #[test]
        fn test_describe() {
            assert_eq!(LocatorSpec::text("Confirm").describe(), "text 'Confirm'");
            assert_eq!(
                LocatorSpec::mixed("Code", "label").describe(),
                "text 'Code' within 'label'"
            );
        }
    }

    mod exact_text_tests {
        use super::*;

        #[test]
        fn test_matches_innermost_element() {
            let snap = parse("<div><button>Confirm</button></div>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Confirm"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(snap.tag(found[0]).as_deref(), Some("button"));
        }

        #[test]
        fn test_trims_and_normalizes_whitespace() {
            let snap = parse("<button>  Confirm\n  Order </button>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Confirm Order"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found.len(), 1);
        }

        #[test]
        fn test_no_partial_match() {
            let snap = parse("<button>Confirm All</button>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Confirm"),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found.is_empty());
        }

        #[test]
        fn test_overlay_preferred_over_background_duplicate() {
            // The background button comes first in document order but the
            // overlay carries the higher stacking key.
            let snap = parse(
                "<div style='z-index: 100'><button id='back'>Confirm</button></div>\
                 <div style='z-index: 200'><button id='front'>Confirm</button></div>",
            );
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Confirm"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(snap.attr(found[0], "id").as_deref(), Some("front"));
            assert_eq!(snap.attr(found[1], "id").as_deref(), Some("back"));
        }

        #[test]
        fn test_scoped_to_container() {
            let snap = parse(
                "<div id='a'><button>Save</button></div>\
                 <div id='b'><button>Save</button></div>",
            );
            let session = MockSession::new("");
            let container = snap.select(None, "#b").unwrap()[0];
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    container,
                    &LocatorSpec::text("Save"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(snap.parent(found[0]), Some(container));
        }
    }

    mod css_and_mixed_tests {
        use super::*;

        #[test]
        fn test_css_strategy() {
            let snap = parse("<input name='code'><input name='desc'>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::css("input[name='code']"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(snap.attr(found[0], "name").as_deref(), Some("code"));
        }

        #[test]
        fn test_mixed_matches_decorated_label() {
            // Required-field asterisk defeats exact equality; containment
            // within the label scope still finds it.
            let snap = parse("<label>Customer Code *</label><label>Other</label>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::mixed("Customer Code", "label"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found.len(), 1);
            assert!(snap.text(found[0]).contains('*'));
        }

        #[test]
        fn test_mixed_prefers_innermost() {
            let snap = parse("<div class='box'><span class='box'>Total</span></div>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::mixed("Total", ".box"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(snap.tag(found[0]).as_deref(), Some("span"));
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_truthy_result_resolves_container() {
            let snap = parse("<div id='x'>content</div>");
            let session = MockSession::new("");
            session.set_script_result(
                "document.activeElement !== null",
                serde_json::json!(true),
            );
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::script("document.activeElement !== null"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(found, vec![snap.root()]);
        }

        #[test]
        fn test_falsy_result_is_empty() {
            let snap = parse("<div>content</div>");
            let session = MockSession::new("");
            session.set_script_result("window.busy", serde_json::json!(0));
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::script("window.busy"),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found.is_empty());
            // Unknown expressions evaluate to null, also falsy.
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::script("window.unknown"),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found.is_empty());
        }
    }

    mod geometry_tests {
        use super::*;

        const FORM: &str = "<div id='form'>\
            <span>Code</span>\
            <input name='right'>\
            <input name='below'>\
            <input name='far'>\
            </div>";

        fn geometry_session(snap: &Snapshot) -> MockSession {
            let session = MockSession::new("");
            let label = snap.select(None, "span").unwrap()[0];
            let form = snap.select(None, "#form").unwrap()[0];
            session.set_rect(snap.css_path(label), Rect::new(100.0, 100.0, 60.0, 20.0));
            session.set_rect(snap.css_path(form), Rect::new(0.0, 0.0, 800.0, 600.0));
            let rects = [
                ("right", Rect::new(170.0, 100.0, 80.0, 20.0)),
                ("below", Rect::new(100.0, 200.0, 120.0, 20.0)),
                ("far", Rect::new(700.0, 560.0, 80.0, 20.0)),
            ];
            for (name, rect) in rects {
                let node = snap
                    .select(None, &format!("input[name='{name}']"))
                    .unwrap()[0];
                session.set_rect(snap.css_path(node), rect);
            }
            session
        }

        #[test]
        fn test_direction_right_never_returns_below() {
            let snap = parse(FORM);
            let session = geometry_session(&snap);
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::label("Code").with_direction(Direction::Right),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(snap.attr(found[0], "name").as_deref(), Some("right"));
            assert!(found
                .iter()
                .all(|id| snap.attr(*id, "name").as_deref() != Some("below")));
        }

        #[test]
        fn test_direction_down_never_returns_right() {
            let snap = parse(FORM);
            let session = geometry_session(&snap);
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::label("Code").with_direction(Direction::Down),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(snap.attr(found[0], "name").as_deref(), Some("below"));
            assert!(found
                .iter()
                .all(|id| snap.attr(*id, "name").as_deref() != Some("right")));
        }

        #[test]
        fn test_undirected_picks_euclidean_nearest() {
            let snap = parse(FORM);
            let session = geometry_session(&snap);
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::label("Code"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(snap.attr(found[0], "name").as_deref(), Some("right"));
        }

        #[test]
        fn test_tolerance_excludes_distant_candidates() {
            let snap = parse(FORM);
            let session = geometry_session(&snap);
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::label("Code"),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found
                .iter()
                .all(|id| snap.attr(*id, "name").as_deref() != Some("far")));
        }

        #[test]
        fn test_tolerance_factor_widens_the_net() {
            let snap = parse(FORM);
            let session = geometry_session(&snap);
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::label("Code").with_tolerance_factor(4.0),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found
                .iter()
                .any(|id| snap.attr(*id, "name").as_deref() == Some("far")));
        }

        #[test]
        fn test_missing_label_rect_yields_empty() {
            let snap = parse(FORM);
            let session = MockSession::new("");
            let found = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::label("Code"),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found.is_empty());
        }
    }

    mod exclusion_tests {
        use super::*;

        #[test]
        fn test_excluded_nodes_are_skipped() {
            let snap = parse("<button>Go</button><button>Go</button>");
            let session = MockSession::new("");
            let all = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Go"),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(all.len(), 2);

            let exclusions: HashSet<NodeId> = [all[0]].into_iter().collect();
            let remaining = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Go"),
                    &exclusions,
                )
                .unwrap();
            assert_eq!(remaining, vec![all[1]]);
        }
    }

    mod resolve_one_tests {
        use super::*;

        #[test]
        fn test_idempotent_resolution() {
            let snap = parse("<button>A</button><button>B</button><button>A</button>");
            let session = MockSession::new("");
            let spec = LocatorSpec::text("A");
            let first = resolver()
                .resolve(&session, &snap, snap.root(), &spec, &no_exclusions())
                .unwrap();
            let second = resolver()
                .resolve(&session, &snap, snap.root(), &spec, &no_exclusions())
                .unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn test_none_when_absent() {
            let snap = parse("<p>x</p>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve_one(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Missing"),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found.is_none());
        }

        #[test]
        fn test_position_selects_ordinal() {
            let snap = parse("<button>Go</button><button>Go</button>");
            let session = MockSession::new("");
            let all = resolver()
                .resolve(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Go"),
                    &no_exclusions(),
                )
                .unwrap();
            let second = resolver()
                .resolve_one(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Go").with_position(1),
                    &no_exclusions(),
                )
                .unwrap();
            assert_eq!(second, Some(all[1]));
        }

        #[test]
        fn test_position_beyond_matches_is_none() {
            let snap = parse("<button>Go</button>");
            let session = MockSession::new("");
            let found = resolver()
                .resolve_one(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Go").with_position(3),
                    &no_exclusions(),
                )
                .unwrap();
            assert!(found.is_none());
        }

        #[test]
        fn test_strict_raises_ambiguous_on_equal_rank() {
            let snap = parse("<button>Go</button><button>Go</button>");
            let session = MockSession::new("");
            let result = resolver().resolve_one(
                &session,
                &snap,
                snap.root(),
                &LocatorSpec::text("Go").with_strict(true),
                &no_exclusions(),
            );
            assert!(matches!(
                result,
                Err(SondarError::Ambiguous { count: 2, .. })
            ));
        }

        #[test]
        fn test_strict_accepts_stacking_discrimination() {
            let snap = parse(
                "<div style='z-index: 1'><button>Go</button></div>\
                 <div style='z-index: 2'><button id='top'>Go</button></div>",
            );
            let session = MockSession::new("");
            let found = resolver()
                .resolve_one(
                    &session,
                    &snap,
                    snap.root(),
                    &LocatorSpec::text("Go").with_strict(true),
                    &no_exclusions(),
                )
                .unwrap()
                .unwrap();
            assert_eq!(snap.attr(found, "id").as_deref(), Some("top"));
        }
    }
}
