//! Session collaborator boundary.
//!
//! The engine never talks to a browser directly. Everything it needs from
//! the live session is expressed by the [`Session`] trait: markup retrieval,
//! path-addressed element access, input dispatch, in-page script evaluation
//! and rendering-context switches. Implementations wrap whatever driver the
//! suite runs on; the engine only assumes the calls are synchronous and that
//! the session is held exclusively for the lifetime of a suite run.
//!
//! Elements are addressed by structural CSS path strings (see
//! [`crate::bind::Rebind`]), never by driver-native element objects — those
//! go stale the instant the DOM re-renders.

use crate::locator::Rect;
use crate::result::SondarResult;
use serde_json::Value;

/// Keys the engine dispatches to live elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Commit key for masked numeric fields and form submission
    Enter,
    /// Focus-advance key
    Tab,
    /// Dismiss key
    Escape,
    /// Grid cursor down
    ArrowDown,
    /// Grid cursor up
    ArrowUp,
    /// Caret left
    ArrowLeft,
    /// Caret right
    ArrowRight,
    /// Page down
    PageDown,
    /// Page up
    PageUp,
    /// Delete forward
    Delete,
    /// Delete backward
    Backspace,
}

impl Key {
    /// Get the wire name for this key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Tab => "Tab",
            Self::Escape => "Escape",
            Self::ArrowDown => "ArrowDown",
            Self::ArrowUp => "ArrowUp",
            Self::ArrowLeft => "ArrowLeft",
            Self::ArrowRight => "ArrowRight",
            Self::PageDown => "PageDown",
            Self::PageUp => "PageUp",
            Self::Delete => "Delete",
            Self::Backspace => "Backspace",
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous boundary to the external browser-automation driver.
///
/// All methods take `&self`: the engine is single-threaded and cooperative,
/// so implementations are free to use interior mutability without locks.
/// Every write to field state goes through the input commit loop; the rest
/// of the engine only reads.
pub trait Session {
    /// Fully rendered markup of the current browsing context
    fn page_source(&self) -> SondarResult<String>;

    /// Switch the active rendering context into the frame matched by
    /// `selector`
    fn enter_frame(&self, selector: &str) -> SondarResult<()>;

    /// Switch the active rendering context back to the top-level document
    fn leave_frame(&self) -> SondarResult<()>;

    /// Whether an element currently exists at `path` in the live DOM
    fn exists(&self, path: &str) -> SondarResult<bool>;

    /// Read the value attribute of the element at `path`
    fn read_value(&self, path: &str) -> SondarResult<String>;

    /// Overwrite the value attribute of the element at `path`
    fn write_value(&self, path: &str, value: &str) -> SondarResult<()>;

    /// Type `text` into the element at `path` via direct key dispatch
    fn send_keys(&self, path: &str, text: &str) -> SondarResult<()>;

    /// Type `text` into the element at `path` via a synthetic action chain
    fn dispatch_chain(&self, path: &str, text: &str) -> SondarResult<()>;

    /// Focus the element at `path` from script, then type `text`
    fn focus_and_type(&self, path: &str, text: &str) -> SondarResult<()>;

    /// Dispatch a single key to the element at `path`
    fn press_key(&self, path: &str, key: Key) -> SondarResult<()>;

    /// Click the element at `path`
    fn click(&self, path: &str) -> SondarResult<()>;

    /// Evaluate an expression in-page and return its result
    fn execute(&self, expression: &str) -> SondarResult<Value>;

    /// Whether the element at `path` is currently rendered visible
    fn is_displayed(&self, path: &str) -> SondarResult<bool>;

    /// Whether the element at `path` accepts input
    fn is_enabled(&self, path: &str) -> SondarResult<bool>;

    /// On-screen geometry of the element at `path`, if it is laid out
    fn rect(&self, path: &str) -> SondarResult<Option<Rect>>;

    /// Capture a screenshot of the current viewport as raw image bytes
    fn screenshot(&self) -> SondarResult<Vec<u8>>;
}
