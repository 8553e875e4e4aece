//! Scriptable in-memory session for tests.
//!
//! [`MockSession`] implements [`Session`](crate::session::Session) over
//! scripted page markup: pages can be revised on a timer (elements that
//! appear late), swapped when a key is dispatched (grid cursor movement) and
//! echo written values back through masks or bullet obscuring. Write-failure
//! injection drives the commit loop's escalation path. Everything the engine
//! dispatches is recorded for assertions.
//!
//! The mock is part of the public surface so downstream suites can test
//! their own page flows without a browser.

use crate::field::mask::apply_mask;
use crate::locator::Rect;
use crate::result::{SondarError, SondarResult};
use crate::session::{Key, Session};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// One recorded write dispatch
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// Structural path the write targeted
    pub path: String,
    /// Text that was typed
    pub text: String,
    /// Technique identifier: 0 key dispatch, 1 action chain, 2 scripted
    pub technique: u8,
}

#[derive(Debug, Default)]
struct MockState {
    initial: String,
    scheduled: Vec<(Duration, String)>,
    overrides: Vec<String>,
    started: Option<Instant>,
    in_frame: Option<String>,
    frame_sources: HashMap<String, String>,
    values: HashMap<String, String>,
    masks: HashMap<String, String>,
    obscured: HashSet<String>,
    reject_writes: HashMap<String, usize>,
    disabled: HashSet<String>,
    hidden: HashSet<String>,
    rects: HashMap<String, Rect>,
    scripts: HashMap<String, Value>,
    page_failures: usize,
    key_pages: HashMap<Key, VecDeque<String>>,
    writes: Vec<WriteRecord>,
    keys: Vec<(String, Key)>,
    clicks: Vec<String>,
    frames_entered: Vec<String>,
    screenshots: usize,
}

/// Scriptable session double
#[derive(Debug, Default)]
pub struct MockSession {
    state: RefCell<MockState>,
}

impl MockSession {
    /// Create a mock serving `page` as the rendered markup
    #[must_use]
    pub fn new(page: impl Into<String>) -> Self {
        let mock = Self::default();
        mock.state.borrow_mut().initial = page.into();
        mock
    }

    /// Replace the current page immediately
    pub fn push_page(&self, page: impl Into<String>) {
        self.state.borrow_mut().overrides.push(page.into());
    }

    /// Serve `page` instead of the current one once `after` has elapsed
    /// since the first `page_source` call
    pub fn schedule_page(&self, after: Duration, page: impl Into<String>) {
        self.state.borrow_mut().scheduled.push((after, page.into()));
    }

    /// Serve `page` as the next revision after `key` is dispatched anywhere
    pub fn queue_page_on_key(&self, key: Key, page: impl Into<String>) {
        self.state
            .borrow_mut()
            .key_pages
            .entry(key)
            .or_default()
            .push_back(page.into());
    }

    /// Serve `page` as the content of the frame matched by `selector`
    pub fn set_frame_source(&self, selector: impl Into<String>, page: impl Into<String>) {
        self.state
            .borrow_mut()
            .frame_sources
            .insert(selector.into(), page.into());
    }

    /// Seed the value attribute of the element at `path`
    pub fn set_value(&self, path: impl Into<String>, value: impl Into<String>) {
        self.state
            .borrow_mut()
            .values
            .insert(path.into(), value.into());
    }

    /// Echo the value at `path` through `mask` on read-back
    pub fn set_mask(&self, path: impl Into<String>, mask: impl Into<String>) {
        self.state
            .borrow_mut()
            .masks
            .insert(path.into(), mask.into());
    }

    /// Echo the value at `path` as bullet characters (secure field)
    pub fn set_obscured(&self, path: impl Into<String>) {
        self.state.borrow_mut().obscured.insert(path.into());
    }

    /// Swallow the next `count` writes to `path` without updating its value
    pub fn reject_writes(&self, path: impl Into<String>, count: usize) {
        self.state
            .borrow_mut()
            .reject_writes
            .insert(path.into(), count);
    }

    /// Mark the element at `path` disabled
    pub fn set_disabled(&self, path: impl Into<String>) {
        self.state.borrow_mut().disabled.insert(path.into());
    }

    /// Mark the element at `path` hidden
    pub fn set_hidden(&self, path: impl Into<String>) {
        self.state.borrow_mut().hidden.insert(path.into());
    }

    /// Set the on-screen geometry reported for `path`
    pub fn set_rect(&self, path: impl Into<String>, rect: Rect) {
        self.state.borrow_mut().rects.insert(path.into(), rect);
    }

    /// Set the result of evaluating `expression` in-page
    pub fn set_script_result(&self, expression: impl Into<String>, result: Value) {
        self.state
            .borrow_mut()
            .scripts
            .insert(expression.into(), result);
    }

    /// Make the next `count` `page_source` calls fail with a session error
    pub fn fail_next_page_loads(&self, count: usize) {
        self.state.borrow_mut().page_failures = count;
    }

    /// All recorded write dispatches, in order
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.borrow().writes.clone()
    }

    /// Technique identifiers of recorded writes, in order
    #[must_use]
    pub fn techniques(&self) -> Vec<u8> {
        self.state.borrow().writes.iter().map(|w| w.technique).collect()
    }

    /// All recorded key dispatches, in order
    #[must_use]
    pub fn keys_pressed(&self) -> Vec<(String, Key)> {
        self.state.borrow().keys.clone()
    }

    /// All recorded clicks, in order
    #[must_use]
    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    /// Frame selectors entered, in order
    #[must_use]
    pub fn frames_entered(&self) -> Vec<String> {
        self.state.borrow().frames_entered.clone()
    }

    /// Number of screenshots captured
    #[must_use]
    pub fn screenshot_count(&self) -> usize {
        self.state.borrow().screenshots
    }

    fn current_page(state: &mut MockState) -> String {
        if let Some(page) = state.overrides.last() {
            return page.clone();
        }
        let started = *state.started.get_or_insert_with(Instant::now);
        let elapsed = started.elapsed();
        state
            .scheduled
            .iter()
            .filter(|(after, _)| *after <= elapsed)
            .next_back()
            .map_or_else(|| state.initial.clone(), |(_, page)| page.clone())
    }

    fn record_write(&self, path: &str, text: &str, technique: u8) -> SondarResult<()> {
        let mut state = self.state.borrow_mut();
        state.writes.push(WriteRecord {
            path: path.to_string(),
            text: text.to_string(),
            technique,
        });
        let rejected = match state.reject_writes.get_mut(path) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if !rejected {
            state.values.insert(path.to_string(), text.to_string());
        }
        Ok(())
    }
}

impl Session for MockSession {
    fn page_source(&self) -> SondarResult<String> {
        let mut state = self.state.borrow_mut();
        if state.page_failures > 0 {
            state.page_failures -= 1;
            return Err(SondarError::session("simulated page load failure"));
        }
        if let Some(frame) = state.in_frame.clone() {
            if let Some(source) = state.frame_sources.get(&frame) {
                return Ok(source.clone());
            }
        }
        Ok(Self::current_page(&mut state))
    }

    fn enter_frame(&self, selector: &str) -> SondarResult<()> {
        let mut state = self.state.borrow_mut();
        state.in_frame = Some(selector.to_string());
        state.frames_entered.push(selector.to_string());
        Ok(())
    }

    fn leave_frame(&self) -> SondarResult<()> {
        self.state.borrow_mut().in_frame = None;
        Ok(())
    }

    fn exists(&self, path: &str) -> SondarResult<bool> {
        let mut state = self.state.borrow_mut();
        let page = if let Some(frame) = state.in_frame.clone() {
            state
                .frame_sources
                .get(&frame)
                .cloned()
                .unwrap_or_else(|| Self::current_page(&mut state))
        } else {
            Self::current_page(&mut state)
        };
        drop(state);
        let snapshot = crate::snapshot::Snapshot::parse(
            &page,
            crate::snapshot::ContextOrigin::Current,
        );
        Ok(snapshot.node_at_path(path).is_some())
    }

    fn read_value(&self, path: &str) -> SondarResult<String> {
        let state = self.state.borrow();
        let raw = state.values.get(path).cloned().unwrap_or_default();
        if state.obscured.contains(path) {
            return Ok("\u{2022}".repeat(raw.chars().count()));
        }
        if let Some(mask) = state.masks.get(path) {
            return Ok(apply_mask(&raw, mask));
        }
        Ok(raw)
    }

    fn write_value(&self, path: &str, value: &str) -> SondarResult<()> {
        self.state
            .borrow_mut()
            .values
            .insert(path.to_string(), value.to_string());
        Ok(())
    }

    fn send_keys(&self, path: &str, text: &str) -> SondarResult<()> {
        self.record_write(path, text, 0)
    }

    fn dispatch_chain(&self, path: &str, text: &str) -> SondarResult<()> {
        self.record_write(path, text, 1)
    }

    fn focus_and_type(&self, path: &str, text: &str) -> SondarResult<()> {
        self.record_write(path, text, 2)
    }

    fn press_key(&self, path: &str, key: Key) -> SondarResult<()> {
        let mut state = self.state.borrow_mut();
        state.keys.push((path.to_string(), key));
        if let Some(queue) = state.key_pages.get_mut(&key) {
            if let Some(page) = queue.pop_front() {
                state.overrides.push(page);
            }
        }
        Ok(())
    }

    fn click(&self, path: &str) -> SondarResult<()> {
        self.state.borrow_mut().clicks.push(path.to_string());
        Ok(())
    }

    fn execute(&self, expression: &str) -> SondarResult<Value> {
        Ok(self
            .state
            .borrow()
            .scripts
            .get(expression)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn is_displayed(&self, path: &str) -> SondarResult<bool> {
        Ok(!self.state.borrow().hidden.contains(path))
    }

    fn is_enabled(&self, path: &str) -> SondarResult<bool> {
        Ok(!self.state.borrow().disabled.contains(path))
    }

    fn rect(&self, path: &str) -> SondarResult<Option<Rect>> {
        Ok(self.state.borrow().rects.get(path).copied())
    }

    fn screenshot(&self) -> SondarResult<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        state.screenshots += 1;
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}
