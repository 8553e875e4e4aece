//! Grid Indexer.
//!
//! Tabular regions expose no stable row ids and no header metadata: columns
//! are addressed by header text, and the "current" row only reveals itself
//! through a marker class on one of its cells. The indexer maps header text
//! to column ordinals (cached per container identity), moves the row cursor
//! by dispatching directional keys and re-polling, and disambiguates
//! multi-grid screens by caller-supplied ordinal over the same z-order
//! policy the layer resolver applies to containers, one level down.
//!
//! The header cache is invalidated the moment the container's structural id
//! changes: a different rendering of "the same" grid is a different grid.

use crate::config::SyncConfig;
use crate::layer::Container;
use crate::result::{SondarError, SondarResult};
use crate::session::{Key, Session};
use crate::snapshot::{NodeId, Snapshot, SnapshotProvider};
use crate::wait::{WaitOptions, Waiter};
use std::collections::HashMap;

/// Maps header text to column ordinals and drives the row cursor
#[derive(Debug)]
pub struct GridIndexer {
    config: SyncConfig,
    provider: SnapshotProvider,
    last_container: Option<String>,
    columns: HashMap<usize, HashMap<String, usize>>,
}

impl GridIndexer {
    /// Create an indexer over the given configuration
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            provider: SnapshotProvider::new(config.clone()),
            config,
            last_container: None,
            columns: HashMap::new(),
        }
    }

    /// Ordinal of the column whose header reads `header_text`, in the
    /// `grid_ordinal`-th grid of `container`.
    ///
    /// Header cells are scanned once per container identity; repeat lookups
    /// hit the cache.
    pub fn column_of(
        &mut self,
        snapshot: &Snapshot,
        container: &Container,
        grid_ordinal: usize,
        header_text: &str,
    ) -> SondarResult<usize> {
        self.revalidate(&container.structural_id);
        if !self.columns.contains_key(&grid_ordinal) {
            let grid = self.grid(snapshot, container, grid_ordinal)?;
            let mapping = Self::scan_headers(snapshot, grid)?;
            self.columns.insert(grid_ordinal, mapping);
        }
        let wanted = normalize(header_text);
        self.columns[&grid_ordinal]
            .get(&wanted)
            .copied()
            .ok_or_else(|| SondarError::NotFound {
                locator: format!("column '{header_text}' in grid {grid_ordinal}"),
                timeout_ms: 0,
            })
    }

    /// Move the row cursor of the `grid_ordinal`-th grid onto `row_ordinal`.
    ///
    /// Each step dispatches one directional key and re-polls until the
    /// marker class reports the cursor on the expected row.
    pub fn select_row(
        &mut self,
        session: &dyn Session,
        snapshot: &Snapshot,
        container: &Container,
        grid_ordinal: usize,
        row_ordinal: usize,
    ) -> SondarResult<()> {
        self.revalidate(&container.structural_id);
        let grid = self.grid(snapshot, container, grid_ordinal)?;
        let grid_path = snapshot.css_path(grid);
        let marker = self.config.row_marker.clone();

        let rows = data_rows(snapshot, grid);
        if row_ordinal >= rows.len() {
            return Err(SondarError::NotFound {
                locator: format!("row {row_ordinal} in grid {grid_ordinal}"),
                timeout_ms: 0,
            });
        }

        let mut current = marked_row_at(snapshot, &grid_path, &marker).unwrap_or(0);
        let waiter = Waiter::new(session, self.provider.clone());
        let options = WaitOptions::from_config(&self.config);
        while current != row_ordinal {
            let (key, next) = if current < row_ordinal {
                (Key::ArrowDown, current + 1)
            } else {
                (Key::ArrowUp, current - 1)
            };
            session.press_key(&grid_path, key)?;
            waiter.wait_until(
                &format!("grid cursor on row {next}"),
                &options,
                |fresh| marked_row_at(fresh, &grid_path, &marker) == Some(next),
            )?;
            current = next;
        }
        Ok(())
    }

    /// Append a new line to the `grid_ordinal`-th grid: dispatch the
    /// cursor-down key and re-poll until the marker class appears on a row
    /// beyond the previous highest-known one.
    pub fn new_row(
        &mut self,
        session: &dyn Session,
        snapshot: &Snapshot,
        container: &Container,
        grid_ordinal: usize,
    ) -> SondarResult<usize> {
        self.revalidate(&container.structural_id);
        let grid = self.grid(snapshot, container, grid_ordinal)?;
        let grid_path = snapshot.css_path(grid);
        let marker = self.config.row_marker.clone();
        let previous_max = data_rows(snapshot, grid).len().saturating_sub(1);

        session.press_key(&grid_path, Key::ArrowDown)?;
        let waiter = Waiter::new(session, self.provider.clone());
        let options = WaitOptions::from_config(&self.config);
        let mut landed = 0usize;
        waiter.wait_until(
            &format!("new grid row beyond {previous_max}"),
            &options,
            |fresh| match marked_row_at(fresh, &grid_path, &marker) {
                Some(row) if row > previous_max => {
                    landed = row;
                    true
                }
                _ => false,
            },
        )?;
        Ok(landed)
    }

    /// Drop cached mappings when the container identity changes
    fn revalidate(&mut self, structural_id: &str) {
        if self.last_container.as_deref() != Some(structural_id) {
            self.columns.clear();
            self.last_container = Some(structural_id.to_string());
        }
    }

    /// The `grid_ordinal`-th grid under the container, z-order filtered the
    /// same way containers are: displayed only, stacking key descending,
    /// equal keys most-recent-first
    fn grid(
        &self,
        snapshot: &Snapshot,
        container: &Container,
        grid_ordinal: usize,
    ) -> SondarResult<NodeId> {
        let mut grids: Vec<(usize, NodeId)> = snapshot
            .select(Some(container.node), "table")?
            .into_iter()
            .enumerate()
            .filter(|(_, node)| snapshot.displayed(*node))
            .collect();
        grids.sort_by(|(a_ord, a), (b_ord, b)| {
            snapshot
                .effective_stacking_key(*b)
                .cmp(&snapshot.effective_stacking_key(*a))
                .then(b_ord.cmp(a_ord))
        });
        grids
            .get(grid_ordinal)
            .map(|(_, node)| *node)
            .ok_or_else(|| SondarError::NotFound {
                locator: format!("grid {grid_ordinal}"),
                timeout_ms: 0,
            })
    }

    fn scan_headers(
        snapshot: &Snapshot,
        grid: NodeId,
    ) -> SondarResult<HashMap<String, usize>> {
        let mut headers = snapshot.select(Some(grid), "th")?;
        if headers.is_empty() {
            // Headerless grids use the first row's cells as headers.
            if let Some(first_row) = snapshot.select(Some(grid), "tr")?.first() {
                headers = snapshot.select(Some(*first_row), "td")?;
            }
        }
        Ok(headers
            .into_iter()
            .enumerate()
            .map(|(ordinal, cell)| (normalize(&snapshot.text(cell)), ordinal))
            .collect())
    }
}

/// Rows that carry data cells, in document order
fn data_rows(snapshot: &Snapshot, grid: NodeId) -> Vec<NodeId> {
    snapshot
        .select(Some(grid), "tr")
        .unwrap_or_default()
        .into_iter()
        .filter(|row| {
            snapshot
                .children(*row)
                .iter()
                .any(|cell| snapshot.tag(*cell).as_deref() == Some("td"))
        })
        .collect()
}

/// Index of the row whose cell (or the row itself) carries the marker class
fn marked_row_at(snapshot: &Snapshot, grid_path: &str, marker: &str) -> Option<usize> {
    let grid = snapshot.node_at_path(grid_path)?;
    data_rows(snapshot, grid).iter().position(|row| {
        snapshot.has_class(*row, marker)
            || snapshot
                .children(*row)
                .iter()
                .any(|cell| snapshot.has_class(*cell, marker))
    })
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerPolicy, LayerResolver};
    use crate::mock::MockSession;
    use crate::snapshot::ContextOrigin;

    const GRID_PAGE: &str = "<div id='screen'><table>\
        <tr><th>Code</th><th>Description</th><th>Qty</th></tr>\
        <tr><td class='current-row'>1</td><td>Apple</td><td>10</td></tr>\
        <tr><td>2</td><td>Pear</td><td>5</td></tr>\
        <tr><td>3</td><td>Plum</td><td>8</td></tr>\
        </table></div>";

    fn config() -> SyncConfig {
        SyncConfig::new()
            .with_timeout(300)
            .with_poll_interval(10)
            .with_frame_selector(None)
    }

    fn container_of(snapshot: &Snapshot, css: &str) -> Container {
        LayerResolver::new(config())
            .top_container(snapshot, css, LayerPolicy::new())
            .unwrap()
            .unwrap()
    }

    mod column_tests {
        use super::*;

        #[test]
        fn test_column_of_by_header_text() {
            let snap = Snapshot::parse(GRID_PAGE, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            assert_eq!(
                indexer.column_of(&snap, &container, 0, "Description").unwrap(),
                1
            );
            assert_eq!(indexer.column_of(&snap, &container, 0, "Code").unwrap(), 0);
            assert_eq!(indexer.column_of(&snap, &container, 0, "Qty").unwrap(), 2);
        }

        #[test]
        fn test_unknown_header_is_not_found() {
            let snap = Snapshot::parse(GRID_PAGE, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            assert!(matches!(
                indexer.column_of(&snap, &container, 0, "Price"),
                Err(SondarError::NotFound { .. })
            ));
        }

        #[test]
        fn test_cache_invalidated_on_container_identity_change() {
            let mut indexer = GridIndexer::new(config());

            let snap = Snapshot::parse(GRID_PAGE, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            assert_eq!(
                indexer.column_of(&snap, &container, 0, "Description").unwrap(),
                1
            );

            // A different rendering of "the same" grid: new container id,
            // reordered headers. The stale mapping must not survive.
            let reordered = GRID_PAGE
                .replace("id='screen'", "id='screen2'")
                .replace(
                    "<th>Code</th><th>Description</th>",
                    "<th>Description</th><th>Code</th>",
                );
            let snap2 = Snapshot::parse(&reordered, ContextOrigin::Top);
            let container2 = container_of(&snap2, "#screen2");
            assert_eq!(
                indexer.column_of(&snap2, &container2, 0, "Description").unwrap(),
                0
            );
        }

        #[test]
        fn test_headerless_grid_uses_first_row() {
            let page = "<div id='s'><table>\
                <tr><td>Name</td><td>Total</td></tr>\
                <tr><td>x</td><td>1</td></tr>\
                </table></div>";
            let snap = Snapshot::parse(page, ContextOrigin::Top);
            let container = container_of(&snap, "#s");
            let mut indexer = GridIndexer::new(config());
            assert_eq!(indexer.column_of(&snap, &container, 0, "Total").unwrap(), 1);
        }

        #[test]
        fn test_multi_grid_ordinal_follows_stacking_policy() {
            let page = "<div id='s'>\
                <div style='z-index: 1'><table><tr><th>Back</th></tr><tr><td>1</td></tr></table></div>\
                <div style='z-index: 5'><table><tr><th>Front</th></tr><tr><td>2</td></tr></table></div>\
                </div>";
            let snap = Snapshot::parse(page, ContextOrigin::Top);
            let container = container_of(&snap, "#s");
            let mut indexer = GridIndexer::new(config());
            // Ordinal 0 is the topmost grid, not the first in document
            // order.
            assert_eq!(indexer.column_of(&snap, &container, 0, "Front").unwrap(), 0);
            assert_eq!(indexer.column_of(&snap, &container, 1, "Back").unwrap(), 0);
        }

        #[test]
        fn test_missing_grid_ordinal_is_not_found() {
            let snap = Snapshot::parse(GRID_PAGE, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            assert!(matches!(
                indexer.column_of(&snap, &container, 3, "Code"),
                Err(SondarError::NotFound { .. })
            ));
        }
    }

    mod row_tests {
        use super::*;

        fn page_with_marker_on(row: usize) -> String {
            let cells = ["1", "2", "3"];
            let rows: String = cells
                .iter()
                .enumerate()
                .map(|(i, code)| {
                    let class = if i == row { " class='current-row'" } else { "" };
                    format!("<tr><td{class}>{code}</td><td>item</td></tr>")
                })
                .collect();
            format!(
                "<div id='screen'><table>\
                 <tr><th>Code</th><th>Description</th></tr>{rows}</table></div>"
            )
        }

        #[test]
        fn test_select_row_already_current() {
            let page = page_with_marker_on(0);
            let session = MockSession::new(page.clone());
            let snap = Snapshot::parse(&page, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            indexer
                .select_row(&session, &snap, &container, 0, 0)
                .unwrap();
            assert!(session.keys_pressed().is_empty());
        }

        #[test]
        fn test_select_row_moves_cursor_down() {
            let page = page_with_marker_on(0);
            let session = MockSession::new(page.clone());
            session.queue_page_on_key(Key::ArrowDown, page_with_marker_on(1));
            session.queue_page_on_key(Key::ArrowDown, page_with_marker_on(2));

            let snap = Snapshot::parse(&page, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            indexer
                .select_row(&session, &snap, &container, 0, 2)
                .unwrap();

            let keys = session.keys_pressed();
            assert_eq!(keys.len(), 2);
            assert!(keys.iter().all(|(_, key)| *key == Key::ArrowDown));
        }

        #[test]
        fn test_select_row_moves_cursor_up() {
            let page = page_with_marker_on(2);
            let session = MockSession::new(page.clone());
            session.queue_page_on_key(Key::ArrowUp, page_with_marker_on(1));

            let snap = Snapshot::parse(&page, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            indexer
                .select_row(&session, &snap, &container, 0, 1)
                .unwrap();
            assert_eq!(session.keys_pressed()[0].1, Key::ArrowUp);
        }

        #[test]
        fn test_select_row_beyond_grid_is_not_found() {
            let page = page_with_marker_on(0);
            let session = MockSession::new(page.clone());
            let snap = Snapshot::parse(&page, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            assert!(matches!(
                indexer.select_row(&session, &snap, &container, 0, 9),
                Err(SondarError::NotFound { .. })
            ));
        }

        #[test]
        fn test_select_row_times_out_when_marker_never_moves() {
            let page = page_with_marker_on(0);
            // The cursor key has no effect: the marker stays put.
            let session = MockSession::new(page.clone());
            let snap = Snapshot::parse(&page, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            assert!(matches!(
                indexer.select_row(&session, &snap, &container, 0, 1),
                Err(SondarError::Timeout { .. })
            ));
        }

        #[test]
        fn test_new_row_lands_beyond_previous_max() {
            let page = page_with_marker_on(2);
            let grown = "<div id='screen'><table>\
                <tr><th>Code</th><th>Description</th></tr>\
                <tr><td>1</td><td>item</td></tr>\
                <tr><td>2</td><td>item</td></tr>\
                <tr><td>3</td><td>item</td></tr>\
                <tr><td class='current-row'></td><td></td></tr>\
                </table></div>";
            let session = MockSession::new(page.clone());
            session.queue_page_on_key(Key::ArrowDown, grown);

            let snap = Snapshot::parse(&page, ContextOrigin::Top);
            let container = container_of(&snap, "#screen");
            let mut indexer = GridIndexer::new(config());
            let landed = indexer.new_row(&session, &snap, &container, 0).unwrap();
            assert_eq!(landed, 3);
        }
    }
}
