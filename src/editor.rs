use crate::data::filter::matching_positions;
use crate::data::model::{CellValue, Dataset, Row, RowId};

pub const DEFAULT_PAGE_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// In-progress cell edit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CellEdit {
    pub row: RowId,
    pub column: String,
    /// Candidate text, seeded with the cell's current display text.
    pub buffer: String,
}

// ---------------------------------------------------------------------------
// Edit session – the editor's working copy of a dataset
// ---------------------------------------------------------------------------

/// Paginated, searchable, editable working copy of a dataset's rows.
///
/// Edits never touch the authoritative dataset directly: [`commit_edit`]
/// returns the full replacement row sequence for the owner to adopt.
///
/// [`commit_edit`]: EditSession::commit_edit
#[derive(Debug, Clone)]
pub struct EditSession {
    columns: Vec<String>,
    rows: Vec<Row>,
    source_revision: u64,
    page_size: usize,
    /// 1-based.
    page: usize,
    search: String,
    /// Positions into `rows` passing the search filter.
    visible: Vec<usize>,
    edit: Option<CellEdit>,
}

impl EditSession {
    /// Open an editor on `dataset`, tagged with the owner's revision number.
    pub fn open(dataset: &Dataset, revision: u64, page_size: usize) -> Self {
        let mut session = Self {
            columns: dataset.columns.clone(),
            rows: dataset.rows.clone(),
            source_revision: revision,
            page_size: page_size.max(1),
            page: 1,
            search: String::new(),
            visible: Vec::new(),
            edit: None,
        };
        session.refilter();
        session
    }

    /// Adopt `dataset` if its revision differs from the one this session was
    /// built from. Drops any in-progress edit and keeps the search term.
    pub fn sync(&mut self, dataset: &Dataset, revision: u64) {
        if revision == self.source_revision {
            return;
        }
        log::debug!("Editor resync: revision {} -> {revision}", self.source_revision);
        self.columns = dataset.columns.clone();
        self.rows = dataset.rows.clone();
        self.source_revision = revision;
        self.edit = None;
        self.refilter();
        self.page = self.page.min(self.total_pages());
    }

    /// Record that `revision` was produced from this session's own commit,
    /// so the next [`sync`](Self::sync) keeps the working copy and any new edit.
    pub fn mark_synced(&mut self, revision: u64) {
        self.source_revision = revision;
    }

    fn refilter(&mut self) {
        self.visible = matching_positions(&self.rows, &self.columns, &self.search);
    }

    // -- Search & pagination --

    /// Filter rows by a case-insensitive substring and go back to page 1.
    pub fn search(&mut self, term: &str) {
        self.search = term.to_string();
        self.edit = None;
        self.refilter();
        self.page = 1;
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// At least 1, even with no matching rows.
    pub fn total_pages(&self) -> usize {
        self.visible.len().div_ceil(self.page_size).max(1)
    }

    /// Number of rows passing the search filter.
    pub fn match_count(&self) -> usize {
        self.visible.len()
    }

    /// Jump to page `n`. Out-of-range pages are ignored. Moving to another
    /// page cancels the current edit.
    pub fn set_page(&mut self, n: usize) {
        if n < 1 || n > self.total_pages() || n == self.page {
            return;
        }
        self.page = n;
        self.cancel_edit();
    }

    /// Rows on the current page, in working-copy order.
    pub fn page_rows(&self) -> impl Iterator<Item = &Row> {
        let start = (self.page - 1) * self.page_size;
        self.visible
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|&pos| &self.rows[pos])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    // -- Editing --

    pub fn current_edit(&self) -> Option<&CellEdit> {
        self.edit.as_ref()
    }

    /// Start editing `column` of the row `row` on the current page.
    ///
    /// An edit already in progress is cancelled first. Returns `false` (and
    /// starts nothing) when the row is not on the visible page or the column
    /// is unknown.
    pub fn begin_edit(&mut self, row: RowId, column: &str) -> bool {
        self.cancel_edit();
        if !self.columns.iter().any(|c| c == column) {
            return false;
        }
        let Some(target) = self.page_rows().find(|r| r.id == row) else {
            return false;
        };
        let buffer = target.get(column).map(|v| v.to_string()).unwrap_or_default();
        self.edit = Some(CellEdit {
            row,
            column: column.to_string(),
            buffer,
        });
        true
    }

    pub fn update_edit_buffer(&mut self, text: &str) {
        if let Some(edit) = &mut self.edit {
            edit.buffer = text.to_string();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Apply the pending edit to the working copy.
    ///
    /// Returns the complete new row sequence to push to the owner, or `None`
    /// when no edit was in progress.
    pub fn commit_edit(&mut self) -> Option<Vec<Row>> {
        let edit = self.edit.take()?;
        let pos = self.rows.iter().position(|r| r.id == edit.row)?;

        let original = self.rows[pos].get(&edit.column);
        let value = coerce_edit(original, &edit.buffer);
        log::info!("Edited row {} column {:?}: {value:?}", edit.row.0, edit.column);

        self.rows[pos] = self.rows[pos].with_cell(&edit.column, value);
        self.refilter();
        self.page = self.page.min(self.total_pages());
        Some(self.rows.clone())
    }
}

/// Convert edit text to a cell value shaped like the original.
///
/// * numeric original → parsed number, or the raw text if it does not parse
/// * boolean original → `true` only for "true" in any letter case
/// * anything else → raw text
fn coerce_edit(original: Option<&CellValue>, text: &str) -> CellValue {
    match original {
        Some(CellValue::Number(_)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(text.to_string())),
        Some(CellValue::Bool(_)) => CellValue::Bool(text.eq_ignore_ascii_case("true")),
        _ => CellValue::Text(text.to_string()),
    }
}
