use super::model::Row;

// ---------------------------------------------------------------------------
// Search predicate for the table editor
// ---------------------------------------------------------------------------

/// Whether any of the row's `columns` contains `term`, ignoring case.
///
/// Cells are compared through their display text, so `42.0` is searched as
/// `"42"` and nulls as the empty string. An empty term matches every row.
pub fn row_matches(row: &Row, columns: &[String], term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    columns.iter().any(|col| {
        row.get(col)
            .map(|v| v.to_string().to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

/// Return positions of the rows that match `term`, in row order.
pub fn matching_positions(rows: &[Row], columns: &[String], term: &str) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, columns, term))
        .map(|(i, _)| i)
        .collect()
}
