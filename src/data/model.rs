use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value as JsonValue;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CellValue – a single scalar in a table cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value: number, text, boolean or null.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Coerce to a finite `f64`.
    ///
    /// Numbers pass through when finite, text is parsed after trimming.
    /// Booleans and nulls never coerce.
    pub fn coerce_f64(&self) -> Option<f64> {
        let v = match self {
            CellValue::Number(v) => *v,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Bool(_) | CellValue::Null => return None,
        };
        v.is_finite().then_some(v)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }

    pub fn from_json(val: &JsonValue) -> Self {
        match val {
            JsonValue::String(s) => CellValue::Text(s.clone()),
            JsonValue::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            JsonValue::Bool(b) => CellValue::Bool(*b),
            JsonValue::Null => CellValue::Null,
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Number(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Text(s) => JsonValue::String(s.clone()),
            CellValue::Bool(b) => JsonValue::Bool(*b),
            CellValue::Null => JsonValue::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Row – one record of the table
// ---------------------------------------------------------------------------

/// Stable identifier of a row, assigned when the dataset is built.
/// Survives cell edits so duplicate-valued rows stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub u64);

/// A single record: column_name → value. Absent keys are missing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// Return a copy of this row with one cell replaced. The id is kept.
    pub fn with_cell(&self, column: &str, value: CellValue) -> Row {
        let mut cells = self.cells.clone();
        cells.insert(column.to_string(), value);
        Row { id: self.id, cells }
    }

    /// JSON object of the row's cells, in `columns` order.
    pub fn to_json(&self, columns: &[String]) -> JsonValue {
        let obj = columns
            .iter()
            .filter_map(|col| self.cells.get(col).map(|v| (col.clone(), v.to_json())))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset has no columns")]
    NoColumns,
}

/// A named table with an ordered column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    /// Display order; no duplicates.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from raw records, assigning row ids `0..n`.
    ///
    /// Duplicate column names are dropped (first wins) and record keys that
    /// are not listed in `columns` are discarded.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        records: Vec<BTreeMap<String, CellValue>>,
    ) -> Result<Self, DatasetError> {
        let mut seen = BTreeSet::new();
        let columns: Vec<String> = columns
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
        if columns.is_empty() {
            return Err(DatasetError::NoColumns);
        }

        let mut dropped = 0usize;
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(i, mut cells)| {
                let before = cells.len();
                cells.retain(|k, _| seen.contains(k));
                dropped += before - cells.len();
                Row {
                    id: RowId(i as u64),
                    cells,
                }
            })
            .collect();
        if dropped > 0 {
            log::warn!("Dropped {dropped} cells whose keys are not dataset columns");
        }

        Ok(Dataset {
            name: name.into(),
            columns,
            rows,
        })
    }

    /// Same name and columns, new row sequence (full replacement).
    pub fn with_rows(&self, rows: Vec<Row>) -> Dataset {
        Dataset {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Columns whose first non-null value is numeric.
    ///
    /// Only the first populated row of each column is inspected.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|col| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(col))
                    .find(|v| !v.is_null())
                    .is_some_and(CellValue::is_number)
            })
            .cloned()
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
