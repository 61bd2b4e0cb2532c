use std::collections::BTreeMap;

use super::stats::{FieldStats, compute_stats};
use crate::data::model::{CellValue, Row, RowId};

pub const DEFAULT_THRESHOLD: f64 = 2.5;
pub const DEFAULT_JOINT_MULTIPLIER: f64 = 1.4;

// ---------------------------------------------------------------------------
// Detector parameters
// ---------------------------------------------------------------------------

/// Sensitivity settings for [`detect_outliers`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierParams {
    /// Per-axis |z| limit.
    pub threshold: f64,
    /// The joint test fires when the z-pair norm exceeds
    /// `threshold * joint_multiplier`.
    pub joint_multiplier: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            joint_multiplier: DEFAULT_JOINT_MULTIPLIER,
        }
    }
}

impl OutlierParams {
    pub fn with_threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }

    /// Classify a z-score pair.
    pub fn is_outlier(&self, z_x: f64, z_y: f64) -> bool {
        z_x.abs() > self.threshold
            || z_y.abs() > self.threshold
            || joint_distance(z_x, z_y) > self.threshold * self.joint_multiplier
    }
}

pub fn joint_distance(z_x: f64, z_y: f64) -> f64 {
    (z_x * z_x + z_y * z_y).sqrt()
}

fn z_score(value: Option<f64>, stats: &FieldStats) -> f64 {
    match value {
        Some(v) if stats.std_dev != 0.0 => (v - stats.mean) / stats.std_dev,
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Scored output
// ---------------------------------------------------------------------------

/// A row as seen by the chart: its cells with both axis fields forced to
/// numbers, plus the outlier verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub row_id: RowId,
    pub cells: BTreeMap<String, CellValue>,
    pub x: f64,
    pub y: f64,
    pub z_score_x: f64,
    pub z_score_y: f64,
    pub joint_distance: f64,
    pub is_outlier: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub x_field: String,
    pub y_field: String,
    pub params: OutlierParams,
    pub x_stats: FieldStats,
    pub y_stats: FieldStats,
    /// Same order and length as the input rows.
    pub scored: Vec<ScoredRow>,
    /// Ascending positions into `scored`.
    pub outlier_indices: Vec<usize>,
}

impl OutlierReport {
    pub fn outlier_count(&self) -> usize {
        self.outlier_indices.len()
    }
}

/// Score every row on the `x_field`/`y_field` plane.
///
/// Cells that fail to coerce contribute a z-score of 0 and are plotted at 0;
/// they are never dropped. Never fails.
pub fn detect_outliers(
    rows: &[Row],
    x_field: &str,
    y_field: &str,
    params: &OutlierParams,
) -> OutlierReport {
    let x_stats = compute_stats(rows, x_field);
    let y_stats = compute_stats(rows, y_field);

    let mut outlier_indices = Vec::new();
    let scored = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let x = row.get(x_field).and_then(CellValue::coerce_f64);
            let y = row.get(y_field).and_then(CellValue::coerce_f64);
            let z_score_x = z_score(x, &x_stats);
            let z_score_y = z_score(y, &y_stats);
            let is_outlier = params.is_outlier(z_score_x, z_score_y);
            if is_outlier {
                outlier_indices.push(i);
            }

            let x = x.unwrap_or(0.0);
            let y = y.unwrap_or(0.0);
            let mut cells = row.cells.clone();
            cells.insert(x_field.to_string(), CellValue::Number(x));
            cells.insert(y_field.to_string(), CellValue::Number(y));

            ScoredRow {
                row_id: row.id,
                cells,
                x,
                y,
                z_score_x,
                z_score_y,
                joint_distance: joint_distance(z_score_x, z_score_y),
                is_outlier,
            }
        })
        .collect();

    OutlierReport {
        x_field: x_field.to_string(),
        y_field: y_field.to_string(),
        params: *params,
        x_stats,
        y_stats,
        scored,
        outlier_indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::dataset;
    use crate::data::sample::simulated_dataset;

    fn xy_rows(points: &[(f64, f64)]) -> Vec<Row> {
        dataset(
            &["x", "y"],
            points
                .iter()
                .map(|&(x, y)| vec![("x", CellValue::Number(x)), ("y", CellValue::Number(y))])
                .collect(),
        )
        .rows
    }

    /// Twenty points near the origin plus one far away on both axes.
    fn cluster_with_outlier() -> Vec<Row> {
        let mut points: Vec<(f64, f64)> = (0..20)
            .map(|i| ((i % 5) as f64, (i % 4) as f64))
            .collect();
        points.push((40.0, 30.0));
        xy_rows(&points)
    }

    #[test]
    fn test_flags_far_point() {
        let report = detect_outliers(&cluster_with_outlier(), "x", "y", &OutlierParams::default());
        assert_eq!(report.outlier_indices, vec![20]);
        assert!(report.scored[20].is_outlier);
        assert!(report.scored[20].z_score_x > DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_huge_values_score_finite() {
        let mut points: Vec<(f64, f64)> = (0..20)
            .map(|i| (((i % 5) as f64 - 2.0) * 1e306, (i % 4) as f64))
            .collect();
        points.push((1e308, 30.0));
        let report = detect_outliers(&xy_rows(&points), "x", "y", &OutlierParams::default());
        assert!(report
            .scored
            .iter()
            .all(|s| s.z_score_x.is_finite() && s.joint_distance.is_finite()));
        assert_eq!(report.outlier_indices, vec![20]);
    }

    #[test]
    fn test_preserves_order_and_length() {
        let rows = cluster_with_outlier();
        let report = detect_outliers(&rows, "x", "y", &OutlierParams::default());
        assert_eq!(report.scored.len(), rows.len());
        for (scored, row) in report.scored.iter().zip(&rows) {
            assert_eq!(scored.row_id, row.id);
        }
        assert!(report.outlier_indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_deterministic() {
        let rows = simulated_dataset(200, 3).expect("dataset").rows;
        let a = detect_outliers(&rows, "units", "revenue", &OutlierParams::default());
        let b = detect_outliers(&rows, "units", "revenue", &OutlierParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_threshold_monotonic() {
        let rows = simulated_dataset(300, 11).expect("dataset").rows;
        let mut previous = usize::MAX;
        for step in 0..30 {
            let threshold = 0.5 + step as f64 * 0.25;
            let params = OutlierParams::default().with_threshold(threshold);
            let count = detect_outliers(&rows, "units", "revenue", &params).outlier_count();
            assert!(count <= previous, "threshold {threshold} grew the outlier set");
            previous = count;
        }
    }

    #[test]
    fn test_constant_axis_never_flags() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (7.0, i as f64)).collect();
        let rows = xy_rows(&points);
        for threshold in [0.01, 0.5, 2.5] {
            let params = OutlierParams::default().with_threshold(threshold);
            let report = detect_outliers(&rows, "x", "x", &params);
            assert!(report.scored.iter().all(|s| s.z_score_x == 0.0 && s.z_score_y == 0.0));
            assert!(report.outlier_indices.is_empty());
        }
    }

    #[test]
    fn test_joint_rule() {
        let params = OutlierParams::default();
        // Neither axis nor the joint norm (2.83 < 3.5) crosses.
        assert!(!params.is_outlier(2.0, 2.0));
        // Joint-only: each axis under 2.5, norm 3.507 > 3.5.
        assert!(params.is_outlier(2.48, 2.48));
        assert!(params.is_outlier(-2.48, 2.48));
        // Single axis.
        assert!(params.is_outlier(2.51, 0.0));
        assert!(params.is_outlier(0.0, -2.6));
        assert!(!params.is_outlier(2.5, 0.0));
    }

    #[test]
    fn test_joint_multiplier_is_configurable() {
        let params = OutlierParams {
            threshold: 2.5,
            joint_multiplier: 1.0,
        };
        assert!(params.is_outlier(2.0, 2.0));
    }

    #[test]
    fn test_non_numeric_cells_are_neutral() {
        let ds = dataset(
            &["x", "y", "label"],
            vec![
                vec![("x", CellValue::Number(1.0)), ("y", CellValue::Number(2.0))],
                vec![("x", CellValue::Text("bad".into())), ("y", CellValue::Number(4.0))],
                vec![("x", CellValue::Number(3.0)), ("label", CellValue::Text("k".into()))],
            ],
        );
        let report = detect_outliers(&ds.rows, "x", "y", &OutlierParams::default());
        assert_eq!(report.scored.len(), 3);

        let bad = &report.scored[1];
        assert_eq!(bad.z_score_x, 0.0);
        assert_eq!(bad.cells.get("x"), Some(&CellValue::Number(0.0)));
        assert_eq!(bad.x, 0.0);

        let missing_y = &report.scored[2];
        assert_eq!(missing_y.z_score_y, 0.0);
        assert_eq!(missing_y.cells.get("y"), Some(&CellValue::Number(0.0)));
        assert_eq!(missing_y.cells.get("label"), Some(&CellValue::Text("k".into())));

        // Source rows are untouched.
        assert_eq!(ds.rows[1].get("x"), Some(&CellValue::Text("bad".into())));
    }

    #[test]
    fn test_empty_rows() {
        let report = detect_outliers(&[], "x", "y", &OutlierParams::default());
        assert!(report.scored.is_empty());
        assert!(report.outlier_indices.is_empty());
    }
}
