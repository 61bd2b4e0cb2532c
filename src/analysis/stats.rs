use crate::data::model::Row;

/// Above this magnitude values are rescaled before summing so neither the
/// sum nor the squared deviations overflow.
const RESCALE_ABOVE: f64 = 1e150;

// ---------------------------------------------------------------------------
// Per-field summary statistics
// ---------------------------------------------------------------------------

/// Summary of one numeric field over a row snapshot.
///
/// All zero when the field has no usable values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldStats {
    pub mean: f64,
    /// Population standard deviation (divides by `n`).
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Compute mean, population standard deviation and extrema of `field`.
///
/// Values that do not coerce to a finite number are skipped.
pub fn compute_stats(rows: &[Row], field: &str) -> FieldStats {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.get(field)?.coerce_f64())
        .collect();

    if values.is_empty() {
        return FieldStats::default();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Summation rounding must not give a constant column a tiny spread.
    if min == max {
        return FieldStats {
            mean: min,
            std_dev: 0.0,
            min,
            max,
        };
    }

    let magnitude = min.abs().max(max.abs());
    let scale = if magnitude > RESCALE_ABOVE { magnitude } else { 1.0 };

    let n = values.len() as f64;
    let mean = values.iter().map(|v| v / scale).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| (v / scale - mean).powi(2))
        .sum::<f64>()
        / n;

    FieldStats {
        mean: mean * scale,
        std_dev: variance.sqrt() * scale,
        min,
        max,
    }
}
