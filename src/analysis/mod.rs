/// Outlier scoring: per-field statistics feed per-axis and joint z-score tests.
///
/// ```text
///   rows ──► stats::compute_stats(x), compute_stats(y)
///                     │
///                     ▼
///            outliers::detect_outliers ──► OutlierReport { scored, outlier_indices }
/// ```

pub mod outliers;
pub mod stats;
