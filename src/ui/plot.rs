use eframe::egui::{Color32, RichText, Ui};
use egui_plot::{Legend, MarkerShape, Plot, PlotPoints, Points};

use crate::color::SeverityScale;
use crate::state::{Analysis, AnalysisOrchestrator};

/// Inliers are shaded in this many steps of joint z-distance.
const SHADE_BANDS: usize = 5;

// ---------------------------------------------------------------------------
// Outlier scatter plot (central panel)
// ---------------------------------------------------------------------------

/// Render the scored rows as a scatter plot, outliers drawn on top.
pub fn scatter_plot(ui: &mut Ui, orchestrator: &AnalysisOrchestrator) {
    let report = match orchestrator.analysis() {
        Analysis::Ready(report) => report,
        Analysis::NoDataset => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Open a file to find outliers  (File → Open…)");
            });
            return;
        }
        Analysis::InsufficientData { numeric_columns } => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.label(
                    RichText::new(format!(
                        "Insufficient data: need at least two numeric columns and one row \
                         ({numeric_columns} numeric column(s) found)."
                    ))
                    .color(Color32::YELLOW),
                );
            });
            return;
        }
    };

    let scale = SeverityScale::new(report.params.threshold, report.params.joint_multiplier);

    Plot::new("outlier_plot")
        .legend(Legend::default())
        .x_axis_label(report.x_field.as_str())
        .y_axis_label(report.y_field.as_str())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            let mut bands: Vec<Vec<[f64; 2]>> = vec![Vec::new(); SHADE_BANDS];
            for sr in report.scored.iter().filter(|s| !s.is_outlier) {
                bands[scale.band_of(sr.joint_distance, SHADE_BANDS)].push([sr.x, sr.y]);
            }
            for (band, points) in bands.into_iter().enumerate() {
                if points.is_empty() {
                    continue;
                }
                plot_ui.points(
                    Points::new(PlotPoints::from(points))
                        .name("inliers")
                        .color(scale.band_color(band, SHADE_BANDS))
                        .shape(MarkerShape::Circle)
                        .filled(true)
                        .radius(3.0),
                );
            }

            let outliers: PlotPoints = report
                .outlier_indices
                .iter()
                .map(|&i| [report.scored[i].x, report.scored[i].y])
                .collect();
            plot_ui.points(
                Points::new(outliers)
                    .name(format!("outliers ({})", report.outlier_count()))
                    .color(scale.outlier_color())
                    .shape(MarkerShape::Diamond)
                    .filled(true)
                    .radius(5.0),
            );
        });
}
