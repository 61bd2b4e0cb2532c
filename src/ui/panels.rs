use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::app::{RustyScatterApp, View};
use crate::data::sample::simulated_dataset;
use crate::state::{AnalysisEvent, InsightRejected};

const SAMPLE_ROWS: usize = 500;
const SAMPLE_SEED: u64 = 42;

// ---------------------------------------------------------------------------
// Left side panel – axis, threshold and AI insight widgets
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, app: &mut RustyScatterApp) {
    ui.heading("Analysis");
    ui.separator();

    let Some(dataset) = app.orchestrator.dataset() else {
        ui.label("No dataset loaded.");
        return;
    };
    ui.label(format!("{}: {} rows", dataset.name, dataset.len()));

    let numeric = app.orchestrator.numeric_columns().to_vec();
    let x_field = app.orchestrator.x_field().unwrap_or_default().to_string();
    let y_field = app.orchestrator.y_field().unwrap_or_default().to_string();
    let mut events = Vec::new();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Axis selectors ----
            for (label, salt, current, is_x) in
                [("X axis", "x_axis", &x_field, true), ("Y axis", "y_axis", &y_field, false)]
            {
                ui.strong(label);
                egui::ComboBox::from_id_salt(salt)
                    .selected_text(current.as_str())
                    .show_ui(ui, |ui: &mut Ui| {
                        for col in &numeric {
                            if ui.selectable_label(current == col, col).clicked() {
                                events.push(if is_x {
                                    AnalysisEvent::SetXField(col.clone())
                                } else {
                                    AnalysisEvent::SetYField(col.clone())
                                });
                            }
                        }
                    });
            }
            ui.separator();

            // ---- Sensitivity ----
            ui.strong("Threshold (z)");
            let mut threshold = app.orchestrator.threshold();
            if ui
                .add(egui::Slider::new(&mut threshold, 1.0..=5.0).step_by(0.1))
                .changed()
            {
                events.push(AnalysisEvent::SetThreshold(threshold));
            }

            if let Some(report) = app.orchestrator.analysis().report() {
                ui.label(format!(
                    "{} of {} rows flagged",
                    report.outlier_count(),
                    report.scored.len()
                ));
                ui.label(
                    RichText::new(format!(
                        "{}: mean {:.3}, sd {:.3}, range [{:.3}, {:.3}]\n\
                         {}: mean {:.3}, sd {:.3}, range [{:.3}, {:.3}]",
                        report.x_field,
                        report.x_stats.mean,
                        report.x_stats.std_dev,
                        report.x_stats.min,
                        report.x_stats.max,
                        report.y_field,
                        report.y_stats.mean,
                        report.y_stats.std_dev,
                        report.y_stats.min,
                        report.y_stats.max
                    ))
                    .weak(),
                );

                egui::CollapsingHeader::new(RichText::new("Flagged rows").strong())
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        for sr in report.outlier_indices.iter().map(|&i| &report.scored[i]) {
                            let details = sr
                                .cells
                                .iter()
                                .map(|(k, v)| format!("{k}: {v}"))
                                .collect::<Vec<_>>()
                                .join("\n");
                            ui.label(format!(
                                "row {}  z = ({:.2}, {:.2})",
                                sr.row_id.0, sr.z_score_x, sr.z_score_y
                            ))
                            .on_hover_text(details);
                        }
                    });
            }
            ui.separator();

            insight_section(ui, app);
        });

    for event in events {
        app.dispatch(event);
    }
}

fn insight_section(ui: &mut Ui, app: &mut RustyScatterApp) {
    ui.strong("AI insights");

    if app.orchestrator.insight_pending() {
        ui.horizontal(|ui: &mut Ui| {
            ui.spinner();
            ui.label("Generating…");
        });
    } else if ui.button("Explain outliers").clicked() {
        match app.orchestrator.request_insight() {
            Ok(_) => app.status_message = None,
            Err(InsightRejected::AnalysisUnavailable) => {
                app.status_message = Some("Nothing to explain yet.".to_string());
            }
            Err(e) => log::debug!("{e}"),
        }
    }

    if let Some(insight) = app.orchestrator.insight() {
        ui.add_space(4.0);
        ui.label(RichText::new(&insight.summary).strong());
        ui.label(&insight.outlier_analysis);
        for item in &insight.actionable_insights {
            ui.label(format!("• {item}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, app: &mut RustyScatterApp) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(app);
                ui.close_menu();
            }
            if ui.button("Load sample data").clicked() {
                load_sample(app);
                ui.close_menu();
            }
        });

        ui.separator();

        ui.selectable_value(&mut app.view, View::Chart, "Chart");
        ui.selectable_value(&mut app.view, View::Data, "Data");

        ui.separator();

        if let Some(report) = app.orchestrator.analysis().report() {
            ui.label(format!(
                "{} rows, {} outliers",
                report.scored.len(),
                report.outlier_count()
            ));
        }

        if let Some(msg) = &app.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

pub fn open_file_dialog(app: &mut RustyScatterApp) {
    let file = rfd::FileDialog::new()
        .set_title("Open table")
        .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_file(&path) {
            Ok(dataset) => {
                app.status_message = None;
                app.dispatch(AnalysisEvent::DatasetLoaded(dataset));
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                app.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

fn load_sample(app: &mut RustyScatterApp) {
    match simulated_dataset(SAMPLE_ROWS, SAMPLE_SEED) {
        Ok(dataset) => {
            app.status_message = None;
            app.dispatch(AnalysisEvent::DatasetLoaded(dataset));
        }
        Err(e) => {
            log::error!("Failed to build sample data: {e}");
            app.status_message = Some(format!("Error: {e}"));
        }
    }
}
