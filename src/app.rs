use std::time::Duration;

use eframe::egui::{self, Ui};

use crate::config::AppConfig;
use crate::editor::EditSession;
use crate::insight::provider_from_env;
use crate::state::{AnalysisEvent, AnalysisOrchestrator};
use crate::ui::{panels, plot, table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Chart,
    Data,
}

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyScatterApp {
    pub orchestrator: AnalysisOrchestrator,
    /// Live only while the data view is shown.
    pub editor: Option<EditSession>,
    pub view: View,
    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
    page_size: usize,
}

impl RustyScatterApp {
    pub fn new(config: &AppConfig) -> Self {
        let provider = provider_from_env(&config.insight);
        Self {
            orchestrator: AnalysisOrchestrator::new(
                &config.analysis,
                provider,
                config.insight.timeout(),
            ),
            editor: None,
            view: View::Chart,
            status_message: None,
            page_size: config.editor.page_size,
        }
    }

    pub fn dispatch(&mut self, event: AnalysisEvent) {
        self.orchestrator.dispatch(event);
    }

    fn data_view(&mut self, ui: &mut Ui) {
        let Some(dataset) = self.orchestrator.dataset() else {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("No dataset loaded.");
            });
            return;
        };
        let revision = self.orchestrator.revision();
        let session = self
            .editor
            .get_or_insert_with(|| EditSession::open(dataset, revision, self.page_size));
        session.sync(dataset, revision);

        if let Some(rows) = table::data_editor(ui, session) {
            // The working copy already holds these rows.
            if self.orchestrator.dispatch(AnalysisEvent::RowsReplaced(rows)) {
                session.mark_synced(self.orchestrator.revision());
            }
        }
    }
}

impl eframe::App for RustyScatterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.orchestrator.poll_insight();
        if self.orchestrator.insight_pending() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, self);
        });

        // ---- Left side panel: axes, threshold, insights ----
        egui::SidePanel::left("analysis_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, self);
            });

        // The editor is discarded whenever its view is closed.
        if self.view != View::Data {
            self.editor = None;
        }

        // ---- Central panel: chart or editor ----
        egui::CentralPanel::default().show(ctx, |ui| match self.view {
            View::Chart => plot::scatter_plot(ui, &self.orchestrator),
            View::Data => self.data_view(ui),
        });
    }
}
