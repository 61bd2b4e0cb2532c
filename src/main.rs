mod analysis;
mod app;
mod color;
mod config;
mod data;
mod editor;
mod insight;
mod state;
mod ui;

use app::RustyScatterApp;
use config::AppConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = AppConfig::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Scatter – Outlier Explorer",
        options,
        Box::new(move |_cc| Ok(Box::new(RustyScatterApp::new(&config)))),
    )
}
