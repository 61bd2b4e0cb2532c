use eframe::egui::{self, Key, RichText, TextEdit, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::{Row, RowId};
use crate::editor::EditSession;

// ---------------------------------------------------------------------------
// Data editor (central panel, "Data" view)
// ---------------------------------------------------------------------------

/// What the user did this frame; applied after the table is drawn so the
/// session is not borrowed while rendering.
enum EditorAction {
    Search(String),
    Page(usize),
    Begin(RowId, String),
    Buffer(String),
    Commit,
    Cancel,
}

/// Render the editor. Returns the full replacement rows when an edit was
/// committed this frame.
pub fn data_editor(ui: &mut Ui, session: &mut EditSession) -> Option<Vec<Row>> {
    let mut actions = Vec::new();

    // ---- Search + pagination bar ----
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Search:");
        let mut term = session.search_term().to_string();
        if ui
            .add(TextEdit::singleline(&mut term).desired_width(220.0))
            .changed()
        {
            actions.push(EditorAction::Search(term));
        }

        ui.separator();
        let (page, total) = (session.page(), session.total_pages());
        if ui.add_enabled(page > 1, egui::Button::new("◀")).clicked() {
            actions.push(EditorAction::Page(page - 1));
        }
        ui.label(format!("Page {page} / {total}"));
        if ui.add_enabled(page < total, egui::Button::new("▶")).clicked() {
            actions.push(EditorAction::Page(page + 1));
        }
        ui.label(
            RichText::new(format!(
                "{} of {} rows match",
                session.match_count(),
                session.rows().len()
            ))
            .weak(),
        );
    });
    ui.separator();

    // ---- Grid ----
    let columns = session.columns().to_vec();
    let rows: Vec<Row> = session.page_rows().cloned().collect();
    let editing = session.current_edit().cloned();

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(40.0))
        .columns(Column::auto().at_least(80.0).clip(true), columns.len())
        .header(22.0, |mut header| {
            header.col(|ui: &mut Ui| {
                ui.strong("#");
            });
            for col in &columns {
                header.col(|ui: &mut Ui| {
                    ui.strong(col);
                });
            }
        })
        .body(|mut body| {
            for row in &rows {
                body.row(20.0, |mut table_row| {
                    table_row.col(|ui: &mut Ui| {
                        ui.label(RichText::new(row.id.0.to_string()).weak());
                    });
                    for col in &columns {
                        table_row.col(|ui: &mut Ui| {
                            let active = editing
                                .as_ref()
                                .filter(|e| e.row == row.id && &e.column == col);
                            match active {
                                Some(edit) => {
                                    let mut buffer = edit.buffer.clone();
                                    let response = ui.add(TextEdit::singleline(&mut buffer));
                                    response.request_focus();
                                    if response.changed() {
                                        actions.push(EditorAction::Buffer(buffer));
                                    }
                                    if ui.input(|i| i.key_pressed(Key::Escape)) {
                                        actions.push(EditorAction::Cancel);
                                    } else if response.lost_focus() {
                                        // Enter and click-away both commit.
                                        actions.push(EditorAction::Commit);
                                    }
                                }
                                None => {
                                    let text = row.get(col).map(|v| v.to_string()).unwrap_or_default();
                                    let label = ui.add(
                                        egui::Label::new(text).sense(egui::Sense::click()),
                                    );
                                    if label.double_clicked() {
                                        actions.push(EditorAction::Begin(row.id, col.clone()));
                                    }
                                }
                            }
                        });
                    }
                });
            }
        });

    // A double-click elsewhere blurs the open editor; settle it before starting the next edit.
    actions.sort_by_key(|a| matches!(a, EditorAction::Begin(..)));

    let mut committed = None;
    for action in actions {
        match action {
            EditorAction::Search(term) => session.search(&term),
            EditorAction::Page(n) => session.set_page(n),
            EditorAction::Begin(row, col) => {
                session.begin_edit(row, &col);
            }
            EditorAction::Buffer(text) => session.update_edit_buffer(&text),
            EditorAction::Commit => committed = session.commit_edit().or(committed),
            EditorAction::Cancel => session.cancel_edit(),
        }
    }
    committed
}
