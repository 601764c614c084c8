use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use reorder_core::{
    config::Settings, CommitHandle, EngineEvent, ListGeometry, OrderPersistence,
    PersistenceEvent, ReorderList,
};
use serde::{Deserialize, Serialize};
use shared::domain::{NewRecord, RecordPatch};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::{UiError, UiErrorCategory, UiErrorContext, UiEvent},
    gesture::{GestureAction, GestureTracker},
    orchestration::dispatch_backend_command,
};
use crate::ui::list_view::{self, RowAction};

pub const VIEW_SETTINGS_KEY: &str = "todo_view_settings";

/// Longest frame step fed to the springs; a stalled frame should not fling
/// items across the list.
const MAX_FRAME_SECS: f32 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedViewSettings {
    pub hide_done: bool,
    pub tag_filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusBannerSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
struct StatusBanner {
    severity: StatusBannerSeverity,
    message: String,
    /// Generation of the failed commit a retry would replay.
    retry_generation: Option<u64>,
}

fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Storage => "Storage",
        UiErrorCategory::Validation => "Validation",
        UiErrorCategory::Unknown => "Error",
    }
}

pub struct TodoApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    settings: Settings,
    list: Option<ReorderList>,
    commit: Option<CommitHandle>,
    gesture: GestureTracker,
    view: PersistedViewSettings,
    new_title: String,
    new_tag: String,
    status: String,
    status_banner: Option<StatusBanner>,
}

impl TodoApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        settings: Settings,
        view: PersistedViewSettings,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            settings,
            list: None,
            commit: None,
            gesture: GestureTracker::default(),
            view,
            new_title: String::new(),
            new_tag: String::new(),
            status: "Starting...".to_string(),
            status_banner: None,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Ready { commit, items } => {
                    self.status = format!("{} items", items.len());
                    self.list = Some(ReorderList::new(
                        items,
                        ListGeometry::uniform(self.settings.row_height),
                        self.settings.spring,
                        OrderPersistence::new(commit.clone()),
                    ));
                    self.commit = Some(commit);
                }
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::Error(err) => self.show_error(&err),
                UiEvent::ItemsLoaded(items) => {
                    if let Some(list) = self.list.as_mut() {
                        self.status = format!("{} items", items.len());
                        list.replace_items(items);
                    }
                }
                UiEvent::ItemCreated(item) => {
                    if let Some(list) = self.list.as_mut() {
                        self.status = format!("Added \"{}\"", item.title);
                        list.insert_local(item);
                    }
                }
                UiEvent::ItemUpdated(item) => {
                    if let Some(list) = self.list.as_mut() {
                        list.update_local(item);
                    }
                }
                UiEvent::ItemDeleted(id) => {
                    if let Some(list) = self.list.as_mut() {
                        list.remove_local(id);
                    }
                }
                UiEvent::Persistence(event) => self.on_persistence_event(event),
            }
        }
    }

    fn on_persistence_event(&mut self, event: PersistenceEvent) {
        match event {
            PersistenceEvent::Committed { generation } => {
                self.status = "Order saved".to_string();
                if let Some(list) = self.list.as_mut() {
                    list.acknowledge_commit(generation);
                }
                if self
                    .status_banner
                    .as_ref()
                    .is_some_and(|banner| banner.retry_generation.is_some())
                {
                    self.status_banner = None;
                }
                tracing::debug!(generation, "order committed");
            }
            PersistenceEvent::Retrying { attempt, error, .. } => {
                self.status = format!("Saving order (attempt {} failed: {error})", attempt);
            }
            PersistenceEvent::CommitFailed { generation, error } => {
                let err = UiError::from_message(UiErrorContext::Commit, error.to_string());
                self.status_banner = Some(StatusBanner {
                    severity: StatusBannerSeverity::Error,
                    message: format!("Couldn't save the new order: {}", err.message()),
                    retry_generation: Some(generation),
                });
                self.status = "Order not saved".to_string();
            }
        }
    }

    fn show_error(&mut self, err: &UiError) {
        tracing::warn!(context = ?err.context(), "{}", err.message());
        self.status_banner = Some(StatusBanner {
            severity: StatusBannerSeverity::Error,
            message: format!("{}: {}", err_label(err.category()), err.message()),
            retry_generation: None,
        });
    }

    fn handle_engine_events(&mut self) {
        let Some(list) = self.list.as_mut() else {
            return;
        };
        for event in list.drain_events() {
            match event {
                EngineEvent::Haptic(kind) => {
                    // No haptic device on desktop; the lift shadow is the feedback.
                    tracing::trace!(?kind, "haptic feedback");
                }
                EngineEvent::Lifted { id, index } => {
                    tracing::debug!(item = %id, index, "item lifted");
                }
                EngineEvent::Reordered { .. } | EngineEvent::Settling { .. } => {}
                EngineEvent::Cancelled { .. } => {
                    self.status = "Reorder cancelled".to_string();
                }
                EngineEvent::SessionAborted { reason, .. } => {
                    self.status_banner = Some(StatusBanner {
                        severity: StatusBannerSeverity::Warning,
                        message: format!("Reorder abandoned: {reason}"),
                        retry_generation: None,
                    });
                }
                EngineEvent::CommitRequested(plan) => {
                    self.status = format!("Saving order ({} items)...", plan.assignments().len());
                }
            }
        }
    }

    /// Turns this frame's pointer state into drag-session calls.
    fn drive_gesture(&mut self, ctx: &egui::Context) {
        let (pointer_y, down, now, escape, focused) = ctx.input(|i| {
            (
                i.pointer.latest_pos().map(|pos| pos.y),
                i.pointer.primary_down(),
                i.time,
                i.key_pressed(egui::Key::Escape),
                i.focused,
            )
        });
        let action = if escape || !focused {
            self.gesture.interrupt()
        } else {
            self.gesture.pointer(pointer_y, down, now)
        };

        let Some(list) = self.list.as_mut() else {
            return;
        };
        match action {
            Some(GestureAction::Lift(id)) => {
                if !list.on_drag_start(id) {
                    self.gesture.reset();
                }
            }
            Some(GestureAction::Move(delta)) => list.on_drag_move(delta),
            Some(GestureAction::Release) => {
                list.on_drag_end();
            }
            Some(GestureAction::Cancel) => list.on_drag_cancel(),
            None => {}
        }
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        let Some(banner) = self.status_banner.clone() else {
            return;
        };
        let (fill, stroke) = match banner.severity {
            StatusBannerSeverity::Error => (
                egui::Color32::from_rgb(111, 53, 53),
                egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)),
            ),
            StatusBannerSeverity::Warning => (
                egui::Color32::from_rgb(104, 86, 40),
                egui::Stroke::new(1.0, egui::Color32::from_rgb(170, 142, 70)),
            ),
        };

        egui::Frame::NONE
            .fill(fill)
            .stroke(stroke)
            .corner_radius(8.0)
            .inner_margin(egui::Margin::symmetric(10, 8))
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new(&banner.message).color(egui::Color32::WHITE));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Dismiss").clicked() {
                            self.status_banner = None;
                        }
                        if banner.retry_generation.is_some() && ui.button("Retry").clicked() {
                            if let Some(commit) = &self.commit {
                                commit.retry();
                                self.status = "Retrying save...".to_string();
                            }
                        }
                    });
                });
            });
        ui.add_space(6.0);
    }

    fn show_add_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let title = ui.add(
                egui::TextEdit::singleline(&mut self.new_title)
                    .hint_text("New item")
                    .desired_width(ui.available_width() - 150.0),
            );
            ui.add(
                egui::TextEdit::singleline(&mut self.new_tag)
                    .hint_text("tag")
                    .desired_width(70.0),
            );
            let submitted = title.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.button("Add").clicked() || submitted) && !self.new_title.trim().is_empty() {
                let mut record = NewRecord::new(self.new_title.trim());
                let tag = self.new_tag.trim();
                if !tag.is_empty() {
                    record = record.with_tag(tag);
                }
                dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::Add(record),
                    &mut self.status,
                );
                self.new_title.clear();
            }
        });
    }

    fn show_filter_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Tag");
            ui.add(
                egui::TextEdit::singleline(&mut self.view.tag_filter)
                    .hint_text("all")
                    .desired_width(100.0),
            );
            ui.checkbox(&mut self.view.hide_done, "Hide done");
            if ui.button("Reload").clicked() {
                dispatch_backend_command(&self.cmd_tx, BackendCommand::Reload, &mut self.status);
            }
        });
    }

    fn apply_row_actions(&mut self, actions: Vec<RowAction>) {
        for action in actions {
            let cmd = match action {
                RowAction::Press { id, y, now } => {
                    self.gesture.press(id, y, now);
                    continue;
                }
                RowAction::SetDone { id, done } => BackendCommand::Update {
                    id,
                    patch: RecordPatch {
                        done: Some(done),
                        ..RecordPatch::default()
                    },
                },
                RowAction::Delete { id } => BackendCommand::Delete { id },
            };
            dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
        }
    }
}

impl eframe::App for TodoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.drive_gesture(ctx);

        let dt = ctx.input(|i| i.stable_dt).min(MAX_FRAME_SECS);
        let animating = self
            .list
            .as_mut()
            .is_some_and(|list| list.tick(Duration::from_secs_f32(dt)));
        self.handle_engine_events();

        egui::TopBottomPanel::top("todo_header").show(ctx, |ui| {
            ui.add_space(6.0);
            self.show_add_row(ui);
            self.show_filter_row(ui);
            ui.add_space(4.0);
        });
        egui::TopBottomPanel::bottom("todo_status").show(ctx, |ui| {
            ui.small(egui::RichText::new(&self.status).weak());
        });

        let mut actions = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_status_banner(ui);
            match self.list.as_mut() {
                None => {
                    ui.centered_and_justified(|ui| ui.spinner());
                }
                Some(list) => {
                    let filter = list_view::RowFilter {
                        tag: self.view.tag_filter.trim(),
                        hide_done: self.view.hide_done,
                    };
                    actions = list_view::show(ui, list, &filter, self.gesture.is_dragging());
                }
            }
        });
        self.apply_row_actions(actions);

        if animating || self.gesture.is_dragging() || self.gesture.awaiting_hold() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        if let Ok(serialized) = serde_json::to_string(&self.view) {
            storage.set_string(VIEW_SETTINGS_KEY, serialized);
        }
    }
}
