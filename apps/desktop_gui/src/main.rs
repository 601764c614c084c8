mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;
use reorder_core::config::{load_settings, prepare_database_url};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::ui::app::{PersistedViewSettings, TodoApp, VIEW_SETTINGS_KEY};

#[derive(Parser, Debug)]
struct Args {
    /// Overrides `database_url` from reorder.toml and the environment.
    #[arg(long)]
    database_url: Option<String>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let settings = load_settings();
    let raw_url = args
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database_url.clone());
    let database_url = match prepare_database_url(&raw_url) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!("invalid database url '{raw_url}': {err:#}");
            raw_url
        }
    };

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    backend_bridge::runtime::launch(settings.clone(), database_url, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("To-do")
            .with_inner_size([520.0, 720.0])
            .with_min_inner_size([360.0, 420.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Reorder To-do",
        options,
        Box::new(move |cc| {
            let view_settings = cc.storage.and_then(|storage| {
                storage
                    .get_string(VIEW_SETTINGS_KEY)
                    .and_then(|text| serde_json::from_str::<PersistedViewSettings>(&text).ok())
            });
            Ok(Box::new(TodoApp::new(
                cmd_tx,
                ui_rx,
                settings,
                view_settings.unwrap_or_default(),
            )))
        }),
    )
}
