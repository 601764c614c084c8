//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};
use reorder_core::{config::Settings, CommitHandle};
use storage::Storage;
use tokio::{runtime::Handle, sync::broadcast::error::RecvError};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

/// Starts the backend thread. It owns the tokio runtime, the sqlite pool and
/// the commit worker; the UI thread only ever talks to it through channels.
pub fn launch(
    settings: Settings,
    database_url: String,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Opening list...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let storage = match Storage::new(&database_url).await {
                Ok(storage) => Arc::new(storage),
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                        UiErrorContext::BackendStartup,
                        format!("backend worker startup failure: could not open '{database_url}': {err:#}"),
                    )));
                    tracing::error!(database_url, "failed to open storage: {err:#}");
                    return;
                }
            };
            let items = match storage.list().await {
                Ok(items) => items,
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                        UiErrorContext::Load,
                        format!("{err:#}"),
                    )));
                    Vec::new()
                }
            };

            let (commit, worker) =
                CommitHandle::spawn(storage.clone(), settings.commit, &Handle::current());
            forward_persistence_events(&commit, ui_tx.clone());
            let _ = ui_tx.try_send(UiEvent::Ready {
                commit: commit.clone(),
                items,
            });
            tracing::info!(database_url, "backend worker ready");

            while let Ok(cmd) = cmd_rx.recv() {
                if let Some(event) = execute(&storage, cmd).await {
                    let _ = ui_tx.try_send(event);
                }
            }

            commit.shutdown();
            if let Err(err) = worker.await {
                tracing::warn!("commit worker ended abnormally: {err}");
            }
        });
    });
}

async fn execute(storage: &Storage, cmd: BackendCommand) -> Option<UiEvent> {
    let name = cmd.name();
    let result = match cmd {
        BackendCommand::Reload => storage.list().await.map(UiEvent::ItemsLoaded),
        BackendCommand::Add(record) => storage.insert(&record).await.map(UiEvent::ItemCreated),
        BackendCommand::Update { id, patch } => match storage.update(id, &patch).await {
            Ok(Some(item)) => Ok(UiEvent::ItemUpdated(item)),
            Ok(None) => Ok(UiEvent::ItemDeleted(id)),
            Err(err) => Err(err),
        },
        BackendCommand::Delete { id } => storage.delete(id).await.map(|_| UiEvent::ItemDeleted(id)),
    };

    match result {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!(command = name, "backend command failed: {err:#}");
            let context = if name == "reload" {
                UiErrorContext::Load
            } else {
                UiErrorContext::Edit
            };
            Some(UiEvent::Error(UiError::from_message(context, format!("{err:#}"))))
        }
    }
}

fn forward_persistence_events(commit: &CommitHandle, ui_tx: Sender<UiEvent>) {
    let mut events = commit.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if ui_tx.try_send(UiEvent::Persistence(event)).is_err() {
                        tracing::warn!("ui event queue unavailable; dropping persistence event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "persistence event forwarder lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
