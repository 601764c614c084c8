//! Backend commands queued from UI to backend worker.
//!
//! Reorders never travel through here; they go straight to the commit worker
//! through the list's persistence sink.

use shared::domain::{ItemId, NewRecord, RecordPatch};

#[derive(Debug)]
pub enum BackendCommand {
    Reload,
    Add(NewRecord),
    Update { id: ItemId, patch: RecordPatch },
    Delete { id: ItemId },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Add(_) => "add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}
