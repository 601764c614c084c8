//! UI/backend events and error modeling for desktop GUI controller.

use reorder_core::{CommitHandle, PersistenceEvent};
use shared::domain::{ItemId, OrderedItem};

pub enum UiEvent {
    /// Storage is open and the commit worker is running.
    Ready {
        commit: CommitHandle,
        items: Vec<OrderedItem>,
    },
    Info(String),
    Error(UiError),
    ItemsLoaded(Vec<OrderedItem>),
    ItemCreated(OrderedItem),
    ItemUpdated(OrderedItem),
    ItemDeleted(ItemId),
    Persistence(PersistenceEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Storage,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Load,
    Edit,
    Commit,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("locked")
            || message_lower.contains("busy")
            || message_lower.contains("unavailable")
            || message_lower.contains("disk")
            || message_lower.contains("sqlite")
            || message_lower.contains("database")
        {
            UiErrorCategory::Storage
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("not found")
            || message_lower.contains("rejected")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Whether a plain retry is likely to help.
    pub fn is_retryable(&self) -> bool {
        self.category == UiErrorCategory::Storage
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
