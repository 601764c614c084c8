//! UI layer for desktop GUI: app shell and the reorderable list view.

pub mod app;
pub mod list_view;

pub use app::TodoApp;
