//! Backend bridge: commands from the UI thread, executed on a tokio runtime.

pub mod commands;
pub mod runtime;
