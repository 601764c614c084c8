use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::{animation::SpringConfig, worker::RetryPolicy};

pub const DEFAULT_SETTINGS_FILE: &str = "reorder.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub row_height: f32,
    pub spring: SpringConfig,
    pub commit: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/todo.db".into(),
            row_height: 44.0,
            spring: SpringConfig::default(),
            commit: RetryPolicy::default(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `path` if it exists and parses, then environment overrides
/// looked up through `env`.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match toml::from_str::<Settings>(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    };

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = parse_env::<f32>(&env, "APP__ROW_HEIGHT") {
        settings.row_height = v;
    }
    if let Some(v) = parse_env::<f32>(&env, "APP__SPRING_STIFFNESS") {
        settings.spring.stiffness = v;
    }
    if let Some(v) = parse_env::<f32>(&env, "APP__SPRING_DAMPING") {
        settings.spring.damping = v;
    }
    if let Some(v) = parse_env::<u32>(&env, "APP__COMMIT_MAX_ATTEMPTS") {
        settings.commit.max_attempts = v;
    }
    if let Some(v) = parse_env::<u64>(&env, "APP__COMMIT_RETRY_DELAY_MS") {
        settings.commit.delay = Duration::from_millis(v);
    }

    settings
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
