use super::{load_settings_from, normalize_database_url, prepare_database_url, Settings};

use std::{
    collections::HashMap,
    env, fs,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

fn temp_root(label: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("reorder_core_{label}_{suffix}"))
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_yields_defaults() {
    let settings = load_settings_from(Path::new("/definitely/not/here.toml"), no_env);
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_then_env_overrides() {
    let root = temp_root("settings");
    fs::create_dir_all(&root).expect("temp root");
    let path = root.join("reorder.toml");
    fs::write(
        &path,
        r#"
database_url = "sqlite://./from-file.db"
row_height = 52

[spring]
stiffness = 300.0
damping = 30.0

[commit]
max_attempts = 5
delay_ms = 40
"#,
    )
    .expect("write settings");

    let from_file = load_settings_from(&path, no_env);
    assert_eq!(from_file.database_url, "sqlite://./from-file.db");
    assert_eq!(from_file.row_height, 52.0);
    assert_eq!(from_file.spring.stiffness, 300.0);
    assert_eq!(from_file.commit.max_attempts, 5);
    assert_eq!(from_file.commit.delay, Duration::from_millis(40));

    let env: HashMap<&str, &str> = [
        ("DATABASE_URL", "sqlite://./plain.db"),
        ("APP__DATABASE_URL", "sqlite://./app.db"),
        ("APP__COMMIT_MAX_ATTEMPTS", "9"),
        ("APP__SPRING_DAMPING", "not-a-number"),
    ]
    .into_iter()
    .collect();
    let overridden = load_settings_from(&path, |key| env.get(key).map(|v| v.to_string()));
    assert_eq!(overridden.database_url, "sqlite://./app.db");
    assert_eq!(overridden.commit.max_attempts, 9);
    assert_eq!(overridden.spring.damping, 30.0);

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let root = temp_root("malformed");
    fs::create_dir_all(&root).expect("temp root");
    let path = root.join("reorder.toml");
    fs::write(&path, "row_height = [").expect("write settings");

    assert_eq!(load_settings_from(&path, no_env), Settings::default());

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let root = temp_root("db");
    let db_path = root.join("data").join("todo.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(root.join("data").exists());

    fs::remove_dir_all(root).expect("cleanup");
}
