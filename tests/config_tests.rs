use attendance_archive::{AppConfig, AppError};
use secrecy::ExposeSecret;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG_JSON: &str = r#"{
    "archive": {
        "client_id": "app-id",
        "client_secret": "from-file",
        "tenant_id": "contoso",
        "base_folder": "HR/Attendance",
        "drive_owner": "hr@contoso.com",
        "max_retries": 5
    },
    "staging_dir": "/var/lib/archive/staging",
    "ledger_path": "/var/lib/archive/pending.json",
    "log": { "level": "debug", "json": true }
}"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn clear_archive_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("ARCHIVE_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_load_from_file() {
    clear_archive_env();
    let file = write_config(CONFIG_JSON);

    let cfg = AppConfig::load(Some(file.path())).unwrap();

    assert_eq!(cfg.archive.client_id, "app-id");
    assert_eq!(cfg.archive.client_secret.expose_secret(), "from-file");
    assert_eq!(cfg.archive.base_folder, "HR/Attendance");
    assert_eq!(cfg.archive.max_retries, 5);
    // Unset fields keep their defaults.
    assert_eq!(cfg.archive.graph_base_url, "https://graph.microsoft.com/v1.0");
    assert_eq!(cfg.ledger_path.to_str(), Some("/var/lib/archive/pending.json"));
    assert_eq!(cfg.log.level, "debug");
    assert!(cfg.log.json);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_archive_env();
    let file = write_config(CONFIG_JSON);
    std::env::set_var("ARCHIVE_CLIENT_SECRET", "from-env");
    std::env::set_var("ARCHIVE_BASE_FOLDER", "Archive");

    let cfg = AppConfig::load(Some(file.path()));
    clear_archive_env();
    let cfg = cfg.unwrap();

    assert_eq!(cfg.archive.client_secret.expose_secret(), "from-env");
    assert_eq!(cfg.archive.base_folder, "Archive");
    assert_eq!(cfg.archive.client_id, "app-id");
}

#[test]
#[serial]
fn test_bad_environment_value() {
    clear_archive_env();
    std::env::set_var("ARCHIVE_MAX_RETRIES", "many");

    let result = AppConfig::load(Some(write_config("{}").path()));
    clear_archive_env();

    assert!(matches!(result, Err(AppError::InvalidEnv { .. })));
}

#[test]
#[serial]
fn test_missing_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppConfig::load(Some(dir.path().join("nope.json").as_path()));
    assert!(matches!(result, Err(AppError::ConfigMissing(_))));
}

#[test]
#[serial]
fn test_malformed_file() {
    let file = write_config("{ not json");
    let result = AppConfig::load(Some(file.path()));
    assert!(matches!(result, Err(AppError::Json { .. })));
}

#[test]
fn test_debug_output_redacts_secret() {
    let file = write_config(CONFIG_JSON);
    let cfg = AppConfig::from_file(file.path()).unwrap();
    let debug = format!("{:?}", cfg);
    assert!(!debug.contains("from-file"));
    assert!(debug.contains("REDACTED"));
}
