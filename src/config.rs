//! Operator configuration.
//!
//! Loaded from a JSON file (explicit `--config`, else the per-user config
//! directory when present, else defaults) and then overridden by
//! `ARCHIVE_*` environment variables.

use crate::error::{AppError, AppResult};
use archive_sync::ArchiveConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const APP_DIR: &str = "attendance-archive";
const ENV_PREFIX: &str = "ARCHIVE_";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub archive: ArchiveConfig,
    /// Where the CLI copies files before handing them to the engine.
    pub staging_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `info,archive_sync=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

impl Default for AppConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            archive: ArchiveConfig::default(),
            staging_dir: data.join("staging"),
            ledger_path: data.join("pending.json"),
            log: LogConfig::default(),
        }
    }
}

/// `<config dir>/attendance-archive/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
}

impl AppConfig {
    /// Resolve the file, parse it, then apply the process environment.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let mut config = match explicit {
            Some(path) if !path.exists() => {
                return Err(AppError::ConfigMissing(path.to_path_buf()))
            }
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| AppError::json(path, e))
    }

    /// Apply `ARCHIVE_*` overrides; unrelated variables are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> AppResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "CLIENT_ID" => self.archive.client_id = value,
                "CLIENT_SECRET" => self.archive.client_secret = SecretString::new(value),
                "TENANT_ID" => self.archive.tenant_id = value,
                "BASE_FOLDER" => self.archive.base_folder = value,
                "DRIVE_ID" => self.archive.drive_id = non_empty(value),
                "DRIVE_OWNER" => self.archive.drive_owner = non_empty(value),
                "GRAPH_BASE_URL" => self.archive.graph_base_url = value,
                "AUTHORITY_HOST" => self.archive.authority_host = value,
                "TIMEOUT_SEC" => self.archive.timeout_sec = parse(&key, &value)?,
                "MAX_RETRIES" => self.archive.max_retries = parse(&key, &value)?,
                "TOKEN_MARGIN_SEC" => self.archive.token_margin_sec = parse(&key, &value)?,
                "STAGING_DIR" => self.staging_dir = PathBuf::from(value),
                "LEDGER_PATH" => self.ledger_path = PathBuf::from(value),
                "LOG_LEVEL" => self.log.level = value,
                "LOG_JSON" => self.log.json = parse_bool(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.trim().is_empty())
}

fn parse<T: FromStr>(var: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| AppError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(var: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AppError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
