//! Errors raised outside the engine: configuration, the pending-upload
//! ledger and logging setup.

use archive_sync::SyncError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration file {0} does not exist")]
    ConfigMissing(PathBuf),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("ledger record {0} not found")]
    RecordNotFound(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        AppError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Ledger failures surface to the engine through `AttendanceRecords`.
impl From<AppError> for SyncError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Sync(e) => e,
            AppError::RecordNotFound(id) => {
                SyncError::not_found(format!("Ledger record {} not found", id))
            }
            other => SyncError::internal(other.to_string()),
        }
    }
}
