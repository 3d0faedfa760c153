//! Error types for the archive synchronization engine.
//!
//! Every public operation in this crate returns `SyncResult<T>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Convenience alias.
pub type SyncResult<T> = Result<T, SyncError>;

/// Classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncErrorCode {
    /// Credential exchange failed or the resource server rejected the token.
    AuthFailed,
    /// Transport failure or 5xx from the remote service.
    RemoteUnavailable,
    /// Throttled by the remote service (HTTP 429).
    RateLimited,
    /// Base folder or requested remote item does not exist.
    NotFound,
    /// The staged local file vanished before transfer.
    LocalFileMissing,
    /// A logical name sanitized to nothing.
    InvalidName,
    /// Name collision the service refused to resolve.
    Conflict,
    /// Bad request / unexpected remote shape.
    InvalidRequest,
    /// Required configuration is missing.
    NotConfigured,
    /// (De)serialization error.
    SerializationError,
    /// Catch-all internal error.
    InternalError,
}

impl fmt::Display for SyncErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured error returned by every public function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    pub code: SyncErrorCode,
    pub message: String,
    pub status: Option<u16>,
    pub graph_error_code: Option<String>,
    pub request_id: Option<String>,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref gc) = self.graph_error_code {
            write!(f, " (graph: {})", gc)?;
        }
        Ok(())
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    pub fn new(code: SyncErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status: None,
            graph_error_code: None,
            request_id: None,
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::AuthFailed, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::RemoteUnavailable, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::NotFound, msg)
    }

    pub fn local_file_missing(path: impl fmt::Display) -> Self {
        Self::new(
            SyncErrorCode::LocalFileMissing,
            format!("Staged file does not exist: {}", path),
        )
    }

    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::InvalidName, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::InvalidRequest, msg)
    }

    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::NotConfigured, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::InternalError, msg)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == SyncErrorCode::NotFound
    }

    /// Whether a later re-invocation may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            SyncErrorCode::RemoteUnavailable
                | SyncErrorCode::RateLimited
                | SyncErrorCode::AuthFailed
        )
    }

    /// Build an error from a Graph (or identity platform) error response.
    pub fn from_graph_response(status: u16, body: &str) -> Self {
        let code = match status {
            401 | 403 => SyncErrorCode::AuthFailed,
            404 => SyncErrorCode::NotFound,
            409 => SyncErrorCode::Conflict,
            429 => SyncErrorCode::RateLimited,
            _ if status >= 500 => SyncErrorCode::RemoteUnavailable,
            _ => SyncErrorCode::InvalidRequest,
        };

        let (graph_code, inner_msg, request_id) = Self::parse_graph_error_body(body);

        Self {
            code,
            message: inner_msg.unwrap_or_else(|| format!("Graph API error (HTTP {})", status)),
            status: Some(status),
            graph_error_code: graph_code,
            request_id,
        }
    }

    /// Graph errors look like
    /// `{"error":{"code":"…","message":"…","innerError":{"request-id":"…"}}}`;
    /// the token endpoint uses `{"error":"…","error_description":"…"}`.
    fn parse_graph_error_body(body: &str) -> (Option<String>, Option<String>, Option<String>) {
        let Ok(v) = serde_json::from_str::<serde_json::Value>(body) else {
            return (None, None, None);
        };
        let err = &v["error"];
        if let Some(code) = err.as_str() {
            let desc = v["error_description"].as_str().map(String::from);
            return (Some(code.to_string()), desc, None);
        }
        let code = err["code"].as_str().map(String::from);
        let msg = err["message"].as_str().map(String::from);
        let req_id = err["innerError"]["request-id"].as_str().map(String::from);
        (code, msg, req_id)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::unavailable(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            Self::unavailable(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            Self::new(
                SyncErrorCode::SerializationError,
                format!("Response decode error: {}", err),
            )
        } else {
            Self::unavailable(format!("HTTP error: {}", err))
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(
            SyncErrorCode::SerializationError,
            format!("JSON error: {}", err),
        )
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {}", err))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
