//! HTTP client for the Microsoft Graph API.
//!
//! Wraps `reqwest::Client` with per-request bearer injection from the
//! credential cache, retry with exponential back-off for 429 / 5xx and
//! transport errors, one re-authentication on 401, and JSON envelope
//! parsing.

use crate::auth::CredentialCache;
use crate::error::{SyncError, SyncErrorCode, SyncResult};
use crate::types::ArchiveConfig;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Low-level Graph API HTTP client.
#[derive(Clone)]
pub struct GraphApiClient {
    inner: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialCache>,
    max_retries: u32,
}

impl GraphApiClient {
    pub fn new(config: &ArchiveConfig, credentials: Arc<CredentialCache>) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            inner,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            credentials,
            max_retries: config.max_retries,
        })
    }

    /// Full URL for a Graph endpoint path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// GET with optional query parameters.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> SyncResult<serde_json::Value> {
        let url = self.url(path);
        self.execute(|token| self.inner.get(&url).bearer_auth(token).query(query))
            .await
    }

    /// POST JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> SyncResult<serde_json::Value> {
        let url = self.url(path);
        self.execute(|token| self.inner.post(&url).bearer_auth(token).json(body))
            .await
    }

    /// PUT raw bytes (simple upload).
    pub async fn put_bytes(
        &self,
        path: &str,
        query: &[(&str, &str)],
        data: Vec<u8>,
        content_type: &str,
    ) -> SyncResult<serde_json::Value> {
        let url = self.url(path);
        debug!("PUT (bytes) {} ({} bytes)", url, data.len());
        self.execute(|token| {
            self.inner
                .put(&url)
                .bearer_auth(token)
                .query(query)
                .header(CONTENT_TYPE, content_type)
                .body(data.clone())
        })
        .await
    }

    /// PUT a byte range to a resumable upload URL. The URL is
    /// pre-authorized, so no bearer is sent.
    pub async fn put_upload_range(
        &self,
        upload_url: &str,
        body: reqwest::Body,
        range_start: u64,
        range_end: u64,
        total_size: u64,
    ) -> SyncResult<serde_json::Value> {
        let content_range = format!("bytes {}-{}/{}", range_start, range_end, total_size);
        debug!("PUT upload range: {}", content_range);

        let resp = self
            .inner
            .put(upload_url)
            .header("Content-Range", &content_range)
            .header(CONTENT_LENGTH, range_end - range_start + 1)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(SyncError::from)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();

        // 200/201 = completed, 202 = more ranges expected.
        if matches!(status, 200 | 201 | 202) {
            Ok(serde_json::from_str(&body).unwrap_or_default())
        } else {
            Err(SyncError::from_graph_response(status, &body))
        }
    }

    /// Abandon a resumable upload session. Like the range PUTs this goes
    /// to the pre-authorized URL with no bearer, and is tried only once.
    pub async fn cancel_upload_session(&self, upload_url: &str) -> SyncResult<()> {
        debug!("DELETE upload session");
        let resp = self
            .inner
            .delete(upload_url)
            .send()
            .await
            .map_err(SyncError::from)?;

        let status = resp.status().as_u16();
        if resp.status().is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(SyncError::from_graph_response(status, &body))
        }
    }

    // ─── Internal ────────────────────────────────────────────────────

    async fn execute(
        &self,
        build: impl Fn(&str) -> reqwest::RequestBuilder,
    ) -> SyncResult<serde_json::Value> {
        let mut reauthenticated = false;
        let mut attempt: u32 = 0;

        loop {
            let credential = self.credentials.get_token().await?;
            let outcome = match build(&credential.token).send().await {
                Ok(resp) => {
                    let retry_after = Self::retry_after(resp.headers());
                    self.handle_response(resp).await.map_err(|e| (e, retry_after))
                }
                Err(e) => Err((SyncError::from(e), None)),
            };

            let (err, retry_after) = match outcome {
                Ok(v) => return Ok(v),
                Err(failure) => failure,
            };

            if err.status == Some(401) && !reauthenticated {
                warn!("Graph rejected the access token; re-authenticating");
                self.credentials.invalidate().await;
                reauthenticated = true;
                continue;
            }

            if !Self::is_retryable(&err) || attempt >= self.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = retry_after.unwrap_or_else(|| Self::backoff(attempt));
            warn!(
                "Transient Graph error ({}), retry {}/{} in {:?}",
                err, attempt, self.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn handle_response(&self, resp: reqwest::Response) -> SyncResult<serde_json::Value> {
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(SyncError::from)?;

        debug!("Response status={} body_len={}", status, body.len());

        if status >= 400 {
            return Err(SyncError::from_graph_response(status, &body));
        }

        // 204 No Content.
        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&body).map_err(SyncError::from)
    }

    fn retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1).min(6)))
    }

    fn is_retryable(err: &SyncError) -> bool {
        matches!(
            err.code,
            SyncErrorCode::RateLimited | SyncErrorCode::RemoteUnavailable
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
