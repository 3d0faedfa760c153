//! Client-credentials authentication against the Microsoft identity
//! platform, and the process-wide credential cache.
//!
//! `CredentialCache::get_token` returns the cached bearer while it has
//! more than the configured margin left; otherwise it performs one
//! exchange on behalf of every concurrent caller.

use crate::error::{SyncError, SyncResult};
use crate::types::{token_url, ArchiveConfig, Credential, TokenResponse};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Scope requesting every application permission granted to the app.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Fallback lifetime when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Performs one credential exchange with the identity provider.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> SyncResult<Credential>;
}

// ═══════════════════════════════════════════════════════════════════════
//  Client-credentials grant
// ═══════════════════════════════════════════════════════════════════════

pub struct ClientCredentialsExchange {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl ClientCredentialsExchange {
    pub fn new(config: &ArchiveConfig) -> SyncResult<Self> {
        if config.client_id.is_empty()
            || config.tenant_id.is_empty()
            || config.client_secret.expose_secret().is_empty()
        {
            return Err(SyncError::not_configured(
                "client_id, client_secret, and tenant_id are all required",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .map_err(|e| SyncError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_url: token_url(&config.authority_host, &config.tenant_id),
            client_id: config.client_id.clone(),
            client_secret: SecretString::new(config.client_secret.expose_secret().clone()),
        })
    }
}

#[async_trait]
impl TokenExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> SyncResult<Credential> {
        debug!("Token request → {}", self.token_url);

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("grant_type", "client_credentials"),
            ("scope", GRAPH_DEFAULT_SCOPE),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| SyncError::auth(format!("Token request failed: {}", e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| SyncError::auth(format!("Token response unreadable: {}", e)))?;

        if !(200..300).contains(&status) {
            let mut err = SyncError::from_graph_response(status, &body);
            err.code = crate::error::SyncErrorCode::AuthFailed;
            return Err(err);
        }

        parse_token_response(&body)
    }
}

fn parse_token_response(body: &str) -> SyncResult<Credential> {
    let resp: TokenResponse = serde_json::from_str(body)
        .map_err(|e| SyncError::auth(format!("Malformed token response: {}", e)))?;

    if resp.access_token.is_empty() {
        return Err(SyncError::auth("No access_token in response"));
    }
    if !resp.token_type.eq_ignore_ascii_case("bearer") {
        warn!("Unexpected token type {}", resp.token_type);
    }

    let expires_in = resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
    debug!("Parsed token, expires in {}s", expires_in);

    Ok(Credential {
        token: resp.access_token,
        expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
    })
}

// ═══════════════════════════════════════════════════════════════════════
//  Cache
// ═══════════════════════════════════════════════════════════════════════

pub struct CredentialCache {
    exchange: Arc<dyn TokenExchange>,
    margin: chrono::Duration,
    cached: RwLock<Option<Credential>>,
    refresh: Mutex<()>,
}

impl CredentialCache {
    pub fn new(exchange: Arc<dyn TokenExchange>, margin_secs: i64) -> Self {
        Self {
            exchange,
            margin: chrono::Duration::seconds(margin_secs.max(0)),
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// A credential with at least the safety margin left.
    pub async fn get_token(&self) -> SyncResult<Credential> {
        if let Some(cred) = self.fresh().await {
            return Ok(cred);
        }

        let _refreshing = self.refresh.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(cred) = self.fresh().await {
            return Ok(cred);
        }

        let cred = self.exchange.exchange().await?;
        if !cred.is_fresh(self.margin) {
            warn!(
                "Issued token lifetime is shorter than the {}s margin",
                self.margin.num_seconds()
            );
        }
        info!("Acquired access token, expires at {}", cred.expires_at);
        *self.cached.write().await = Some(cred.clone());
        Ok(cred)
    }

    /// Drop the cached credential so the next call re-exchanges.
    pub async fn invalidate(&self) {
        if self.cached.write().await.take().is_some() {
            debug!("Cached access token invalidated");
        }
    }

    async fn fresh(&self) -> Option<Credential> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_fresh(self.margin))
            .cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
