//! # Pending-upload ledger
//!
//! Durable record of archive requests for the operator CLI. An entry is
//! written before its upload starts and gains a remote reference once
//! the upload completes, so a crash or failed transfer leaves a pending
//! entry that `retry` can pick up again.
//!
//! ## Data Structure
//!
//! The ledger is a single pretty-printed JSON file containing:
//! - **entries**: every recorded request with its optional remote link
//! - **timestamp**: Unix timestamp of last modification
//!
//! Writes go to a sibling temporary file that is then renamed over the
//! ledger, so readers never observe a half-written file.

use crate::error::{AppError, AppResult};
use archive_sync::{AttendanceRecords, SyncResult, UploadRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One archive request and, once known, where it landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub local_path: PathBuf,
    pub logical_name: String,
    #[serde(default)]
    pub destination_sub_path: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn is_pending(&self) -> bool {
        self.remote_url.is_none()
    }

    /// The request that would re-run this entry's upload.
    pub fn request(&self) -> UploadRequest {
        UploadRequest::new(
            self.local_path.clone(),
            self.logical_name.clone(),
            self.destination_sub_path.clone(),
        )
    }
}

/// On-disk ledger layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerData {
    pub entries: Vec<LedgerEntry>,
    /// Unix timestamp of the last write.
    pub timestamp: u64,
}

pub type PendingLedgerState = Arc<PendingLedger>;

pub struct PendingLedger {
    store_path: PathBuf,
    /// Serializes read-modify-write cycles within the process.
    write_lock: Mutex<()>,
}

impl PendingLedger {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn into_state(self) -> PendingLedgerState {
        Arc::new(self)
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    pub async fn has_stored_data(&self) -> bool {
        tokio::fs::try_exists(&self.store_path)
            .await
            .unwrap_or(false)
    }

    /// Current contents; a missing file is an empty ledger.
    pub async fn load_data(&self) -> AppResult<LedgerData> {
        match tokio::fs::read_to_string(&self.store_path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| AppError::json(&self.store_path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerData::default()),
            Err(e) => Err(AppError::io(&self.store_path, e)),
        }
    }

    async fn save_data(&self, data: &mut LedgerData) -> AppResult<()> {
        data.timestamp = Utc::now().timestamp().max(0) as u64;
        if let Some(parent) = self.store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::io(parent, e))?;
        }

        let json =
            serde_json::to_string_pretty(data).map_err(|e| AppError::json(&self.store_path, e))?;
        let tmp = self.store_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.store_path)
            .await
            .map_err(|e| AppError::io(&self.store_path, e))
    }

    /// Durably record a request; returns the new entry.
    pub async fn record(&self, request: &UploadRequest) -> AppResult<LedgerEntry> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;

        let entry = LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            local_path: request.local_path.clone(),
            logical_name: request.logical_name.clone(),
            destination_sub_path: request.destination_sub_path.clone(),
            recorded_at: Utc::now(),
            remote_url: None,
            archived_at: None,
        };
        data.entries.push(entry.clone());
        self.save_data(&mut data).await?;

        debug!("Ledger entry {} recorded for {}", entry.id, entry.logical_name);
        Ok(entry)
    }

    /// Store the remote link against an entry.
    pub async fn attach(&self, id: &str, remote_url: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;

        let entry = data
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;
        entry.remote_url = Some(remote_url.to_string());
        entry.archived_at = Some(Utc::now());
        self.save_data(&mut data).await?;

        info!("Ledger entry {} archived at {}", id, remote_url);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<LedgerEntry>> {
        Ok(self
            .load_data()
            .await?
            .entries
            .into_iter()
            .find(|e| e.id == id))
    }

    pub async fn entries(&self) -> AppResult<Vec<LedgerEntry>> {
        Ok(self.load_data().await?.entries)
    }

    /// Entries still waiting for a remote reference, oldest first.
    pub async fn pending(&self) -> AppResult<Vec<LedgerEntry>> {
        let mut pending: Vec<_> = self
            .entries()
            .await?
            .into_iter()
            .filter(LedgerEntry::is_pending)
            .collect();
        pending.sort_by_key(|e| e.recorded_at);
        Ok(pending)
    }
}

#[async_trait]
impl AttendanceRecords for PendingLedger {
    async fn record_pending_upload(&self, request: &UploadRequest) -> SyncResult<String> {
        Ok(self.record(request).await?.id)
    }

    async fn attach_remote_reference(
        &self,
        local_record_id: &str,
        remote_url: &str,
    ) -> SyncResult<()> {
        Ok(self.attach(local_record_id, remote_url).await?)
    }
}
