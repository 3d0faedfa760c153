//! Inline and background upload flows.
//!
//! The coordinator owns a staged file for the duration of its transfer:
//! the file is removed once the upload is confirmed and its result has
//! been handed off, and left untouched after any failure so a later pass
//! can resubmit it.

use crate::error::{SyncError, SyncResult};
use crate::staging::StagingCleaner;
use crate::types::{UploadRequest, UploadResult};
use crate::uploader::Uploader;
use async_trait::async_trait;
use log::{error, info, warn};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The attendance/document subsystem's side of a deferred upload.
#[async_trait]
pub trait AttendanceRecords: Send + Sync {
    /// Durably record that an upload is about to start.
    async fn record_pending_upload(&self, request: &UploadRequest) -> SyncResult<String>;

    /// Store the archived file's link against the local record.
    async fn attach_remote_reference(&self, local_record_id: &str, remote_url: &str)
        -> SyncResult<()>;
}

#[derive(Clone)]
pub struct SyncCoordinator {
    uploader: Uploader,
    cleaner: StagingCleaner,
}

impl SyncCoordinator {
    pub fn new(uploader: Uploader) -> Self {
        Self {
            uploader,
            cleaner: StagingCleaner::new(),
        }
    }

    /// Upload and wait. The staged file is removed only on success.
    pub async fn upload_sync(
        &self,
        local_path: &Path,
        logical_name: &str,
        destination_sub_path: &str,
    ) -> SyncResult<UploadResult> {
        let result = self
            .upload_retaining(local_path, logical_name, destination_sub_path)
            .await?;
        self.cleaner.cleanup(local_path).await;
        Ok(result)
    }

    /// Upload and wait, leaving the staged file in place. The caller
    /// removes it with [`discard_staged`](Self::discard_staged) once the
    /// result has been stored somewhere durable.
    pub async fn upload_retaining(
        &self,
        local_path: &Path,
        logical_name: &str,
        destination_sub_path: &str,
    ) -> SyncResult<UploadResult> {
        self.uploader
            .upload(local_path, logical_name, destination_sub_path)
            .await
    }

    pub async fn discard_staged(&self, local_path: &Path) -> bool {
        self.cleaner.cleanup(local_path).await
    }

    /// Start the upload on the runtime and return at once. The staged
    /// file is removed after `on_complete` has run. Dropping the handle
    /// does not cancel the transfer.
    pub fn upload_async<C, CF, E, EF>(
        &self,
        request: UploadRequest,
        on_complete: C,
        on_error: E,
    ) -> JoinHandle<()>
    where
        C: FnOnce(UploadResult) -> CF + Send + 'static,
        CF: Future<Output = ()> + Send + 'static,
        E: FnOnce(SyncError) -> EF + Send + 'static,
        EF: Future<Output = ()> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            match this
                .upload_retaining(
                    &request.local_path,
                    &request.logical_name,
                    &request.destination_sub_path,
                )
                .await
            {
                Ok(result) => {
                    on_complete(result).await;
                    this.cleaner.cleanup(&request.local_path).await;
                }
                Err(e) => {
                    error!(
                        "Background upload of {} failed, staged file kept at {}: {}",
                        request.logical_name,
                        request.local_path.display(),
                        e
                    );
                    on_error(e).await;
                }
            }
        })
    }

    /// Record first, then upload in the background and attach the remote
    /// link on success. The staged file is removed only once the link is
    /// attached. Returns the local record id and the task handle.
    pub async fn archive_pending(
        &self,
        records: Arc<dyn AttendanceRecords>,
        request: UploadRequest,
    ) -> SyncResult<(String, JoinHandle<()>)> {
        let record_id = records.record_pending_upload(&request).await?;
        info!(
            "Recorded pending upload {} for {}",
            record_id, request.logical_name
        );

        let this = self.clone();
        let attach_id = record_id.clone();
        let handle = tokio::spawn(async move {
            let result = match this
                .upload_retaining(
                    &request.local_path,
                    &request.logical_name,
                    &request.destination_sub_path,
                )
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    error!(
                        "Upload for record {} failed, staged file kept at {}: {}",
                        attach_id,
                        request.local_path.display(),
                        e
                    );
                    return;
                }
            };

            match records
                .attach_remote_reference(&attach_id, &result.remote_url)
                .await
            {
                Ok(()) => {
                    this.cleaner.cleanup(&request.local_path).await;
                }
                Err(e) => warn!(
                    "Uploaded {} to {} but could not attach it to record {}, staged file kept at {}: {}",
                    result.final_name,
                    result.remote_url,
                    attach_id,
                    request.local_path.display(),
                    e
                ),
            }
        });
        Ok((record_id, handle))
    }
}
