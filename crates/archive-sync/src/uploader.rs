//! Staged file → remote archive.
//!
//! Names the file, ensures the destination folder chain, and performs a
//! single content upload with the `replace` conflict policy. A retried
//! attempt always mints a fresh name, so `replace` never overwrites an
//! earlier archive.

use crate::drive::DriveApi;
use crate::error::{SyncError, SyncResult};
use crate::naming;
use crate::paths::PathEnsurer;
use crate::resolver::AddressResolver;
use crate::types::{ConflictBehavior, UploadResult};
use chrono::Utc;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct Uploader {
    drive: Arc<dyn DriveApi>,
    resolver: Arc<AddressResolver>,
    paths: PathEnsurer,
}

impl Uploader {
    pub fn new(drive: Arc<dyn DriveApi>, resolver: Arc<AddressResolver>) -> Self {
        Self {
            paths: PathEnsurer::new(drive.clone()),
            drive,
            resolver,
        }
    }

    pub async fn upload(
        &self,
        local_path: &Path,
        logical_name: &str,
        destination_sub_path: &str,
    ) -> SyncResult<UploadResult> {
        let local_size = match tokio::fs::metadata(local_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                return Err(SyncError::invalid_request(format!(
                    "{} is not a regular file",
                    local_path.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::local_file_missing(local_path.display()))
            }
            Err(e) => return Err(e.into()),
        };

        let final_name = naming::final_name(logical_name, Utc::now())?;
        let content_type = naming::content_type_for(&final_name);
        let segments = naming::sanitize_sub_path(destination_sub_path);

        let root = self.resolver.resolve_root().await?;
        self.paths.ensure(&root, &segments).await?;

        let target = root.content_address(&segments, &final_name);
        debug!("Uploading {} → {}", local_path.display(), target);

        let item = self
            .drive
            .upload_content(
                &target,
                local_path,
                local_size,
                &content_type,
                ConflictBehavior::Replace,
            )
            .await?;

        let size = item
            .size
            .filter(|s| *s >= 0)
            .map(|s| s as u64)
            .unwrap_or(local_size);
        let result = UploadResult {
            drive_id: item
                .drive_id()
                .map(String::from)
                .or_else(|| root.volume_id().map(String::from)),
            remote_url: item.web_url.clone().unwrap_or_default(),
            final_name: item.name.clone().unwrap_or(final_name),
            remote_id: item.id,
            size,
            content_type,
            uploaded_at: Utc::now(),
        };

        info!(
            "Archived {} as {} ({} bytes)",
            logical_name, result.final_name, result.size
        );
        Ok(result)
    }
}
