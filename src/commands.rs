//! Operations behind the `archive-ctl` subcommands.

use crate::error::{AppError, AppResult};
use crate::storage::PendingLedger;
use archive_sync::ArchiveService;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Copy `source` into the staging directory under a unique name; the
/// engine deletes staged files after a confirmed upload, never the
/// operator's original.
pub async fn stage_file(staging_dir: &Path, source: &Path) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| AppError::io(staging_dir, e))?;

    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into());
    let staged = staging_dir.join(format!("{}-{}", uuid::Uuid::new_v4(), file_name));

    tokio::fs::copy(source, &staged)
        .await
        .map_err(|e| AppError::io(source, e))?;
    Ok(staged)
}

/// Logical name for a file when the operator gave none.
pub fn default_logical_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySummary {
    /// (entry id, remote url)
    pub archived: Vec<(String, String)>,
    /// Entries whose staged file is gone; they cannot be retried.
    pub missing: Vec<String>,
    /// (entry id, error). An entry that uploaded but could not be
    /// recorded carries its remote url in the error.
    pub failed: Vec<(String, String)>,
}

/// Re-run the upload of every pending entry whose staged file still
/// exists, attaching the result to the existing entry.
pub async fn retry_pending(
    service: &ArchiveService,
    ledger: &PendingLedger,
) -> AppResult<RetrySummary> {
    let mut summary = RetrySummary::default();

    for entry in ledger.pending().await? {
        if !tokio::fs::try_exists(&entry.local_path).await.unwrap_or(false) {
            warn!(id = %entry.id, path = %entry.local_path.display(), "staged file missing, skipping");
            summary.missing.push(entry.id);
            continue;
        }

        let request = entry.request();
        let result = match service
            .upload_retaining(
                &request.local_path,
                &request.logical_name,
                &request.destination_sub_path,
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(id = %entry.id, error = %e, "retry failed");
                summary.failed.push((entry.id, e.to_string()));
                continue;
            }
        };

        // The staged file stays until the ledger holds the link.
        match ledger.attach(&entry.id, &result.remote_url).await {
            Ok(()) => {
                service.discard_staged(&request.local_path).await;
                info!(id = %entry.id, name = %result.final_name, "retried upload archived");
                summary.archived.push((entry.id, result.remote_url));
            }
            Err(e) => {
                warn!(
                    id = %entry.id,
                    remote_url = %result.remote_url,
                    error = %e,
                    "uploaded but ledger not updated"
                );
                summary.failed.push((
                    entry.id,
                    format!("uploaded to {} but ledger not updated: {}", result.remote_url, e),
                ));
            }
        }
    }

    Ok(summary)
}
