//! Removal of staged local files once their upload is confirmed.

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct StagingCleaner;

impl StagingCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort delete. Never fails; returns whether a file was removed.
    pub async fn cleanup(&self, local_path: &Path) -> bool {
        match tokio::fs::remove_file(local_path).await {
            Ok(()) => {
                info!("Removed staged file {}", local_path.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Staged file {} already gone", local_path.display());
                false
            }
            Err(e) => {
                warn!(
                    "Could not remove staged file {}: {}",
                    local_path.display(),
                    e
                );
                false
            }
        }
    }
}
