//! Get-or-create of nested folders below the resolved root.
//!
//! Each segment is looked up under its parent and created with the
//! `replace` conflict policy when missing, so two callers racing on the
//! same segment both end up on one folder. Nothing is cached locally;
//! the remote service is the only record of which folders exist.

use crate::drive::DriveApi;
use crate::error::{SyncError, SyncErrorCode, SyncResult};
use crate::types::{ConflictBehavior, DriveItem, ItemAddress, ResolvedRoot};
use log::{debug, info};
use std::sync::Arc;

#[derive(Clone)]
pub struct PathEnsurer {
    drive: Arc<dyn DriveApi>,
}

impl PathEnsurer {
    pub fn new(drive: Arc<dyn DriveApi>) -> Self {
        Self { drive }
    }

    /// Make sure every segment exists below `root`; returns the id
    /// address of the deepest folder (the root itself for no segments).
    pub async fn ensure<S: AsRef<str>>(
        &self,
        root: &ResolvedRoot,
        segments: &[S],
    ) -> SyncResult<ItemAddress> {
        let mut current = root.folder_address();

        for segment in segments {
            let name = segment.as_ref();
            let folder = self.get_or_create(&current, name).await?;
            current = ItemAddress::item(current.drive.clone(), folder.id);
        }

        Ok(current)
    }

    async fn get_or_create(&self, parent: &ItemAddress, name: &str) -> SyncResult<DriveItem> {
        match self.lookup(parent, name).await? {
            Some(existing) => {
                debug!("Folder '{}' exists under {}", name, parent);
                Ok(existing)
            }
            None => match self
                .drive
                .create_folder(parent, name, ConflictBehavior::Replace)
                .await
            {
                Ok(created) => {
                    info!("Created folder '{}' under {}", name, parent);
                    Ok(created)
                }
                // Lost the race and the service refused to merge: the
                // winner's folder is there now.
                Err(e) if e.code == SyncErrorCode::Conflict => {
                    debug!("Folder '{}' appeared concurrently under {}", name, parent);
                    self.lookup(parent, name).await?.ok_or(e)
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn lookup(&self, parent: &ItemAddress, name: &str) -> SyncResult<Option<DriveItem>> {
        match self.drive.get_item(&parent.join(name)).await {
            Ok(item) if item.is_folder() => Ok(Some(item)),
            Ok(_) => Err(SyncError::invalid_request(format!(
                "'{}' under {} exists and is not a folder",
                name, parent
            ))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
