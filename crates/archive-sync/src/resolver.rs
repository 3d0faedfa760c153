//! Base-folder resolution.
//!
//! The configured base folder may be an ordinary folder or a shortcut
//! (`remoteItem`) into another drive. Plain-path addressing only works
//! in the drive that holds the shortcut, so the folder is looked up once
//! and every later operation addresses the real target by id.

use crate::drive::DriveApi;
use crate::error::{SyncError, SyncResult};
use crate::types::{split_path, DriveItem, DriveRef, ItemAddress, ResolvedRoot};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct AddressResolver {
    drive: Arc<dyn DriveApi>,
    base_path: String,
    pinned_drive: Option<String>,
    owner: Option<String>,
    root: OnceCell<ResolvedRoot>,
}

impl AddressResolver {
    pub fn new(
        drive: Arc<dyn DriveApi>,
        base_folder: &str,
        pinned_drive: Option<String>,
        owner: Option<String>,
    ) -> Self {
        Self {
            drive,
            base_path: split_path(base_folder).join("/"),
            pinned_drive: pinned_drive.filter(|d| !d.is_empty()),
            owner: owner.filter(|o| !o.is_empty()),
            root: OnceCell::new(),
        }
    }

    /// The memoized root; the first caller resolves it, concurrent
    /// callers wait on that resolution. Failures are not memoized.
    pub async fn resolve_root(&self) -> SyncResult<ResolvedRoot> {
        self.root
            .get_or_try_init(|| self.resolve_uncached())
            .await
            .cloned()
    }

    /// The root if it has already been resolved.
    pub fn cached(&self) -> Option<&ResolvedRoot> {
        self.root.get()
    }

    async fn resolve_uncached(&self) -> SyncResult<ResolvedRoot> {
        if let Some(drive_id) = &self.pinned_drive {
            info!("Using pinned drive {} for base folder '{}'", drive_id, self.base_path);
            return Ok(ResolvedRoot::Pinned {
                drive_id: drive_id.clone(),
                base_path: self.base_path.clone(),
            });
        }

        let owner = self.owner.as_ref().ok_or_else(|| {
            SyncError::not_configured("drive_owner is required when no drive_id is pinned")
        })?;
        let owner_drive = DriveRef::User(owner.clone());
        let address = ItemAddress::at_path(owner_drive.clone(), &self.base_path);

        let item = self.drive.get_item(&address).await.map_err(|e| {
            if e.is_not_found() {
                SyncError::not_found(format!("Base folder '{}' does not exist", self.base_path))
            } else {
                e
            }
        })?;

        let root = classify(item, owner_drive, &self.base_path)?;
        info!(
            "Resolved base folder '{}' → drive {:?}, item {:?}",
            self.base_path,
            root.volume_id(),
            root.root_item_id()
        );
        Ok(root)
    }
}

fn classify(item: DriveItem, owner_drive: DriveRef, base_path: &str) -> SyncResult<ResolvedRoot> {
    if let Some(remote) = item.remote_item.as_deref() {
        let drive_id = remote.drive_id().ok_or_else(|| {
            SyncError::invalid_request(format!(
                "Shortcut '{}' does not name its target drive",
                base_path
            ))
        })?;
        if remote.file.is_some() {
            return Err(SyncError::not_found(format!(
                "Base folder '{}' is a shortcut to a file",
                base_path
            )));
        }
        debug!("Base folder is a shortcut into drive {}", drive_id);
        return Ok(ResolvedRoot::Shortcut {
            drive_id: drive_id.to_string(),
            item_id: remote.id.clone(),
            base_path: base_path.to_string(),
        });
    }

    if !item.is_folder() && item.file.is_some() {
        return Err(SyncError::not_found(format!(
            "Base folder '{}' is a file",
            base_path
        )));
    }

    let drive = match item.drive_id() {
        Some(id) => DriveRef::Id(id.to_string()),
        None => owner_drive,
    };
    Ok(ResolvedRoot::Direct {
        drive,
        item_id: item.id,
        base_path: base_path.to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
