//! High-level archive service – the single facade consumed by the
//! attendance and document subsystems.
//!
//! Owns the process-wide credential cache and memoized base-folder
//! resolution; everything else is stateless over the remote drive.

use crate::api_client::GraphApiClient;
use crate::auth::{ClientCredentialsExchange, CredentialCache};
use crate::coordinator::{AttendanceRecords, SyncCoordinator};
use crate::drive::{DriveApi, GraphDrive};
use crate::error::{SyncError, SyncResult};
use crate::naming;
use crate::resolver::AddressResolver;
use crate::types::*;
use crate::uploader::Uploader;
use log::{debug, info};
use secrecy::ExposeSecret;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared handle for request handlers.
pub type ArchiveServiceState = Arc<ArchiveService>;

pub struct ArchiveService {
    drive: Arc<dyn DriveApi>,
    resolver: Arc<AddressResolver>,
    coordinator: SyncCoordinator,
}

impl ArchiveService {
    /// Build the Graph-backed service.
    pub fn new(config: &ArchiveConfig) -> SyncResult<Self> {
        validate(config)?;

        let exchange = Arc::new(ClientCredentialsExchange::new(config)?);
        let credentials = Arc::new(CredentialCache::new(exchange, config.token_margin_sec));
        let client = GraphApiClient::new(config, credentials)?;
        let drive: Arc<dyn DriveApi> = Arc::new(GraphDrive::new(client));

        info!(
            "Archive service configured for base folder '{}'",
            config.base_folder
        );
        Ok(Self::with_drive(config, drive))
    }

    /// Build the service over any drive implementation.
    pub fn with_drive(config: &ArchiveConfig, drive: Arc<dyn DriveApi>) -> Self {
        let resolver = Arc::new(AddressResolver::new(
            drive.clone(),
            &config.base_folder,
            config.drive_id.clone(),
            config.drive_owner.clone(),
        ));
        let uploader = Uploader::new(drive.clone(), resolver.clone());
        Self {
            drive,
            resolver,
            coordinator: SyncCoordinator::new(uploader),
        }
    }

    pub fn into_state(self) -> ArchiveServiceState {
        Arc::new(self)
    }

    // ─── Uploads ─────────────────────────────────────────────────────

    pub async fn upload_sync(
        &self,
        local_path: &Path,
        logical_name: &str,
        destination_sub_path: &str,
    ) -> SyncResult<UploadResult> {
        self.coordinator
            .upload_sync(local_path, logical_name, destination_sub_path)
            .await
    }

    /// Upload without removing the staged file; see
    /// [`discard_staged`](Self::discard_staged).
    pub async fn upload_retaining(
        &self,
        local_path: &Path,
        logical_name: &str,
        destination_sub_path: &str,
    ) -> SyncResult<UploadResult> {
        self.coordinator
            .upload_retaining(local_path, logical_name, destination_sub_path)
            .await
    }

    /// Remove a staged file whose upload result has been stored.
    pub async fn discard_staged(&self, local_path: &Path) -> bool {
        self.coordinator.discard_staged(local_path).await
    }

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
        self.coordinator.upload_async(request, on_complete, on_error)
    }

    pub async fn archive_pending(
        &self,
        records: Arc<dyn AttendanceRecords>,
        request: UploadRequest,
    ) -> SyncResult<(String, JoinHandle<()>)> {
        self.coordinator.archive_pending(records, request).await
    }

    // ─── Read-back ───────────────────────────────────────────────────

    pub async fn resolve_root(&self) -> SyncResult<ResolvedRoot> {
        self.resolver.resolve_root().await
    }

    /// Children of the base folder.
    pub async fn list_remote_files(&self) -> SyncResult<Vec<RemoteFileEntry>> {
        self.list_remote_files_in("").await
    }

    /// Children of a folder below the base folder. Listing never creates
    /// folders; a missing sub-path is `NotFound`.
    pub async fn list_remote_files_in(&self, sub_path: &str) -> SyncResult<Vec<RemoteFileEntry>> {
        let root = self.resolver.resolve_root().await?;
        let segments = naming::sanitize_sub_path(sub_path);
        let folder = root.folder_address().join_all(&segments);
        let items = self.drive.list_children(&folder).await?;
        debug!("Listed {} entries under '{}'", items.len(), sub_path);
        Ok(items.into_iter().map(RemoteFileEntry::from).collect())
    }

    /// Short-lived, pre-authenticated download URL for an archived file.
    pub async fn get_ephemeral_download_url(&self, remote_id: &str) -> SyncResult<String> {
        if remote_id.trim().is_empty() {
            return Err(SyncError::not_found("Empty remote id"));
        }
        let root = self.resolver.resolve_root().await?;
        let item = self
            .drive
            .get_item(&ItemAddress::item(root.drive(), remote_id))
            .await?;
        item.download_url.ok_or_else(|| {
            SyncError::not_found(format!("Item {} has no downloadable content", remote_id))
        })
    }
}

/// Reject configurations that cannot reach any drive.
pub fn validate(config: &ArchiveConfig) -> SyncResult<()> {
    let mut missing = Vec::new();
    if config.client_id.is_empty() {
        missing.push("client_id");
    }
    if config.client_secret.expose_secret().is_empty() {
        missing.push("client_secret");
    }
    if config.tenant_id.is_empty() {
        missing.push("tenant_id");
    }
    if config.drive_id.as_deref().unwrap_or_default().is_empty()
        && config.drive_owner.as_deref().unwrap_or_default().is_empty()
    {
        missing.push("drive_owner (or drive_id)");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SyncError::not_configured(format!(
            "Missing configuration: {}",
            missing.join(", ")
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncErrorCode;
    use secrecy::SecretString;

    fn configured() -> ArchiveConfig {
        ArchiveConfig {
            client_id: "app".into(),
            client_secret: SecretString::new("s3cret".into()),
            tenant_id: "contoso".into(),
            base_folder: "Archive".into(),
            drive_owner: Some("hr@contoso.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_complete() {
        assert!(validate(&configured()).is_ok());
    }

    #[test]
    fn test_validate_pinned_drive_without_owner() {
        let cfg = ArchiveConfig {
            drive_owner: None,
            drive_id: Some("b!pinned".into()),
            ..configured()
        };
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let err = validate(&ArchiveConfig::default()).unwrap_err();
        assert_eq!(err.code, SyncErrorCode::NotConfigured);
        assert!(err.message.contains("client_id"));
        assert!(err.message.contains("client_secret"));
        assert!(err.message.contains("drive_owner"));
    }

    #[test]
    fn test_new_service_with_valid_config() {
        assert!(ArchiveService::new(&configured()).is_ok());
    }
}
