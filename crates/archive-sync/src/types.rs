//! Shared types for the archive engine: configuration, credentials,
//! Graph drive items, addressing, and upload results.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════

/// Engine configuration.
#[derive(Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Entra ID application (client) ID.
    pub client_id: String,
    /// Client secret for the client-credentials grant.
    pub client_secret: SecretString,
    /// Tenant GUID or domain.
    pub tenant_id: String,
    /// Base folder path inside the host drive, e.g. `Attendance/Archive`.
    pub base_folder: String,
    /// Pinned drive id. When set, base-folder resolution is skipped.
    pub drive_id: Option<String>,
    /// User id or UPN whose drive hosts the base folder.
    pub drive_owner: Option<String>,
    /// Graph API base URL.  Default: `https://graph.microsoft.com/v1.0`.
    pub graph_base_url: String,
    /// Identity platform host.  Default: `https://login.microsoftonline.com`.
    pub authority_host: String,
    /// Timeout in seconds for HTTP calls.  Default: 60.
    pub timeout_sec: u64,
    /// Maximum automatic retries for transient failures.  Default: 3.
    pub max_retries: u32,
    /// Minimum remaining lifetime of a handed-out token.  Default: 60.
    pub token_margin_sec: i64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            tenant_id: String::new(),
            base_folder: String::new(),
            drive_id: None,
            drive_owner: None,
            graph_base_url: "https://graph.microsoft.com/v1.0".into(),
            authority_host: "https://login.microsoftonline.com".into(),
            timeout_sec: 60,
            max_retries: 3,
            token_margin_sec: 60,
        }
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("base_folder", &self.base_folder)
            .field("drive_id", &self.drive_id)
            .field("drive_owner", &self.drive_owner)
            .field("graph_base_url", &self.graph_base_url)
            .field("authority_host", &self.authority_host)
            .field("timeout_sec", &self.timeout_sec)
            .field("max_retries", &self.max_retries)
            .field("token_margin_sec", &self.token_margin_sec)
            .finish()
    }
}

/// Token endpoint for a tenant.
pub fn token_url(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
    )
}

// ═══════════════════════════════════════════════════════════════════════
//  Credentials
// ═══════════════════════════════════════════════════════════════════════

/// A bearer token and its absolute expiry as issued.
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the token still has more than `margin` left.
    pub fn is_fresh(&self, margin: chrono::Duration) -> bool {
        Utc::now() + margin < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Raw response of the identity platform token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

// ═══════════════════════════════════════════════════════════════════════
//  Drive items
// ═══════════════════════════════════════════════════════════════════════

/// The subset of a Graph `driveItem` the engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: Option<String>,
    pub size: Option<i64>,
    pub web_url: Option<String>,
    pub created_date_time: Option<String>,
    pub parent_reference: Option<ItemReference>,
    pub file: Option<FileInfo>,
    pub folder: Option<FolderInfo>,
    /// Present when the item is a shortcut into another drive.
    pub remote_item: Option<Box<DriveItem>>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn is_shortcut(&self) -> bool {
        self.remote_item.is_some()
    }

    pub fn drive_id(&self) -> Option<&str> {
        self.parent_reference
            .as_ref()
            .and_then(|p| p.drive_id.as_deref())
    }
}

/// Reference to a parent item / location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    pub drive_id: Option<String>,
    pub id: Option<String>,
    pub path: Option<String>,
}

/// File facet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub mime_type: Option<String>,
}

/// Folder facet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderInfo {
    pub child_count: Option<i32>,
}

/// Resumable upload session returned by `createUploadSession`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_url: String,
    pub expiration_date_time: Option<String>,
    pub next_expected_ranges: Option<Vec<String>>,
}

/// How the service resolves a name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    Fail,
    Replace,
    Rename,
}

impl ConflictBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictBehavior::Fail => "fail",
            ConflictBehavior::Replace => "replace",
            ConflictBehavior::Rename => "rename",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Addressing
// ═══════════════════════════════════════════════════════════════════════

/// Path segments are encoded individually; `/` separators stay literal.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Which drive an address points into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveRef {
    /// `drives/{id}`
    Id(String),
    /// `users/{id-or-upn}/drive`
    User(String),
}

impl DriveRef {
    pub fn api_prefix(&self) -> String {
        match self {
            DriveRef::Id(id) => format!("drives/{}", encode_segment(id)),
            DriveRef::User(user) => format!("users/{}/drive", encode_segment(user)),
        }
    }
}

/// What a path is relative to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    Root,
    Item(String),
}

/// A drive item addressed either by plain path from the drive root or
/// by a path relative to a known item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAddress {
    pub drive: DriveRef,
    pub anchor: Anchor,
    pub path: Vec<String>,
}

impl ItemAddress {
    pub fn root(drive: DriveRef) -> Self {
        Self {
            drive,
            anchor: Anchor::Root,
            path: Vec::new(),
        }
    }

    pub fn item(drive: DriveRef, item_id: impl Into<String>) -> Self {
        Self {
            drive,
            anchor: Anchor::Item(item_id.into()),
            path: Vec::new(),
        }
    }

    /// Plain-path address; empty segments are ignored.
    pub fn at_path(drive: DriveRef, path: &str) -> Self {
        Self {
            drive,
            anchor: Anchor::Root,
            path: split_path(path),
        }
    }

    pub fn join(&self, segment: &str) -> Self {
        let mut next = self.clone();
        next.path.push(segment.to_string());
        next
    }

    pub fn join_all<S: AsRef<str>>(&self, segments: &[S]) -> Self {
        let mut next = self.clone();
        next.path
            .extend(segments.iter().map(|s| s.as_ref().to_string()));
        next
    }

    /// Graph resource path for the item itself.
    pub fn api_path(&self) -> String {
        self.build(None)
    }

    /// Graph resource path for a navigation/action below the item
    /// (`children`, `content`, `createUploadSession`).
    pub fn api_path_with(&self, action: &str) -> String {
        self.build(Some(action))
    }

    fn build(&self, action: Option<&str>) -> String {
        let mut out = self.drive.api_prefix();
        match &self.anchor {
            Anchor::Root => out.push_str("/root"),
            Anchor::Item(id) => {
                out.push_str("/items/");
                out.push_str(&encode_segment(id));
            }
        }
        if !self.path.is_empty() {
            let joined = self
                .path
                .iter()
                .map(|s| encode_segment(s))
                .collect::<Vec<_>>()
                .join("/");
            out.push_str(":/");
            out.push_str(&joined);
            if action.is_some() {
                out.push(':');
            }
        }
        if let Some(action) = action {
            out.push('/');
            out.push_str(action);
        }
        out
    }
}

impl fmt::Display for ItemAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_path())
    }
}

pub fn split_path(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Where base-folder operations actually happen. Resolved once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedRoot {
    /// The base folder is an ordinary folder in its own drive.
    Direct {
        drive: DriveRef,
        item_id: String,
        base_path: String,
    },
    /// The base folder is a shortcut; operations target the shortcut's
    /// drive and item, never the original path.
    Shortcut {
        drive_id: String,
        item_id: String,
        base_path: String,
    },
    /// A drive id was pinned in configuration; no lookup was made.
    Pinned { drive_id: String, base_path: String },
}

impl ResolvedRoot {
    pub fn base_path(&self) -> &str {
        match self {
            ResolvedRoot::Direct { base_path, .. }
            | ResolvedRoot::Shortcut { base_path, .. }
            | ResolvedRoot::Pinned { base_path, .. } => base_path,
        }
    }

    pub fn volume_id(&self) -> Option<&str> {
        match self {
            ResolvedRoot::Direct { drive, .. } => match drive {
                DriveRef::Id(id) => Some(id),
                DriveRef::User(_) => None,
            },
            ResolvedRoot::Shortcut { drive_id, .. } | ResolvedRoot::Pinned { drive_id, .. } => {
                Some(drive_id)
            }
        }
    }

    pub fn root_item_id(&self) -> Option<&str> {
        match self {
            ResolvedRoot::Direct { item_id, .. } | ResolvedRoot::Shortcut { item_id, .. } => {
                Some(item_id)
            }
            ResolvedRoot::Pinned { .. } => None,
        }
    }

    /// Drive that holds everything beneath the base folder.
    pub fn drive(&self) -> DriveRef {
        match self {
            ResolvedRoot::Direct { drive, .. } => drive.clone(),
            ResolvedRoot::Shortcut { drive_id, .. } | ResolvedRoot::Pinned { drive_id, .. } => {
                DriveRef::Id(drive_id.clone())
            }
        }
    }

    /// Address of the base folder itself.
    pub fn folder_address(&self) -> ItemAddress {
        match self {
            ResolvedRoot::Direct { drive, item_id, .. } => {
                ItemAddress::item(drive.clone(), item_id.clone())
            }
            ResolvedRoot::Shortcut {
                drive_id, item_id, ..
            } => ItemAddress::item(DriveRef::Id(drive_id.clone()), item_id.clone()),
            ResolvedRoot::Pinned {
                drive_id,
                base_path,
            } => ItemAddress::at_path(DriveRef::Id(drive_id.clone()), base_path),
        }
    }

    /// Address used for content uploads: id-relative below a shortcut
    /// target, plain path otherwise.
    pub fn content_address<S: AsRef<str>>(&self, segments: &[S], file_name: &str) -> ItemAddress {
        let base = match self {
            ResolvedRoot::Shortcut { .. } => self.folder_address(),
            ResolvedRoot::Direct {
                drive, base_path, ..
            } => ItemAddress::at_path(drive.clone(), base_path),
            ResolvedRoot::Pinned {
                drive_id,
                base_path,
            } => ItemAddress::at_path(DriveRef::Id(drive_id.clone()), base_path),
        };
        base.join_all(segments).join(file_name)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Results and requests
// ═══════════════════════════════════════════════════════════════════════

/// Stable reference to an archived file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub remote_id: String,
    pub drive_id: Option<String>,
    pub remote_url: String,
    pub final_name: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One entry of a remote folder listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileEntry {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub created_at: Option<String>,
    pub url: Option<String>,
    pub is_folder: bool,
}

impl From<DriveItem> for RemoteFileEntry {
    fn from(item: DriveItem) -> Self {
        let is_folder = item.is_folder() || item.is_shortcut();
        Self {
            name: item.name.unwrap_or_default(),
            size: item.size.unwrap_or(0).max(0) as u64,
            created_at: item.created_date_time,
            url: item.web_url,
            id: item.id,
            is_folder,
        }
    }
}

/// A staged file handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub local_path: PathBuf,
    pub logical_name: String,
    pub destination_sub_path: String,
}

impl UploadRequest {
    pub fn new(
        local_path: impl Into<PathBuf>,
        logical_name: impl Into<String>,
        destination_sub_path: impl Into<String>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            logical_name: logical_name.into(),
            destination_sub_path: destination_sub_path.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
