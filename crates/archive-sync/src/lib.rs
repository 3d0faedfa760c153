//! # archive-sync: attendance archive synchronization engine
//!
//! Moves locally staged attendance photos and onboarding documents into
//! a OneDrive / SharePoint folder hierarchy through the **Microsoft Graph
//! API v1.0**.
//!
//! ## Capabilities
//!
//! - **Credential cache** – client-credentials OAuth2 exchange with a
//!   shared, proactively refreshed bearer token.
//! - **Base-folder resolution** – plain folders, shortcuts into another
//!   drive, or a pinned drive id; resolved once per service.
//! - **Folder get-or-create** – race-tolerant creation of nested
//!   destination folders.
//! - **Uploads** – collision-free synthesized names, content-type
//!   detection, simple PUT or resumable sessions for large files.
//! - **Coordination** – inline uploads, fire-and-forget uploads with
//!   completion callbacks, and record-first archiving.
//! - **Read-back** – folder listings and ephemeral download URLs.

pub mod types;
pub mod error;
pub mod auth;
pub mod api_client;
pub mod drive;
pub mod resolver;
pub mod paths;
pub mod naming;
pub mod uploader;
pub mod staging;
pub mod coordinator;
pub mod service;

// Re-exports
pub use coordinator::{AttendanceRecords, SyncCoordinator};
pub use drive::DriveApi;
pub use error::{SyncError, SyncErrorCode, SyncResult};
pub use service::{ArchiveService, ArchiveServiceState};
pub use types::*;
