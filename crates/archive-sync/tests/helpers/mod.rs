//! In-memory drive for engine integration tests.
//!
//! Models drives, user-owned drives, folders, files and shortcuts with
//! Graph's addressing rules: plain paths cannot traverse a shortcut, and
//! folder creation honours the requested conflict behaviour.

#![allow(dead_code)]

use archive_sync::{
    Anchor, ConflictBehavior, DriveApi, DriveItem, DriveRef, FileInfo, FolderInfo, ItemAddress,
    ItemReference, SyncError, SyncResult, UploadRequest,
};
use archive_sync::AttendanceRecords;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Kind {
    Folder,
    File { data: Vec<u8>, content_type: String },
    Shortcut {
        drive_id: String,
        item_id: String,
        target_is_folder: bool,
    },
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    name: String,
    parent: Option<String>,
    kind: Kind,
}

#[derive(Default)]
struct Drive {
    root_id: String,
    nodes: HashMap<String, Node>,
}

#[derive(Default)]
struct State {
    drives: HashMap<String, Drive>,
    users: HashMap<String, String>,
}

pub struct MemoryDrive {
    state: Mutex<State>,
    next_id: AtomicU64,
    latency: Duration,
    /// Treat `replace` like `fail` for existing folders (HTTP 409).
    conflict_on_existing_folder: bool,
    upload_failure: Mutex<Option<u16>>,
    get_log: Mutex<Vec<String>>,
    create_calls: AtomicU64,
    upload_calls: AtomicU64,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
            latency: Duration::ZERO,
            conflict_on_existing_folder: false,
            upload_failure: Mutex::new(None),
            get_log: Mutex::new(Vec::new()),
            create_calls: AtomicU64::new(0),
            upload_calls: AtomicU64::new(0),
        }
    }

    /// Sleep inside every call so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_conflict_on_existing_folder(mut self) -> Self {
        self.conflict_on_existing_folder = true;
        self
    }

    pub fn fail_uploads_with(&self, status: Option<u16>) {
        *self.upload_failure.lock().unwrap() = status;
    }

    fn mint(&self) -> String {
        format!("ITEM{:04}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    // ─── Fixture builders ────────────────────────────────────────────

    /// Add a drive; returns its root item id.
    pub fn add_drive(&self, drive_id: &str) -> String {
        let root_id = self.mint();
        let mut st = self.state.lock().unwrap();
        let mut drive = Drive {
            root_id: root_id.clone(),
            nodes: HashMap::new(),
        };
        drive.nodes.insert(
            root_id.clone(),
            Node {
                id: root_id.clone(),
                name: "root".into(),
                parent: None,
                kind: Kind::Folder,
            },
        );
        st.drives.insert(drive_id.to_string(), drive);
        root_id
    }

    pub fn assign_user(&self, user: &str, drive_id: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.to_string(), drive_id.to_string());
    }

    pub fn mkdir(&self, drive_id: &str, parent_id: &str, name: &str) -> String {
        self.insert(drive_id, parent_id, name, Kind::Folder)
    }

    pub fn add_file(&self, drive_id: &str, parent_id: &str, name: &str, data: &[u8]) -> String {
        self.insert(
            drive_id,
            parent_id,
            name,
            Kind::File {
                data: data.to_vec(),
                content_type: "application/octet-stream".into(),
            },
        )
    }

    pub fn add_shortcut(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
        target_drive: &str,
        target_item: &str,
    ) -> String {
        let target_is_folder = {
            let st = self.state.lock().unwrap();
            matches!(
                st.drives[target_drive].nodes[target_item].kind,
                Kind::Folder
            )
        };
        self.insert(
            drive_id,
            parent_id,
            name,
            Kind::Shortcut {
                drive_id: target_drive.into(),
                item_id: target_item.into(),
                target_is_folder,
            },
        )
    }

    fn insert(&self, drive_id: &str, parent_id: &str, name: &str, kind: Kind) -> String {
        let id = self.mint();
        let mut st = self.state.lock().unwrap();
        let drive = st.drives.get_mut(drive_id).expect("unknown drive");
        drive.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                name: name.to_string(),
                parent: Some(parent_id.to_string()),
                kind,
            },
        );
        id
    }

    // ─── Inspection ──────────────────────────────────────────────────

    pub fn root_of(&self, drive_id: &str) -> String {
        self.state.lock().unwrap().drives[drive_id].root_id.clone()
    }

    /// Names of the children of a folder, sorted.
    pub fn child_names(&self, drive_id: &str, folder_id: &str) -> Vec<String> {
        let st = self.state.lock().unwrap();
        let mut names: Vec<String> = st.drives[drive_id]
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(folder_id))
            .map(|n| n.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Id of the item at `segments` below `start_id`, if any.
    pub fn find(&self, drive_id: &str, start_id: &str, segments: &[&str]) -> Option<String> {
        let st = self.state.lock().unwrap();
        let drive = st.drives.get(drive_id)?;
        let mut current = start_id.to_string();
        for seg in segments {
            current = Self::child_named(drive, &current, seg)?.id.clone();
        }
        Some(current)
    }

    pub fn content_of(&self, drive_id: &str, item_id: &str) -> Option<Vec<u8>> {
        let st = self.state.lock().unwrap();
        match &st.drives.get(drive_id)?.nodes.get(item_id)?.kind {
            Kind::File { data, .. } => Some(data.clone()),
            _ => None,
        }
    }

    pub fn content_type_of(&self, drive_id: &str, item_id: &str) -> Option<String> {
        let st = self.state.lock().unwrap();
        match &st.drives.get(drive_id)?.nodes.get(item_id)?.kind {
            Kind::File { content_type, .. } => Some(content_type.clone()),
            _ => None,
        }
    }

    /// How many `get_item` calls were made for exactly this address.
    pub fn gets_of(&self, address: &ItemAddress) -> usize {
        let wanted = address.api_path();
        self.get_log
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == wanted)
            .count()
    }

    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> u64 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    // ─── Resolution ──────────────────────────────────────────────────

    fn child_named<'a>(drive: &'a Drive, parent_id: &str, name: &str) -> Option<&'a Node> {
        drive.nodes.values().find(|n| {
            n.parent.as_deref() == Some(parent_id) && n.name.eq_ignore_ascii_case(name)
        })
    }

    fn drive_id_of(st: &State, drive: &DriveRef) -> SyncResult<String> {
        match drive {
            DriveRef::Id(id) if st.drives.contains_key(id) => Ok(id.clone()),
            DriveRef::Id(id) => Err(not_found(&format!("drive {}", id))),
            DriveRef::User(user) => st
                .users
                .get(user)
                .cloned()
                .ok_or_else(|| not_found(&format!("user {}", user))),
        }
    }

    /// (drive id, node id) of an address.
    fn resolve(st: &State, address: &ItemAddress) -> SyncResult<(String, String)> {
        let drive_id = Self::drive_id_of(st, &address.drive)?;
        let drive = &st.drives[&drive_id];
        let mut current = match &address.anchor {
            Anchor::Root => drive.root_id.clone(),
            Anchor::Item(id) if drive.nodes.contains_key(id) => id.clone(),
            Anchor::Item(id) => return Err(not_found(id)),
        };
        for seg in &address.path {
            let node = &drive.nodes[&current];
            if !matches!(node.kind, Kind::Folder) {
                // Graph cannot walk a plain path through a shortcut.
                return Err(not_found(seg));
            }
            current = Self::child_named(drive, &current, seg)
                .ok_or_else(|| not_found(seg))?
                .id
                .clone();
        }
        Ok((drive_id, current))
    }

    fn to_item(drive_id: &str, node: &Node) -> DriveItem {
        let mut item = DriveItem {
            id: node.id.clone(),
            name: Some(node.name.clone()),
            web_url: Some(format!("https://memory.test/{}/{}", drive_id, node.id)),
            created_date_time: Some("2026-10-16T08:00:00Z".into()),
            parent_reference: Some(ItemReference {
                drive_id: Some(drive_id.to_string()),
                id: node.parent.clone(),
                path: None,
            }),
            ..Default::default()
        };
        match &node.kind {
            Kind::Folder => item.folder = Some(FolderInfo::default()),
            Kind::File { data, content_type } => {
                item.size = Some(data.len() as i64);
                item.file = Some(FileInfo {
                    mime_type: Some(content_type.clone()),
                });
                item.download_url = Some(format!(
                    "https://memory.test/download/{}?tempauth=abc",
                    node.id
                ));
            }
            Kind::Shortcut {
                drive_id,
                item_id,
                target_is_folder,
            } => {
                item.remote_item = Some(Box::new(DriveItem {
                    id: item_id.clone(),
                    folder: target_is_folder.then(FolderInfo::default),
                    file: (!target_is_folder).then(FileInfo::default),
                    parent_reference: Some(ItemReference {
                        drive_id: Some(drive_id.clone()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }));
            }
        }
        item
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn not_found(what: &str) -> SyncError {
    SyncError::from_graph_response(
        404,
        &format!(
            r#"{{"error":{{"code":"itemNotFound","message":"{} not found"}}}}"#,
            what
        ),
    )
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn get_item(&self, address: &ItemAddress) -> SyncResult<DriveItem> {
        self.get_log.lock().unwrap().push(address.api_path());
        self.pause().await;
        let st = self.state.lock().unwrap();
        let (drive_id, id) = Self::resolve(&st, address)?;
        Ok(Self::to_item(&drive_id, &st.drives[&drive_id].nodes[&id]))
    }

    async fn create_folder(
        &self,
        parent: &ItemAddress,
        name: &str,
        conflict: ConflictBehavior,
    ) -> SyncResult<DriveItem> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut st = self.state.lock().unwrap();
        let (drive_id, parent_id) = Self::resolve(&st, parent)?;

        let existing = Self::child_named(&st.drives[&drive_id], &parent_id, name).cloned();
        let name = match (existing, conflict) {
            (Some(node), ConflictBehavior::Replace)
                if matches!(node.kind, Kind::Folder) && !self.conflict_on_existing_folder =>
            {
                return Ok(Self::to_item(&drive_id, &node));
            }
            (Some(_), ConflictBehavior::Rename) => {
                let drive = &st.drives[&drive_id];
                let mut n = 1;
                while Self::child_named(drive, &parent_id, &format!("{} {}", name, n)).is_some() {
                    n += 1;
                }
                format!("{} {}", name, n)
            }
            (Some(_), _) => {
                return Err(SyncError::from_graph_response(
                    409,
                    r#"{"error":{"code":"nameAlreadyExists","message":"Name already exists"}}"#,
                ))
            }
            (None, _) => name.to_string(),
        };

        let id = self.mint();
        let node = Node {
            id: id.clone(),
            name,
            parent: Some(parent_id),
            kind: Kind::Folder,
        };
        let item = Self::to_item(&drive_id, &node);
        st.drives.get_mut(&drive_id).unwrap().nodes.insert(id, node);
        Ok(item)
    }

    async fn upload_content(
        &self,
        target: &ItemAddress,
        local_path: &Path,
        _size: u64,
        content_type: &str,
        conflict: ConflictBehavior,
    ) -> SyncResult<DriveItem> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let failure = *self.upload_failure.lock().unwrap();
        if let Some(status) = failure {
            return Err(SyncError::from_graph_response(status, "upstream failure"));
        }
        let data = tokio::fs::read(local_path).await?;

        let (name, parent_path) = target
            .path
            .split_last()
            .ok_or_else(|| SyncError::invalid_request("upload target has no file name"))?;
        let parent = ItemAddress {
            drive: target.drive.clone(),
            anchor: target.anchor.clone(),
            path: parent_path.to_vec(),
        };

        let mut st = self.state.lock().unwrap();
        let (drive_id, parent_id) = Self::resolve(&st, &parent)?;
        let existing = Self::child_named(&st.drives[&drive_id], &parent_id, name).cloned();
        let id = match (existing, conflict) {
            (Some(node), ConflictBehavior::Replace) => node.id,
            (Some(_), _) => {
                return Err(SyncError::from_graph_response(409, "nameAlreadyExists"));
            }
            (None, _) => self.mint(),
        };

        let node = Node {
            id: id.clone(),
            name: name.clone(),
            parent: Some(parent_id),
            kind: Kind::File {
                data,
                content_type: content_type.to_string(),
            },
        };
        let item = Self::to_item(&drive_id, &node);
        st.drives.get_mut(&drive_id).unwrap().nodes.insert(id, node);
        Ok(item)
    }

    async fn list_children(&self, folder: &ItemAddress) -> SyncResult<Vec<DriveItem>> {
        self.pause().await;
        let st = self.state.lock().unwrap();
        let (drive_id, folder_id) = Self::resolve(&st, folder)?;
        let drive = &st.drives[&drive_id];
        let mut items: Vec<DriveItem> = drive
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(folder_id.as_str()))
            .map(|n| Self::to_item(&drive_id, n))
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Attendance records
// ═══════════════════════════════════════════════════════════════════════

/// Records kept in memory: id → (request, remote reference).
#[derive(Default)]
pub struct MemoryRecords {
    records: Mutex<Vec<(UploadRequest, Option<String>)>>,
    reject_attach: AtomicBool,
}

impl MemoryRecords {
    /// Make every later `attach_remote_reference` fail.
    pub fn reject_attaches(&self) {
        self.reject_attach.store(true, Ordering::SeqCst);
    }

    pub fn reference(&self, id: &str) -> Option<String> {
        let idx: usize = id.parse().ok()?;
        self.records.lock().unwrap().get(idx)?.1.clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl AttendanceRecords for MemoryRecords {
    async fn record_pending_upload(&self, request: &UploadRequest) -> SyncResult<String> {
        let mut records = self.records.lock().unwrap();
        records.push((request.clone(), None));
        Ok((records.len() - 1).to_string())
    }

    async fn attach_remote_reference(&self, local_record_id: &str, remote_url: &str) -> SyncResult<()> {
        if self.reject_attach.load(Ordering::SeqCst) {
            return Err(SyncError::internal("record store unavailable"));
        }
        let idx: usize = local_record_id
            .parse()
            .map_err(|_| SyncError::not_found(local_record_id))?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(idx)
            .ok_or_else(|| SyncError::not_found(local_record_id))?;
        record.1 = Some(remote_url.to_string());
        Ok(())
    }
}
