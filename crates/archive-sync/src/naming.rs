//! Remote name synthesis.
//!
//! Final names look like `{stem}_{timestamp}_{suffix}{.ext}` where the
//! timestamp is ISO 8601 UTC with `:` and `.` replaced by `-` and the
//! suffix is six random lowercase alphanumerics.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::Path;

pub const SUFFIX_LEN: usize = 6;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Characters OneDrive and SharePoint reject in item names.
const ILLEGAL: &[char] = &['"', '*', ':', '<', '>', '?', '/', '\\', '|'];

/// Strip characters the remote namespace rejects. Leading/trailing
/// whitespace and trailing dots are removed as well.
pub fn sanitize_component(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| !ILLEGAL.contains(c) && !c.is_control())
        .collect();
    kept.trim().trim_end_matches('.').trim_end().to_string()
}

/// Split a destination sub-path into sanitized, non-empty segments.
pub fn sanitize_sub_path(raw: &str) -> Vec<String> {
    raw.split(['/', '\\'])
        .map(sanitize_component)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collision-free remote name for `logical_name` at instant `now`.
pub fn final_name(logical_name: &str, now: DateTime<Utc>) -> SyncResult<String> {
    let clean = sanitize_component(logical_name);
    if clean.is_empty() {
        return Err(SyncError::invalid_name(format!(
            "Logical name '{}' has no usable characters",
            logical_name
        )));
    }

    let path = Path::new(&clean);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&clean);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    Ok(format!(
        "{}_{}_{}{}",
        stem,
        timestamp_token(now),
        random_suffix(),
        ext
    ))
}

/// `2026-10-16T08:30:12.345Z` → `2026-10-16T08-30-12-345Z`.
pub fn timestamp_token(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-")
}

pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// MIME type from the name's extension.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
