//! Upload naming and storage.
//!
//! Saved names have the shape `<matric>_<YYYYmmddHHMMSS>_<original>`
//! after sanitizing, contain only `[A-Za-z0-9._-]`, never start with a
//! dot, and are always a single path component inside the upload
//! directory.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use unicode_normalization::UnicodeNormalization;

/// Used when sanitizing leaves nothing behind.
const FALLBACK_NAME: &str = "upload";

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Reduce an arbitrary string to a safe single file name.
///
/// Accented letters are first decomposed (NFKD) to their ASCII base. Path
/// separators and whitespace become `_` (runs collapse to one), anything
/// outside `[A-Za-z0-9._-]` is dropped, and leading or trailing `.`/`_` are
/// trimmed.
pub fn sanitize_file_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.nfkd() {
        if c == '/' || c == '\\' || c.is_whitespace() {
            pending_sep = true;
            continue;
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the stored file name for an upload.
pub fn upload_file_name(matric: &str, original: &str, now: DateTime<Utc>) -> String {
    sanitize_file_name(&format!("{matric}_{}_{original}", now.format("%Y%m%d%H%M%S")))
}

/// Whether `name` is a plain file name that stays inside its directory.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).components().count() == 1
}

/// Insert a short random tag before the extension: `a.png` → `a-1f2e3d4c.png`.
fn with_suffix(name: &str) -> String {
    let tag = &uuid::Uuid::new_v4().simple().to_string()[..8];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{tag}.{ext}"),
        _ => format!("{name}-{tag}"),
    }
}

/// Write the raw bytes under `dir`, never overwriting an existing file.
///
/// Returns the path actually written.
pub async fn save_upload(dir: &Path, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let mut name = file_name.to_string();

    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(&name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "upload saved");
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(name = %name, "upload name taken; adding suffix");
                name = with_suffix(file_name);
            }
            Err(e) => return Err(e),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free upload name for {file_name}"),
    ))
}
