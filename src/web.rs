//! claude.ai data-export archives.
//!
//! The export is a ZIP whose `conversations.json` entry holds every
//! conversation as one JSON array. The whole import is refused when that
//! entry is missing or too large, so a broken archive never yields a
//! half-populated database.

use crate::config::{MAX_MANIFEST_BYTES, WEB_MANIFEST_NAME};
use crate::index::{IndexError, finalize_schema, save_session};
use crate::normalize::{ArchiveInfo, normalize_web_conversation};
use crate::scan::{ImportReport, ItemError};
use rusqlite::Connection;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WebExportError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("no {manifest} found in {archive}; expected a claude.ai data export ZIP")]
    MissingManifest { archive: String, manifest: String },
    #[error("{manifest} is {size_mb} MB, exceeds {limit_mb} MB limit")]
    ManifestTooLarge {
        manifest: String,
        size_mb: u64,
        limit_mb: u64,
    },
    #[error("invalid json in {manifest}: {source}")]
    InvalidJson {
        manifest: String,
        source: serde_json::Error,
    },
    #[error("{manifest} does not hold a list of conversations")]
    NotAnArray { manifest: String },
    #[error("no conversations found in export")]
    NoConversations,
    #[error("index error: {source}")]
    Index { source: IndexError },
}

impl From<IndexError> for WebExportError {
    fn from(source: IndexError) -> Self {
        Self::Index { source }
    }
}

/// Read every conversation out of a web-export archive.
pub fn load_web_export(path: &Path) -> Result<Vec<Value>, WebExportError> {
    load_web_export_with_limit(path, MAX_MANIFEST_BYTES)
}

/// Like [`load_web_export`] with a caller-chosen manifest size ceiling.
///
/// The ceiling is enforced on the bytes actually decompressed, not only on
/// the size the archive declares.
pub fn load_web_export_with_limit(
    path: &Path,
    limit: u64,
) -> Result<Vec<Value>, WebExportError> {
    let zip_error = |source: zip::result::ZipError| WebExportError::Zip {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| WebExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(zip_error)?;

    let mut manifest_index = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(zip_error)?;
        if entry.name().ends_with(WEB_MANIFEST_NAME) {
            manifest_index = Some(i);
            break;
        }
    }
    let Some(manifest_index) = manifest_index else {
        return Err(WebExportError::MissingManifest {
            archive: archive_name(path),
            manifest: WEB_MANIFEST_NAME.to_string(),
        });
    };

    let entry = archive.by_index(manifest_index).map_err(zip_error)?;
    let manifest = entry.name().to_string();

    let too_large = |manifest: String, size: u64| WebExportError::ManifestTooLarge {
        manifest,
        size_mb: size / (1024 * 1024),
        limit_mb: limit / (1024 * 1024),
    };

    if entry.size() > limit {
        return Err(too_large(manifest, entry.size()));
    }

    let mut bytes = Vec::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|source| WebExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if bytes.len() as u64 > limit {
        return Err(too_large(manifest, bytes.len() as u64));
    }

    let root: Value = serde_json::from_slice(&bytes).map_err(|source| {
        WebExportError::InvalidJson {
            manifest: manifest.clone(),
            source,
        }
    })?;

    match root {
        Value::Array(conversations) => Ok(conversations),
        _ => Err(WebExportError::NotAnArray { manifest }),
    }
}

/// Import every conversation of a web-export archive.
///
/// Conversations that fail to save are reported in the returned
/// [`ImportReport`]; archive-level problems abort before any write.
pub fn import_web_export(conn: &mut Connection, path: &Path) -> Result<ImportReport, WebExportError> {
    let conversations = load_web_export(path)?;
    if conversations.is_empty() {
        return Err(WebExportError::NoConversations);
    }
    tracing::info!(count = conversations.len(), "found conversations");

    let archive = ArchiveInfo {
        path: Some(path.display().to_string()),
        size_bytes: std::fs::metadata(path).ok().map(|meta| meta.len() as i64),
    };

    let mut report = ImportReport {
        files: conversations.len(),
        ..ImportReport::default()
    };

    for conversation in &conversations {
        let Some(normalized) = normalize_web_conversation(conversation, &archive) else {
            continue;
        };

        match save_session(conn, &normalized) {
            Ok(()) => {
                report.sessions += 1;
                report.messages += normalized.messages.len();
            }
            Err(err) => {
                let label = conversation
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                tracing::warn!(conversation = label, error = %err, "failed to save conversation");
                report.errors.push(ItemError {
                    source: conversation
                        .get("uuid")
                        .and_then(Value::as_str)
                        .unwrap_or("?")
                        .to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    finalize_schema(conn)?;
    Ok(report)
}

fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
