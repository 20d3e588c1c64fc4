//! Session file discovery and batch import.
//!
//! Walks a session root, drops files that never hold primary sessions and
//! imports the rest one transaction per file. A failing file is recorded in
//! the [`ImportReport`] and the run moves on.

use crate::config::{
    AGENT_FILE_PREFIX, ImportOptions, PROGRESS_EVERY, SESSION_EXTENSIONS, SKIPPED_DIR_MARKERS,
    SKIPPED_FILE_NAMES, SKIPPED_NAME_MARKERS, TIMELINES_MARKER,
};
use crate::index::{IndexError, finalize_schema, save_session};
use crate::normalize::{dir_to_project, process_session};
use rusqlite::Connection;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Counters and failures of one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Files (or conversations) considered.
    pub files: usize,
    pub sessions: usize,
    pub messages: usize,
    pub warnings: usize,
    pub errors: Vec<ItemError>,
}

impl ImportReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A file or conversation that could not be imported.
#[derive(Debug, Clone)]
pub struct ItemError {
    pub source: String,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("walk error: {source}")]
    Walk { source: walkdir::Error },
    #[error("no session files found in {root}")]
    NoSessionFiles { root: PathBuf },
    #[error("index error: {source}")]
    Index { source: IndexError },
    #[error("{source}")]
    Parse { source: crate::parse::ParseError },
    #[error("no data found in {path}")]
    NoData { path: PathBuf },
}

impl From<walkdir::Error> for ScanError {
    fn from(source: walkdir::Error) -> Self {
        Self::Walk { source }
    }
}

impl From<IndexError> for ScanError {
    fn from(source: IndexError) -> Self {
        Self::Index { source }
    }
}

impl From<crate::parse::ParseError> for ScanError {
    fn from(source: crate::parse::ParseError) -> Self {
        Self::Parse { source }
    }
}

/// Collect session files under `root` in path order, minus skipped ones.
///
/// Only an unreadable `root` is an error; anything below it that cannot be
/// read is logged and left out.
pub fn collect_session_files(root: &Path, include_agents: bool) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => return Err(error.into()),
            Err(error) => {
                tracing::warn!(%error, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(ext) = entry.path().extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if !SESSION_EXTENSIONS.contains(&ext) {
            continue;
        }

        if should_skip_file(entry.path(), include_agents) {
            tracing::debug!(path = %entry.path().display(), "skipping file");
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

/// Whether `path` should stay out of the import.
pub fn should_skip_file(path: &Path, include_agents: bool) -> bool {
    let full = path.to_string_lossy().replace('\\', "/");
    if SKIPPED_DIR_MARKERS.iter().any(|marker| full.contains(marker)) {
        return true;
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    if !include_agents && name.starts_with(AGENT_FILE_PREFIX) {
        return true;
    }
    if SKIPPED_NAME_MARKERS.iter().any(|marker| name.contains(marker)) {
        return true;
    }
    if SKIPPED_FILE_NAMES.contains(&name.as_str()) {
        return true;
    }

    full.contains(TIMELINES_MARKER)
}

/// Project label of a session file found under `root`.
///
/// The first directory below `root` names the project; files directly in
/// `root` belong to `default`.
pub fn project_for(root: &Path, file: &Path) -> String {
    let Ok(relative) = file.strip_prefix(root) else {
        return "unknown".to_string();
    };

    let parts: Vec<Component<'_>> = relative.components().collect();
    if parts.len() <= 1 {
        return "default".to_string();
    }
    dir_to_project(&parts[0].as_os_str().to_string_lossy())
}

/// Import every session file under `root`.
///
/// With `conn` set to `None` files are parsed and counted but nothing is
/// written (dry run). A file that fails is recorded in the report and the
/// run moves on.
pub fn import_sessions(
    mut conn: Option<&mut Connection>,
    root: &Path,
    options: &ImportOptions,
) -> Result<ImportReport, ScanError> {
    let mut files = collect_session_files(root, options.include_agents)?;
    if let Some(limit) = options.limit.filter(|&limit| limit > 0) {
        files.truncate(limit);
    }
    if files.is_empty() {
        return Err(ScanError::NoSessionFiles {
            root: root.to_path_buf(),
        });
    }
    tracing::info!(count = files.len(), root = %root.display(), "found session files");

    let mut report = ImportReport {
        files: files.len(),
        ..ImportReport::default()
    };

    for (i, path) in files.iter().enumerate() {
        let project = project_for(root, path);
        if let Err(error) = import_one(conn.as_deref_mut(), path, Some(&project), &mut report) {
            tracing::warn!(path = %path.display(), %error, "failed to import session");
            report.errors.push(ItemError {
                source: path.display().to_string(),
                error: error.to_string(),
            });
        }

        if (i + 1) % PROGRESS_EVERY == 0 {
            tracing::info!("processed {}/{}...", i + 1, files.len());
        }
    }

    if let Some(conn) = conn {
        tracing::info!("finalizing database schema");
        finalize_schema(conn)?;
    }

    Ok(report)
}

/// Outcome of importing one explicitly named session file.
#[derive(Debug)]
pub struct FileImport {
    pub session_id: String,
    pub messages: usize,
    pub warnings: usize,
}

/// Import a single session file and finalize the schema.
pub fn import_session_file(
    conn: &mut Connection,
    path: &Path,
    project: Option<&str>,
) -> Result<FileImport, ScanError> {
    let mut report = ImportReport {
        files: 1,
        ..ImportReport::default()
    };
    let Some(session_id) = import_one(Some(&mut *conn), path, project, &mut report)? else {
        return Err(ScanError::NoData {
            path: path.to_path_buf(),
        });
    };
    finalize_schema(conn)?;

    Ok(FileImport {
        session_id,
        messages: report.messages,
        warnings: report.warnings,
    })
}

/// Returns the id of the imported session, if the file held one.
fn import_one(
    conn: Option<&mut Connection>,
    path: &Path,
    project: Option<&str>,
    report: &mut ImportReport,
) -> Result<Option<String>, ScanError> {
    let outcome = process_session(path, project)?;
    for warning in &outcome.warnings {
        tracing::warn!("{}", warning);
    }
    report.warnings += outcome.warnings.len();

    let Some(normalized) = outcome.session else {
        tracing::debug!(path = %path.display(), "no session data");
        return Ok(None);
    };

    if let Some(conn) = conn {
        save_session(conn, &normalized)?;
    }
    report.sessions += 1;
    report.messages += normalized.messages.len();
    Ok(Some(normalized.session.session_id))
}
