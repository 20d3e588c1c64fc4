//! Reading raw records out of session files.
//!
//! Line-delimited files tolerate damage: a corrupted line is salvaged when it
//! is several records glued together and becomes a warning otherwise.

use crate::config::{LOGLINES_KEY, RECOVERY_MARKERS};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Raw records of one session file plus any non-fatal parse warnings.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<Value>,
    pub warnings: Vec<String>,
}

/// Load every record of a session file.
///
/// `.json` files hold a single document and must parse as a whole. Any
/// other file is read line by line; broken lines are salvaged where
/// possible and reported as warnings otherwise.
pub fn load_session_file(path: &Path) -> Result<LoadedRecords, ParseError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
        let records = parse_document(&contents).map_err(|source| ParseError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(LoadedRecords {
            records,
            warnings: Vec::new(),
        });
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_jsonl_str(&name, &contents))
}

/// Parse a single-document session into its record list.
pub fn parse_document(input: &str) -> Result<Vec<Value>, serde_json::Error> {
    let root: Value = serde_json::from_str(input)?;

    let records = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(LOGLINES_KEY) {
            Some(Value::Array(lines)) => lines,
            Some(other) => {
                map.insert(LOGLINES_KEY.to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    };

    Ok(records)
}

/// Parse line-delimited JSON. `name` only labels warnings.
pub fn parse_jsonl_str(name: &str, input: &str) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();

    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(value) => loaded.records.push(value),
            Err(_) => {
                let recovered = recover_records(line);
                if recovered.is_empty() {
                    loaded.warnings.push(format!(
                        "{} line {}: unrecoverable JSON parse error",
                        name,
                        idx + 1
                    ));
                } else {
                    tracing::debug!(
                        file = name,
                        line = idx + 1,
                        recovered = recovered.len(),
                        "recovered records from corrupted line"
                    );
                    loaded.records.extend(recovered);
                }
            }
        }
    }

    loaded
}

/// Salvage records from a line holding several objects glued together.
///
/// Splits at every occurrence of a known record opening and keeps the
/// pieces that parse. Objects starting any other way are not found.
pub fn recover_records(line: &str) -> Vec<Value> {
    let mut starts: Vec<usize> = RECOVERY_MARKERS
        .iter()
        .flat_map(|marker| line.match_indices(marker).map(|(offset, _)| offset))
        .collect();
    starts.sort_unstable();
    starts.dedup();

    let mut records = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(line.len());
        let segment = line[start..end].trim();
        if let Ok(value) = serde_json::from_str::<Value>(segment) {
            records.push(value);
        }
    }

    records
}
