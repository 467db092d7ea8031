//! Import/export gateway. Export always goes through the sanitizer so no
//! extraneous fields leave the process; import validates before it touches
//! the registry, so a rejected document leaves state unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::models::{Meta, StoreFile, Task, Timestamp};
use crate::sanitize::{sanitize_record, sanitize_tasks};
use crate::storage::{Storage, StorageError, EXPORTS_DIR};

pub const MAX_IMPORT_TASKS: usize = 5000;

#[derive(Debug)]
pub enum ImportError {
    /// Neither a task array nor an object with a `tasks` array.
    InvalidShape,
    TooManyTasks { count: usize },
    /// Record at `index` lacks both a string `id` and a string `text`.
    InvalidRecord { index: usize },
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::InvalidShape => {
                write!(f, "expected a task array or an object with a `tasks` array")
            }
            ImportError::TooManyTasks { count } => {
                write!(f, "import of {count} tasks exceeds the limit of {MAX_IMPORT_TASKS}")
            }
            ImportError::InvalidRecord { index } => {
                write!(f, "task at index {index} has neither an id nor a text")
            }
            ImportError::Io(err) => write!(f, "io error: {err}"),
            ImportError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        ImportError::Io(value)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(value: serde_json::Error) -> Self {
        ImportError::Json(value)
    }
}

/// The full sanitized document, ready to hand to a host for download.
pub fn export_document(tasks: &[Task], meta: &Meta, now: Timestamp) -> StoreFile {
    StoreFile {
        meta: meta.clone(),
        tasks: sanitize_tasks(tasks, now),
    }
}

/// Writes the export atomically to `exports/taskdeck-<stamp>.json` under
/// the storage root and returns the path.
pub fn export_to_file(
    storage: &Storage,
    tasks: &[Task],
    meta: &Meta,
    now: Timestamp,
) -> Result<PathBuf, StorageError> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!("{EXPORTS_DIR}/taskdeck-{stamp}.json");
    let document = export_document(tasks, meta, now);
    storage.write_atomic(&filename, &document)?;
    Ok(storage.root().join(filename))
}

/// Validates and sanitizes an import document: a bare task array or an
/// object with a `tasks` array (and optionally `meta`).
pub fn parse_import(
    value: &Value,
    now: Timestamp,
) -> Result<(Vec<Task>, Option<Meta>), ImportError> {
    let records = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("tasks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or(ImportError::InvalidShape)?,
        _ => return Err(ImportError::InvalidShape),
    };

    if records.len() > MAX_IMPORT_TASKS {
        return Err(ImportError::TooManyTasks {
            count: records.len(),
        });
    }

    for (index, record) in records.iter().enumerate() {
        let identified = record.is_object()
            && (record.get("id").is_some_and(Value::is_string)
                || record.get("text").is_some_and(Value::is_string));
        if !identified {
            return Err(ImportError::InvalidRecord { index });
        }
    }

    let tasks = records
        .iter()
        .take(MAX_IMPORT_TASKS)
        .map(|record| sanitize_record(record, now))
        .collect();
    let meta = value
        .get("meta")
        .and_then(|meta| serde_json::from_value(meta.clone()).ok());
    Ok((tasks, meta))
}

pub fn import_from_path(
    path: &Path,
    now: Timestamp,
) -> Result<(Vec<Task>, Option<Meta>), ImportError> {
    let raw = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    parse_import(&value, now)
}
