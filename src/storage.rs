use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::models::{now_ms, Meta, StoreFile, Task, Timestamp};
use crate::sanitize::{coerce_string, coerce_timestamp, sanitize_record, sanitize_tasks};

const DATA_FILE: &str = "data.json";
/// Pre-registry formats, consulted only when `data.json` is absent.
const LEGACY_FILES: [&str; 2] = ["tasks-v1.json", "tasks.json"];
pub const EXPORTS_DIR: &str = "exports";

/// Trailing-edge window: only the last save in a burst hits the disk.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Json(value)
    }
}

pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.root.join(EXPORTS_DIR))?;
        Ok(())
    }

    /// Loads the store, migrating legacy documents when only those exist.
    /// Never fails: corrupt or unreadable data logs a warning and yields an
    /// empty store.
    pub fn load_or_default(&self, now: Timestamp) -> StoreFile {
        let data_path = self.root.join(DATA_FILE);
        if data_path.exists() {
            return match self.read_value(DATA_FILE) {
                Ok(value) => decode_store(&value, now),
                Err(err) => {
                    log::warn!("task store unreadable, starting empty: {err}");
                    StoreFile::default()
                }
            };
        }

        for legacy in LEGACY_FILES {
            if !self.root.join(legacy).exists() {
                continue;
            }
            match self.read_value(legacy) {
                Ok(value) => {
                    let tasks = migrate_legacy(&value, now);
                    log::info!("migrated {} tasks from {legacy}", tasks.len());
                    let file = StoreFile {
                        meta: Meta {
                            updated_at: now,
                            ..Meta::default()
                        },
                        tasks,
                    };
                    if let Err(err) = self.save(&file) {
                        log::error!("failed to persist migrated store: {err}");
                    }
                    return file;
                }
                Err(err) => {
                    log::warn!("legacy store {legacy} unreadable, starting empty: {err}");
                    return StoreFile::default();
                }
            }
        }

        StoreFile::default()
    }

    pub fn save(&self, file: &StoreFile) -> Result<(), StorageError> {
        self.write_atomic(DATA_FILE, file)
    }

    fn read_value(&self, filename: &str) -> Result<Value, StorageError> {
        let mut file = File::open(self.root.join(filename))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    pub(crate) fn write_atomic<T: Serialize>(
        &self,
        filename: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let path = self.root.join(filename);
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

/// Tolerant decode of the current document: a bare task array or a
/// `{ meta, tasks }` object, every record run through the sanitizer.
fn decode_store(value: &Value, now: Timestamp) -> StoreFile {
    let (records, meta) = match value {
        Value::Array(items) => (items.as_slice(), Meta::default()),
        Value::Object(map) => {
            let records = map
                .get("tasks")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let meta = map
                .get("meta")
                .and_then(|meta| serde_json::from_value(meta.clone()).ok())
                .unwrap_or_default();
            (records, meta)
        }
        _ => {
            log::warn!("task store has unexpected shape, starting empty");
            (Default::default(), Meta::default())
        }
    };
    StoreFile {
        meta,
        tasks: records
            .iter()
            .map(|record| sanitize_record(record, now))
            .collect(),
    }
}

/// Migrates a legacy document: a bare array of `{text|task, checked}`
/// records or an object wrapping one. Order is assigned by array position.
pub fn migrate_legacy(value: &Value, now: Timestamp) -> Vec<Task> {
    let records = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("tasks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => Default::default(),
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let text = ["text", "task"]
                .iter()
                .find_map(|key| {
                    record
                        .get(*key)
                        .map(coerce_string)
                        .filter(|text| !text.is_empty())
                })
                .unwrap_or_else(|| coerce_string(record));
            let mut task = Task::new(text, now);
            task.completed = record
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if let Some(created_at) = record.get("createdAt").and_then(coerce_timestamp) {
                task.created_at = created_at;
            }
            task.order = index as i64;
            task
        })
        .collect()
}

/// Debounced writer. `schedule` arms (or re-arms) a delayed write carrying
/// the given snapshot; only the last call in a burst persists. Must run
/// inside a tokio runtime. The abort can only land on the sleep, so a write
/// already in progress always completes.
#[derive(Clone)]
pub struct Saver {
    storage: Arc<Storage>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Saver {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(storage),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn schedule(&self, tasks: Vec<Task>, meta: Meta) {
        let mut slot = self.pending.lock().expect("saver poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let storage = Arc::clone(&self.storage);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(SAVE_DEBOUNCE).await;
            write_snapshot(&storage, tasks, meta);
        }));
    }

    /// Cancels any pending write and persists immediately. Shutdown path.
    pub fn flush(&self, tasks: Vec<Task>, meta: Meta) {
        let mut slot = self.pending.lock().expect("saver poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        drop(slot);
        write_snapshot(&self.storage, tasks, meta);
    }
}

fn write_snapshot(storage: &Storage, tasks: Vec<Task>, meta: Meta) {
    let now = now_ms();
    let file = StoreFile {
        meta: Meta {
            updated_at: now,
            prefs: meta.prefs,
        },
        tasks: sanitize_tasks(&tasks, now),
    };
    if let Err(err) = storage.save(&file) {
        log::error!("task store write failed: {err}");
    }
}
