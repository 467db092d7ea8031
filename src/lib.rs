//! Headless to-do core: an in-memory task registry with soft-delete and
//! time-boxed undo, debounced JSON persistence with legacy migration, a pure
//! view projection, a periodic reminder sweep, and a validated import/export
//! gateway. UI layers subscribe through [`events::Frontend`]; nothing here
//! renders anything.

pub mod commands;
pub mod events;
pub mod logging;
pub mod models;
pub mod sanitize;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod transfer;
pub mod view;

pub use events::{Frontend, NullFrontend, StatePayload};
pub use models::{
    BulkAction, Meta, Priority, StoreFile, Task, TaskExtras, TaskPatch, TaskStatus, Timestamp,
};
pub use state::{Registry, UndoTicket, UNDO_WINDOW_MS};
pub use storage::{Saver, Storage, StorageError, SAVE_DEBOUNCE};
pub use transfer::{ImportError, MAX_IMPORT_TASKS};
pub use view::{Filter, SortKey, ViewMode, ViewState};
