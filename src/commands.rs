//! Mutation API: each operation mutates the registry, schedules a debounced
//! persistence write, and emits the refreshed projection. No operation here
//! raises to its caller — invalid ids are silent no-ops and storage failures
//! stay inside the store — except import, whose validation error is the one
//! failure a user is meant to see.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::events::{Frontend, StatePayload};
use crate::models::{now_ms, BulkAction, Task, TaskExtras, TaskPatch};
use crate::state::{Registry, UndoTicket};
use crate::storage::{Saver, Storage, StorageError};
use crate::transfer;
use crate::transfer::ImportError;
use crate::view::{Filter, SortKey, ViewMode};

/// Reads the store fail-open and seeds a registry from it.
pub fn load_registry(storage: &Storage) -> Registry {
    if let Err(err) = storage.ensure_dirs() {
        log::warn!("failed to create data directories: {err}");
    }
    let file = storage.load_or_default(now_ms());
    Registry::new(file.tasks, file.meta)
}

fn refresh(ctx: &impl Frontend, registry: &Registry, saver: &Saver) {
    saver.schedule(registry.tasks(), registry.meta());
    emit(ctx, registry);
}

fn emit(ctx: &impl Frontend, registry: &Registry) {
    ctx.emit_state_updated(StatePayload {
        tasks: registry.tasks(),
        visible: registry.visible(),
        meta: registry.meta(),
    });
}

pub fn add_task(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    text: &str,
    extras: TaskExtras,
) -> Option<Task> {
    let task = registry.add_task(text, extras, now_ms())?;
    log::debug!("task added id={}", task.id);
    refresh(ctx, registry, saver);
    Some(task)
}

pub fn update_task(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    id: &str,
    patch: TaskPatch,
) -> Option<Task> {
    let task = registry.update_task(id, patch)?;
    refresh(ctx, registry, saver);
    Some(task)
}

pub fn toggle_complete(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    id: &str,
) -> Option<Task> {
    let task = registry.toggle_complete(id)?;
    refresh(ctx, registry, saver);
    Some(task)
}

/// Soft-deletes and hands back the ticket that `undo_delete` redeems within
/// the undo window.
pub fn soft_delete(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    id: &str,
) -> Option<UndoTicket> {
    let ticket = registry.soft_delete(id, now_ms())?;
    log::debug!("task soft-deleted id={id}");
    refresh(ctx, registry, saver);
    Some(ticket)
}

pub fn undo_delete(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    ticket: &UndoTicket,
) -> bool {
    if !registry.undo_delete(ticket, now_ms()) {
        return false;
    }
    refresh(ctx, registry, saver);
    true
}

pub fn purge_task(ctx: &impl Frontend, registry: &Registry, saver: &Saver, id: &str) -> bool {
    if !registry.purge_task(id) {
        return false;
    }
    log::debug!("task purged id={id}");
    refresh(ctx, registry, saver);
    true
}

pub fn reorder_task(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    source_id: &str,
    dest_id: &str,
) -> bool {
    if !registry.reorder_task(source_id, dest_id) {
        return false;
    }
    refresh(ctx, registry, saver);
    true
}

pub fn bulk_apply(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    action: BulkAction,
    ids: &[String],
) {
    registry.bulk_apply(action, ids);
    refresh(ctx, registry, saver);
}

/// Replaces the registry with a validated document. On any `ImportError`
/// the registry is untouched.
pub fn import_document(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    value: &Value,
) -> Result<Vec<Task>, ImportError> {
    let (tasks, meta) = transfer::parse_import(value, now_ms())?;
    let count = tasks.len();
    registry.replace_all(tasks, meta);
    log::info!("imported {count} tasks");
    refresh(ctx, registry, saver);
    Ok(registry.tasks())
}

pub fn import_from_path(
    ctx: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    path: &Path,
) -> Result<Vec<Task>, ImportError> {
    let (tasks, meta) = transfer::import_from_path(path, now_ms())?;
    let count = tasks.len();
    registry.replace_all(tasks, meta);
    log::info!("imported {count} tasks from {}", path.display());
    refresh(ctx, registry, saver);
    Ok(registry.tasks())
}

pub fn export_to_file(registry: &Registry, saver: &Saver) -> Result<PathBuf, StorageError> {
    let path = transfer::export_to_file(
        saver.storage(),
        &registry.tasks(),
        &registry.meta(),
        now_ms(),
    )?;
    log::info!("exported tasks to {}", path.display());
    Ok(path)
}

// View parameter changes refresh the projection without persisting; view
// state is transient by design.

pub fn set_filter(ctx: &impl Frontend, registry: &Registry, filter: Filter) {
    registry.set_filter(filter);
    emit(ctx, registry);
}

pub fn set_sort(ctx: &impl Frontend, registry: &Registry, sort: SortKey) {
    registry.set_sort(sort);
    emit(ctx, registry);
}

pub fn set_search(ctx: &impl Frontend, registry: &Registry, query: &str) {
    registry.set_search(query);
    emit(ctx, registry);
}

pub fn set_view_mode(ctx: &impl Frontend, registry: &Registry, mode: ViewMode) {
    registry.set_view_mode(mode);
    emit(ctx, registry);
}

pub fn set_selected(ctx: &impl Frontend, registry: &Registry, id: &str, selected: bool) {
    registry.set_selected(id, selected);
    emit(ctx, registry);
}
