use std::sync::{Arc, Mutex};

use crate::models::{
    BulkAction, Meta, Priority, StoreFile, Task, TaskExtras, TaskPatch, TaskStatus, Timestamp,
};
use crate::view::{visible_tasks, Filter, SortKey, ViewMode, ViewState};

/// How long a delete stays undoable.
pub const UNDO_WINDOW_MS: Timestamp = 10_000;

/// Handed out by `soft_delete`; redeemable until the window expires or a
/// newer delete supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoTicket {
    pub task_id: String,
    pub expires_at: Timestamp,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingUndo {
    task_id: String,
    expires_at: Timestamp,
    seq: u64,
}

/// Authoritative task list plus transient view state. Mutation primitives
/// take explicit timestamps so tests control the clock; the command layer
/// supplies wall time.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Mutex<RegistryData>>,
}

struct RegistryData {
    tasks: Vec<Task>,
    meta: Meta,
    view: ViewState,
    pending_undo: Option<PendingUndo>,
    undo_seq: u64,
}

impl Registry {
    pub fn new(tasks: Vec<Task>, meta: Meta) -> Self {
        let mut tasks = tasks;
        reindex(&mut tasks);
        Self {
            inner: Arc::new(Mutex::new(RegistryData {
                tasks,
                meta,
                view: ViewState::default(),
                pending_undo: None,
                undo_seq: 0,
            })),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.tasks.clone()
    }

    pub fn meta(&self) -> Meta {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.meta.clone()
    }

    pub fn store_file(&self) -> StoreFile {
        let guard = self.inner.lock().expect("registry poisoned");
        StoreFile {
            meta: guard.meta.clone(),
            tasks: guard.tasks.clone(),
        }
    }

    /// The projection for the current view parameters.
    pub fn visible(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("registry poisoned");
        visible_tasks(&guard.tasks, &guard.view)
    }

    pub fn view(&self) -> ViewState {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.view.clone()
    }

    pub fn set_filter(&self, filter: Filter) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        guard.view.filter = filter;
    }

    pub fn set_sort(&self, sort: SortKey) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        guard.view.sort = sort;
    }

    pub fn set_search(&self, query: &str) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        guard.view.search = query.to_string();
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        guard.view.mode = mode;
    }

    pub fn set_selected(&self, id: &str, selected: bool) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if selected {
            guard.view.selected.insert(id.to_string());
        } else {
            guard.view.selected.remove(id);
        }
    }

    pub fn selected_ids(&self) -> Vec<String> {
        let guard = self.inner.lock().expect("registry poisoned");
        guard.view.selected.iter().cloned().collect()
    }

    /// Inserts a new task at the front of the authoritative order. Whitespace
    /// -only text is a no-op.
    pub fn add_task(&self, text: &str, extras: TaskExtras, now: Timestamp) -> Option<Task> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut task = Task::new(text.to_string(), now);
        task.due = extras.due;
        if let Some(priority) = extras.priority {
            task.priority = priority;
        }
        task.tags = extras.tags;
        task.recurrence = extras.recurrence;

        let mut guard = self.inner.lock().expect("registry poisoned");
        guard.tasks.insert(0, task);
        reindex(&mut guard.tasks);
        Some(guard.tasks[0].clone())
    }

    /// Merges a patch into the matching task; missing ids are a no-op.
    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Option<Task> {
        let mut guard = self.inner.lock().expect("registry poisoned");
        let task = guard.tasks.iter_mut().find(|t| t.id == id)?;
        if let Some(text) = patch.text {
            task.text = text;
        }
        if let Some(due) = patch.due {
            task.due = due;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(recurrence) = patch.recurrence {
            task.recurrence = recurrence;
        }
        Some(task.clone())
    }

    pub fn toggle_complete(&self, id: &str) -> Option<Task> {
        let mut guard = self.inner.lock().expect("registry poisoned");
        let task = guard.tasks.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        Some(task.clone())
    }

    /// Marks the task deleted and returns an undo ticket. A newer delete
    /// supersedes any outstanding ticket.
    pub fn soft_delete(&self, id: &str, now: Timestamp) -> Option<UndoTicket> {
        let mut guard = self.inner.lock().expect("registry poisoned");
        let task = guard.tasks.iter_mut().find(|t| t.id == id)?;
        task.status = TaskStatus::Deleted;
        let task_id = task.id.clone();

        guard.undo_seq += 1;
        let pending = PendingUndo {
            task_id: task_id.clone(),
            expires_at: now + UNDO_WINDOW_MS,
            seq: guard.undo_seq,
        };
        guard.pending_undo = Some(pending.clone());
        Some(UndoTicket {
            task_id,
            expires_at: pending.expires_at,
            seq: pending.seq,
        })
    }

    /// Restores a soft-deleted task if the ticket is still current and the
    /// window has not expired. Expiry finalizes the delete.
    pub fn undo_delete(&self, ticket: &UndoTicket, now: Timestamp) -> bool {
        let mut guard = self.inner.lock().expect("registry poisoned");
        let pending = match guard.pending_undo.as_ref() {
            Some(pending) => pending.clone(),
            None => return false,
        };
        if pending.seq != ticket.seq {
            return false;
        }
        if now >= pending.expires_at {
            guard.pending_undo = None;
            return false;
        }
        guard.pending_undo = None;
        match guard.tasks.iter_mut().find(|t| t.id == ticket.task_id) {
            Some(task) => {
                task.status = TaskStatus::Active;
                true
            }
            None => false,
        }
    }

    /// Permanently removes the task. The only hard removal besides import.
    pub fn purge_task(&self, id: &str) -> bool {
        let mut guard = self.inner.lock().expect("registry poisoned");
        let before = guard.tasks.len();
        guard.tasks.retain(|task| task.id != id);
        if guard.tasks.len() == before {
            return false;
        }
        reindex(&mut guard.tasks);
        true
    }

    /// Moves the source task to immediately before the destination task.
    pub fn reorder_task(&self, source_id: &str, dest_id: &str) -> bool {
        if source_id == dest_id {
            return false;
        }
        let mut guard = self.inner.lock().expect("registry poisoned");
        let source_index = match guard.tasks.iter().position(|t| t.id == source_id) {
            Some(index) => index,
            None => return false,
        };
        if !guard.tasks.iter().any(|t| t.id == dest_id) {
            return false;
        }
        let task = guard.tasks.remove(source_index);
        let dest_index = guard
            .tasks
            .iter()
            .position(|t| t.id == dest_id)
            .unwrap_or(guard.tasks.len());
        guard.tasks.insert(dest_index, task);
        reindex(&mut guard.tasks);
        true
    }

    /// Applies one action to every listed task that still exists, then
    /// clears the selection set.
    pub fn bulk_apply(&self, action: BulkAction, ids: &[String]) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        for id in ids {
            if let Some(task) = guard.tasks.iter_mut().find(|t| &t.id == id) {
                match action {
                    BulkAction::Delete => task.status = TaskStatus::Deleted,
                    BulkAction::Complete => task.completed = true,
                    BulkAction::PriorityHigh => task.priority = Priority::High,
                }
            }
        }
        guard.view.selected.clear();
    }

    /// Replaces the whole task set (import, restore). Outstanding undo
    /// tickets die with the old set.
    pub fn replace_all(&self, tasks: Vec<Task>, meta: Option<Meta>) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        guard.tasks = tasks;
        reindex(&mut guard.tasks);
        if let Some(meta) = meta {
            guard.meta = meta;
        }
        guard.pending_undo = None;
    }

    pub fn mark_reminder_sent(&self, id: &str) {
        let mut guard = self.inner.lock().expect("registry poisoned");
        if let Some(task) = guard.tasks.iter_mut().find(|t| t.id == id) {
            task.reminder_sent = true;
        }
    }
}

fn reindex(tasks: &mut [Task]) {
    for (index, task) in tasks.iter_mut().enumerate() {
        task.order = index as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn registry() -> Registry {
        Registry::new(Vec::new(), Meta::default())
    }

    fn orders(registry: &Registry) -> Vec<i64> {
        registry.tasks().iter().map(|t| t.order).collect()
    }

    #[test]
    fn add_task_prepends_and_keeps_orders_dense() {
        let registry = registry();
        registry.add_task("first", TaskExtras::default(), 10);
        registry.add_task("second", TaskExtras::default(), 20);
        registry.add_task("third", TaskExtras::default(), 30);

        let tasks = registry.tasks();
        let texts: Vec<&str> = tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["third", "second", "first"]);
        assert_eq!(orders(&registry), vec![0, 1, 2]);

        let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), tasks.len());
    }

    #[test]
    fn add_task_rejects_blank_text() {
        let registry = registry();
        assert!(registry.add_task("", TaskExtras::default(), 0).is_none());
        assert!(registry.add_task("   ", TaskExtras::default(), 0).is_none());
        assert!(registry.tasks().is_empty());
    }

    #[test]
    fn add_task_trims_and_applies_extras() {
        let registry = registry();
        let extras = TaskExtras {
            due: Some(900),
            priority: Some(Priority::High),
            tags: vec!["work".to_string()],
            ..TaskExtras::default()
        };
        let task = registry.add_task("  ship release  ", extras, 10).unwrap();
        assert_eq!(task.text, "ship release");
        assert_eq!(task.due, Some(900));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.tags, vec!["work"]);
    }

    #[test]
    fn update_task_merges_patch_and_ignores_missing_ids() {
        let registry = registry();
        let task = registry.add_task("draft", TaskExtras::default(), 0).unwrap();

        let patch = TaskPatch {
            text: Some("final".to_string()),
            due: Some(Some(400)),
            ..TaskPatch::default()
        };
        let updated = registry.update_task(&task.id, patch).unwrap();
        assert_eq!(updated.text, "final");
        assert_eq!(updated.due, Some(400));
        // Untouched fields survive the merge.
        assert_eq!(updated.created_at, task.created_at);

        assert!(registry.update_task("missing", TaskPatch::default()).is_none());
    }

    #[test]
    fn toggle_complete_flips_both_ways() {
        let registry = registry();
        let task = registry.add_task("x", TaskExtras::default(), 0).unwrap();
        assert!(registry.toggle_complete(&task.id).unwrap().completed);
        assert!(!registry.toggle_complete(&task.id).unwrap().completed);
        assert!(registry.toggle_complete("missing").is_none());
    }

    #[test]
    fn undo_before_expiry_restores_the_task_unchanged() {
        let registry = registry();
        let task = registry.add_task("keep me", TaskExtras::default(), 0).unwrap();
        let before = registry.tasks();

        let ticket = registry.soft_delete(&task.id, 1_000).unwrap();
        assert_eq!(
            registry.tasks()[0].status,
            TaskStatus::Deleted,
            "delete must mark the task"
        );

        assert!(registry.undo_delete(&ticket, 1_000 + UNDO_WINDOW_MS - 1));
        assert_eq!(registry.tasks(), before);
    }

    #[test]
    fn undo_after_expiry_has_no_effect() {
        let registry = registry();
        let task = registry.add_task("gone", TaskExtras::default(), 0).unwrap();
        let ticket = registry.soft_delete(&task.id, 1_000).unwrap();

        assert!(!registry.undo_delete(&ticket, 1_000 + UNDO_WINDOW_MS));
        assert_eq!(registry.tasks()[0].status, TaskStatus::Deleted);
        // A spent window stays spent.
        assert!(!registry.undo_delete(&ticket, 1_000));
    }

    #[test]
    fn newer_delete_supersedes_an_outstanding_ticket() {
        let registry = registry();
        let first = registry.add_task("first", TaskExtras::default(), 0).unwrap();
        let second = registry.add_task("second", TaskExtras::default(), 0).unwrap();

        let stale = registry.soft_delete(&first.id, 1_000).unwrap();
        let fresh = registry.soft_delete(&second.id, 2_000).unwrap();

        assert!(!registry.undo_delete(&stale, 1_001));
        assert!(registry.undo_delete(&fresh, 2_001));
    }

    #[test]
    fn purge_removes_and_reindexes() {
        let registry = registry();
        registry.add_task("a", TaskExtras::default(), 0);
        let victim = registry.add_task("b", TaskExtras::default(), 0).unwrap();
        registry.add_task("c", TaskExtras::default(), 0);

        assert!(registry.purge_task(&victim.id));
        assert_eq!(registry.tasks().len(), 2);
        assert_eq!(orders(&registry), vec![0, 1]);
        assert!(!registry.purge_task(&victim.id));
    }

    #[test]
    fn reorder_places_source_before_destination() {
        let registry = registry();
        let c = registry.add_task("c", TaskExtras::default(), 0).unwrap();
        let b = registry.add_task("b", TaskExtras::default(), 0).unwrap();
        let a = registry.add_task("a", TaskExtras::default(), 0).unwrap();
        // Authoritative order is now [a, b, c].

        assert!(registry.reorder_task(&c.id, &a.id));
        let texts: Vec<String> = registry.tasks().iter().map(|t| t.text.clone()).collect();
        assert_eq!(texts, ["c", "a", "b"]);
        assert_eq!(orders(&registry), vec![0, 1, 2]);

        // Moving forward past the destination still lands right before it.
        assert!(registry.reorder_task(&c.id, &b.id));
        let texts: Vec<String> = registry.tasks().iter().map(|t| t.text.clone()).collect();
        assert_eq!(texts, ["a", "c", "b"]);

        assert!(!registry.reorder_task(&a.id, &a.id));
        assert!(!registry.reorder_task(&a.id, "missing"));
        assert!(!registry.reorder_task("missing", &a.id));
        let _ = b;
    }

    #[test]
    fn bulk_apply_hits_existing_ids_and_clears_selection() {
        let registry = registry();
        let a = registry.add_task("a", TaskExtras::default(), 0).unwrap();
        let b = registry.add_task("b", TaskExtras::default(), 0).unwrap();
        registry.set_selected(&a.id, true);
        registry.set_selected(&b.id, true);

        let ids = vec![a.id.clone(), "missing".to_string(), b.id.clone()];
        registry.bulk_apply(BulkAction::Complete, &ids);
        assert!(registry.tasks().iter().all(|t| t.completed));
        assert!(registry.selected_ids().is_empty());

        registry.bulk_apply(BulkAction::PriorityHigh, &[a.id.clone()]);
        let task = registry.tasks().into_iter().find(|t| t.id == a.id).unwrap();
        assert_eq!(task.priority, Priority::High);

        registry.bulk_apply(BulkAction::Delete, &[b.id.clone()]);
        let task = registry.tasks().into_iter().find(|t| t.id == b.id).unwrap();
        assert_eq!(task.status, TaskStatus::Deleted);
    }

    #[test]
    fn replace_all_reindexes_and_drops_pending_undo() {
        let registry = registry();
        let old = registry.add_task("old", TaskExtras::default(), 0).unwrap();
        let ticket = registry.soft_delete(&old.id, 0).unwrap();

        let mut imported = Task::new("imported".to_string(), 5);
        imported.order = 42;
        let meta = Meta {
            updated_at: 99,
            ..Meta::default()
        };
        registry.replace_all(vec![imported], Some(meta.clone()));

        assert_eq!(orders(&registry), vec![0]);
        assert_eq!(registry.meta(), meta);
        assert!(!registry.undo_delete(&ticket, 1));
    }

    #[test]
    fn new_reindexes_loaded_tasks() {
        let mut a = Task::new("a".to_string(), 0);
        a.order = 7;
        let mut b = Task::new("b".to_string(), 0);
        b.order = 7;
        let registry = Registry::new(vec![a, b], Meta::default());
        assert_eq!(orders(&registry), vec![0, 1]);
    }

    #[test]
    fn view_setters_feed_the_projection() {
        let registry = registry();
        let task = registry.add_task("find me", TaskExtras::default(), 0).unwrap();
        registry.add_task("other", TaskExtras::default(), 0);

        registry.set_search("find");
        let visible = registry.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, task.id);

        registry.set_search("");
        registry.set_view_mode(ViewMode::Trash);
        assert!(registry.visible().is_empty());
    }
}
