//! Presentation-side view state and the projection deriving the visible
//! task list. Sorting here never touches the authoritative `order` field.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Created,
    Due,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Trash,
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub filter: Filter,
    pub sort: SortKey,
    pub search: String,
    pub selected: HashSet<String>,
    pub mode: ViewMode,
}

/// Derives the visible, ordered task list. Base set by view mode, then
/// filter, then search, then sort; all sorts are stable.
pub fn visible_tasks(tasks: &[Task], view: &ViewState) -> Vec<Task> {
    let mut list: Vec<Task> = tasks
        .iter()
        .filter(|task| match view.mode {
            ViewMode::Trash => task.status == TaskStatus::Deleted,
            ViewMode::List => task.status != TaskStatus::Deleted,
        })
        .cloned()
        .collect();

    match view.filter {
        Filter::Pending => list.retain(|task| !task.completed),
        Filter::Completed => list.retain(|task| task.completed),
        Filter::All => {}
    }

    if !view.search.is_empty() {
        let query = view.search.to_lowercase();
        list.retain(|task| {
            task.text.to_lowercase().contains(&query)
                || task.tags.join(" ").to_lowercase().contains(&query)
        });
    }

    match view.sort {
        SortKey::Created => list.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        // Tasks with a due date sort before those without, earliest first.
        SortKey::Due => list.sort_by_key(|task| (task.due.is_none(), task.due.unwrap_or(0))),
        SortKey::Priority => {
            list.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()))
        }
    }

    list
}
