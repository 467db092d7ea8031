use std::time::Duration;

use crate::events::Frontend;
use crate::models::{now_ms, Task, TaskStatus, Timestamp};
use crate::state::Registry;
use crate::storage::Saver;

pub const REMINDER_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns the periodic reminder sweep. The interval's first tick fires
/// immediately, which doubles as the startup sweep.
pub fn start_reminder_scanner<F>(frontend: F, registry: Registry, saver: Saver) -> tokio::task::JoinHandle<()>
where
    F: Frontend + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REMINDER_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            sweep_once(&frontend, &registry, &saver, now_ms());
        }
    })
}

/// One sweep: mark and announce every overdue task that has not been
/// announced yet, then persist. Idempotent per task — `reminder_sent`
/// never resets.
pub fn sweep_once(
    frontend: &impl Frontend,
    registry: &Registry,
    saver: &Saver,
    now: Timestamp,
) -> Vec<Task> {
    let due = collect_due_tasks(&registry.tasks(), now);
    if due.is_empty() {
        return due;
    }
    for task in &due {
        registry.mark_reminder_sent(&task.id);
    }
    frontend.emit_reminder(&due);
    saver.schedule(registry.tasks(), registry.meta());
    due
}

fn collect_due_tasks(tasks: &[Task], now: Timestamp) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| {
            task.status == TaskStatus::Active
                && !task.completed
                && !task.reminder_sent
                && task.due.is_some_and(|due| due <= now)
        })
        .cloned()
        .collect()
}
