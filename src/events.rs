use crate::models::{Meta, Task};

pub const EVENT_REMINDER: &str = "reminder_fired";
pub const EVENT_STATE_UPDATED: &str = "state_updated";

/// Snapshot emitted after every mutation: the authoritative list, the
/// refreshed projection for the current view parameters, and the metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatePayload {
    pub tasks: Vec<Task>,
    pub visible: Vec<Task>,
    pub meta: Meta,
}

/// Seam a UI layer implements to observe the core. `EVENT_STATE_UPDATED`
/// and `EVENT_REMINDER` are the suggested channel names for hosts that
/// bridge these callbacks onto an event bus.
pub trait Frontend: Send + Sync {
    fn emit_state_updated(&self, payload: StatePayload);

    /// Overdue tasks detected by the reminder scanner, at most once each.
    fn emit_reminder(&self, due: &[Task]);
}

/// Headless frontend: state updates are dropped, reminders only logged.
pub struct NullFrontend;

impl Frontend for NullFrontend {
    fn emit_state_updated(&self, _payload: StatePayload) {}

    fn emit_reminder(&self, due: &[Task]) {
        for task in due {
            log::info!("task due: {}", task.text);
        }
    }
}
