use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Epoch milliseconds.
pub type Timestamp = i64;

pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 2,
            Priority::Medium => 1,
            Priority::Low => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    /// Soft-deleted: hidden from every view except trash, recoverable until purged.
    Deleted,
}

/// A single to-do item. Field names on the wire are camelCase to stay
/// compatible with documents produced by earlier versions of the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub due: Option<Timestamp>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque recurrence descriptor, round-tripped but never interpreted here.
    #[serde(default)]
    pub recurrence: Option<Value>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Manual sort position, kept dense (0..n-1) after structural mutations.
    #[serde(default)]
    pub order: i64,
    /// Monotonic: once an overdue notification fired this never resets.
    #[serde(default)]
    pub reminder_sent: bool,
}

impl Task {
    pub fn new(text: String, now: Timestamp) -> Self {
        Self {
            id: new_task_id(),
            text,
            created_at: now,
            due: None,
            completed: false,
            priority: Priority::Low,
            tags: Vec::new(),
            recurrence: None,
            status: TaskStatus::Active,
            order: 0,
            reminder_sent: false,
        }
    }
}

/// Optional fields supplied alongside the text when creating a task.
#[derive(Debug, Clone, Default)]
pub struct TaskExtras {
    pub due: Option<Timestamp>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub recurrence: Option<Value>,
}

/// Partial update merged into an existing task. `None` leaves a field alone;
/// the double options distinguish "clear" from "keep".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub due: Option<Option<Timestamp>>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub recurrence: Option<Option<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkAction {
    Delete,
    Complete,
    PriorityHigh,
}

/// Registry metadata persisted next to the tasks. `prefs` is a free-form
/// settings bag owned by the UI layer; the core only carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default = "empty_prefs")]
    pub prefs: Value,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            updated_at: 0,
            prefs: empty_prefs(),
        }
    }
}

fn empty_prefs() -> Value {
    Value::Object(Map::new())
}

/// On-disk and import/export document shape: `{ meta, tasks }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub tasks: Vec<Task>,
}
