//! Field whitelist applied before every persistence write and every export.
//! Coercion never fails: malformed input yields a well-shaped task with
//! defaults, unknown fields are dropped at the type boundary.

use serde_json::Value;

use crate::models::{new_task_id, Priority, Task, TaskStatus, Timestamp};

pub const MAX_TAGS: usize = 50;

/// Builds a well-shaped task from an arbitrary JSON value.
pub fn sanitize_record(value: &Value, now: Timestamp) -> Task {
    let field = |name: &str| value.get(name).cloned().unwrap_or(Value::Null);

    let mut id = coerce_string(&field("id"));
    if id.is_empty() {
        id = new_task_id();
    }

    Task {
        id,
        text: coerce_string(&field("text")),
        created_at: coerce_timestamp(&field("createdAt")).unwrap_or(now),
        due: coerce_timestamp(&field("due")),
        completed: field("completed").as_bool().unwrap_or(false),
        priority: coerce_priority(&field("priority")),
        tags: coerce_tags(&field("tags")),
        recurrence: match field("recurrence") {
            Value::Null => None,
            other => Some(other),
        },
        status: coerce_status(&field("status")),
        order: field("order").as_i64().unwrap_or(0),
        reminder_sent: field("reminderSent").as_bool().unwrap_or(false),
    }
}

/// Re-normalizes an already-typed task. The type system rules out most
/// malformed shapes, so this only enforces the value-level invariants:
/// non-empty id, sane creation time, capped tag list.
pub fn sanitize_task(task: &Task, now: Timestamp) -> Task {
    let mut clean = task.clone();
    if clean.id.trim().is_empty() {
        clean.id = new_task_id();
    }
    if clean.created_at <= 0 {
        clean.created_at = now;
    }
    clean.tags.truncate(MAX_TAGS);
    clean
}

pub fn sanitize_tasks(tasks: &[Task], now: Timestamp) -> Vec<Task> {
    tasks.iter().map(|task| sanitize_task(task, now)).collect()
}

pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accepts epoch milliseconds or an RFC 3339 string; anything else is dropped.
pub(crate) fn coerce_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => chrono::DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| parsed.timestamp_millis()),
        _ => None,
    }
}

fn coerce_priority(value: &Value) -> Priority {
    match value.as_str() {
        Some("high") => Priority::High,
        Some("medium") => Priority::Medium,
        _ => Priority::Low,
    }
}

fn coerce_status(value: &Value) -> TaskStatus {
    match value.as_str() {
        Some("deleted") => TaskStatus::Deleted,
        _ => TaskStatus::Active,
    }
}

fn coerce_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().take(MAX_TAGS).map(coerce_string).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_record_coerces_a_full_document() {
        let raw = json!({
            "id": "t1",
            "text": "water plants",
            "createdAt": 5_000,
            "due": 9_000,
            "completed": true,
            "priority": "high",
            "tags": ["home", "garden"],
            "status": "deleted",
            "order": 3,
            "reminderSent": true,
            "__proto__": {"polluted": true}
        });

        let task = sanitize_record(&raw, 1);
        assert_eq!(task.id, "t1");
        assert_eq!(task.text, "water plants");
        assert_eq!(task.created_at, 5_000);
        assert_eq!(task.due, Some(9_000));
        assert!(task.completed);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.tags, vec!["home", "garden"]);
        assert_eq!(task.status, TaskStatus::Deleted);
        assert_eq!(task.order, 3);
        assert!(task.reminder_sent);

        // Unknown fields never survive the whitelist.
        let value = serde_json::to_value(&task).expect("serialize task");
        assert!(value.get("__proto__").is_none());
    }

    #[test]
    fn sanitize_record_never_fails_on_garbage() {
        for raw in [json!(null), json!(42), json!("text"), json!([1, 2]), json!({})] {
            let task = sanitize_record(&raw, 777);
            assert!(!task.id.is_empty());
            assert_eq!(task.created_at, 777);
            assert_eq!(task.status, TaskStatus::Active);
            assert!(!task.completed);
        }
    }

    #[test]
    fn sanitize_record_coerces_field_types() {
        let raw = json!({
            "id": 12,
            "text": 99,
            "createdAt": "not a date",
            "due": "2026-03-01T10:00:00Z",
            "completed": "yes",
            "priority": "urgent",
            "tags": "home",
            "order": "first"
        });

        let task = sanitize_record(&raw, 500);
        assert_eq!(task.id, "12");
        assert_eq!(task.text, "99");
        // Invalid timestamp falls back to "now".
        assert_eq!(task.created_at, 500);
        // RFC 3339 due strings normalize to epoch milliseconds.
        assert_eq!(task.due, Some(1_772_359_200_000));
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Low);
        assert!(task.tags.is_empty());
        assert_eq!(task.order, 0);
    }

    #[test]
    fn sanitize_record_caps_tags() {
        let tags: Vec<Value> = (0..80).map(|i| json!(format!("tag-{i}"))).collect();
        let task = sanitize_record(&json!({ "text": "x", "tags": tags }), 0);
        assert_eq!(task.tags.len(), MAX_TAGS);
        assert_eq!(task.tags[0], "tag-0");
    }

    #[test]
    fn sanitize_task_fixes_value_level_invariants() {
        let mut task = Task::new("x".to_string(), 100);
        task.id = "  ".to_string();
        task.created_at = 0;
        task.tags = (0..60).map(|i| format!("t{i}")).collect();

        let clean = sanitize_task(&task, 900);
        assert!(!clean.id.trim().is_empty());
        assert_eq!(clean.created_at, 900);
        assert_eq!(clean.tags.len(), MAX_TAGS);
    }

    #[test]
    fn sanitize_task_keeps_well_formed_tasks_intact() {
        let mut task = Task::new("call the bank".to_string(), 100);
        task.due = Some(200);
        task.tags = vec!["errands".to_string()];
        assert_eq!(sanitize_task(&task, 900), task);
    }
}
