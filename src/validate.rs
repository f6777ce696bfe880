//! Validation of create and update request bodies.
//!
//! Bodies are taken as loosely typed JSON so a wrong type on one field is
//! reported as a violation of that field instead of failing the whole
//! body, and so every violation can be reported at once.

use crate::error::FieldError;
use crate::types::{NewTask, Priority, TaskChanges, TaskStatus, UserId, parse_date};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

const TITLE_REQUIRED: &str = "Title is required and must be between 1 and 100 characters";
const TITLE_LENGTH: &str = "Title must be between 1 and 100 characters";
const DESCRIPTION_LENGTH: &str = "Description must be less than 500 characters";
const PRIORITY_INVALID: &str = "Priority must be low, medium, or high";
const STATUS_INVALID: &str = "Status must be pending or completed";
const DUE_DATE_INVALID: &str = "Due date must be a valid date";

/// Body of a create request. `null` is treated the same as an absent field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub priority: Option<Value>,
    pub due_date: Option<Value>,
}

/// Body of an update request. An absent field is `None`; an explicit
/// `null` is `Some(Value::Null)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub status: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub priority: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Collects field violations while values are checked.
#[derive(Default)]
struct Violations(Vec<FieldError>);

impl Violations {
    fn check<T>(&mut self, field: &str, result: Result<T, &str>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.0.push(FieldError::new(field, message));
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }
}

fn title(value: &Value, message: &'static str) -> Result<String, &'static str> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let chars = trimmed.chars().count();
            if (1..=TITLE_MAX_CHARS).contains(&chars) {
                Ok(trimmed.to_string())
            } else {
                Err(message)
            }
        }
        _ => Err(message),
    }
}

/// `Ok(None)` for a blank description, which is stored as absent.
fn description(value: &Value) -> Result<Option<String>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.chars().count() > DESCRIPTION_MAX_CHARS {
                Err(DESCRIPTION_LENGTH)
            } else if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        _ => Err(DESCRIPTION_LENGTH),
    }
}

fn priority(value: &Value) -> Result<Priority, &'static str> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or(PRIORITY_INVALID)
}

fn status(value: &Value) -> Result<TaskStatus, &'static str> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or(STATUS_INVALID)
}

fn due_date(value: &Value) -> Result<Option<DateTime<Utc>>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => parse_date(s).map(Some).ok_or(DUE_DATE_INVALID),
        _ => Err(DUE_DATE_INVALID),
    }
}

/// Validate a create body into a task owned by `owner`.
pub fn validate_create(
    owner: &UserId,
    request: &CreateTaskRequest,
) -> Result<NewTask, Vec<FieldError>> {
    let mut violations = Violations::default();

    let title = match &request.title {
        Some(value) => violations.check("title", title(value, TITLE_REQUIRED)),
        None => violations.check::<String>("title", Err(TITLE_REQUIRED)),
    };
    let description = request
        .description
        .as_ref()
        .and_then(|v| violations.check("description", description(v)))
        .flatten();
    let priority = request
        .priority
        .as_ref()
        .and_then(|v| violations.check("priority", priority(v)));
    let due_date = request
        .due_date
        .as_ref()
        .and_then(|v| violations.check("dueDate", due_date(v)))
        .flatten();

    match title {
        Some(title) => violations.finish(NewTask {
            owner: owner.clone(),
            title,
            description,
            priority: priority.unwrap_or_default(),
            due_date,
        }),
        // a missing title was recorded above
        None => Err(violations.0),
    }
}

/// Validate an update body into the set of changes it asks for.
pub fn validate_update(request: &UpdateTaskRequest) -> Result<TaskChanges, Vec<FieldError>> {
    let mut violations = Violations::default();
    let mut changes = TaskChanges::default();

    if let Some(value) = &request.title {
        changes.title = violations.check("title", title(value, TITLE_LENGTH));
    }
    if let Some(value) = &request.description {
        changes.description = violations.check("description", description(value));
    }
    if let Some(value) = &request.status {
        changes.status = violations.check("status", status(value));
    }
    if let Some(value) = &request.priority {
        changes.priority = violations.check("priority", priority(value));
    }
    if let Some(value) = &request.due_date {
        changes.due_date = violations.check("dueDate", due_date(value));
    }

    violations.finish(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create(body: Value) -> Result<NewTask, Vec<FieldError>> {
        let request: CreateTaskRequest = serde_json::from_value(body).unwrap();
        validate_create(&UserId::new("alice"), &request)
    }

    fn update(body: Value) -> Result<TaskChanges, Vec<FieldError>> {
        let request: UpdateTaskRequest = serde_json::from_value(body).unwrap();
        validate_update(&request)
    }

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn create_applies_defaults_and_trims() {
        let task = create(json!({ "title": "  Buy milk  ", "description": "   " })).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, None);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.due_date, None);
        assert_eq!(task.owner, UserId::new("alice"));
    }

    #[test]
    fn create_title_length_boundaries() {
        assert!(create(json!({ "title": "" })).is_err());
        assert!(create(json!({ "title": "   " })).is_err());
        assert!(create(json!({ "title": "a" })).is_ok());
        assert!(create(json!({ "title": "a".repeat(100) })).is_ok());

        let errors = create(json!({ "title": "a".repeat(101) })).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("title", TITLE_REQUIRED)]);
    }

    #[test]
    fn create_counts_characters_not_bytes() {
        assert!(create(json!({ "title": "é".repeat(100) })).is_ok());
        assert!(create(json!({ "title": "t", "description": "ü".repeat(500) })).is_ok());
        assert!(create(json!({ "title": "t", "description": "ü".repeat(501) })).is_err());
    }

    #[test]
    fn create_reports_every_violation_in_field_order() {
        let errors = create(json!({
            "description": "x".repeat(501),
            "priority": "urgent",
            "dueDate": "not a date",
        }))
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["title", "description", "priority", "dueDate"]);
        assert_eq!(errors[2].message, PRIORITY_INVALID);
    }

    #[test]
    fn create_treats_null_as_absent_and_rejects_wrong_types() {
        let task = create(json!({ "title": "t", "priority": null, "dueDate": null })).unwrap();
        assert_eq!(task.priority, Priority::Medium);

        let errors = create(json!({ "title": 42, "priority": 1 })).unwrap_err();
        assert_eq!(fields(&errors), vec!["title", "priority"]);
    }

    #[test]
    fn create_ignores_unknown_fields() {
        let task = create(json!({ "title": "t", "owner": "mallory", "status": "completed" })).unwrap();
        assert_eq!(task.owner, UserId::new("alice"));
    }

    #[test]
    fn update_only_includes_supplied_fields() {
        let changes = update(json!({ "priority": "high" })).unwrap();
        assert_eq!(
            changes,
            TaskChanges {
                priority: Some(Priority::High),
                ..TaskChanges::default()
            }
        );
        assert!(update(json!({})).unwrap().is_empty());
    }

    #[test]
    fn update_null_clears_nullable_fields() {
        let changes = update(json!({ "description": null, "dueDate": null })).unwrap();
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.due_date, Some(None));
    }

    #[test]
    fn update_null_on_required_fields_is_rejected() {
        let errors = update(json!({ "title": null, "status": null, "priority": null })).unwrap_err();
        assert_eq!(fields(&errors), vec!["title", "status", "priority"]);
        assert_eq!(errors[0].message, TITLE_LENGTH);
        assert_eq!(errors[1].message, STATUS_INVALID);
    }

    #[test]
    fn update_accepts_status_and_dates() {
        let changes = update(json!({ "status": "completed", "dueDate": "2025-02-01" })).unwrap();
        assert_eq!(changes.status, Some(TaskStatus::Completed));
        assert!(matches!(changes.due_date, Some(Some(_))));

        let errors = update(json!({ "status": "done", "dueDate": "" })).unwrap_err();
        assert_eq!(fields(&errors), vec!["status", "dueDate"]);
    }
}
