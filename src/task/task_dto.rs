use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, Result},
    task::task_models::{Task, MAX_TASK_LENGTH},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub text: String,
    pub reminder_at_ms: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub text: Option<String>,
    pub is_done: Option<bool>,
    /// `None` when the field was absent, `Some(None)` when it was an explicit
    /// JSON null clearing the reminder.
    #[serde(default, deserialize_with = "nullable_field")]
    #[schema(value_type = Option<i64>, nullable)]
    pub reminder_at_ms: Option<Option<i64>>,
}

fn nullable_field<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// Validated set of task fields to change. Absent fields stay untouched.
#[derive(Debug, Default)]
pub struct TaskChanges {
    pub text: Option<String>,
    pub is_done: Option<bool>,
    pub reminder_at_ms: Option<Option<i64>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.is_done.is_none() && self.reminder_at_ms.is_none()
    }
}

impl UpdateTaskRequest {
    pub fn into_changes(self) -> Result<TaskChanges> {
        Ok(TaskChanges {
            text: self.text.as_deref().map(normalize_text).transpose()?,
            is_done: self.is_done,
            reminder_at_ms: self.reminder_at_ms.map(normalize_reminder).transpose()?,
        })
    }
}

/// Trim and bound the task text. Length is counted in characters, not bytes,
/// so cyrillic text is measured the same as ascii.
pub fn normalize_text(value: &str) -> Result<String> {
    let text = value.trim();
    if text.is_empty() {
        return Err(AppError::Validation(
            "Текст задачи не может быть пустым.".to_string(),
        ));
    }
    if text.chars().count() > MAX_TASK_LENGTH {
        return Err(AppError::Validation(format!(
            "Задача слишком длинная. Максимум {MAX_TASK_LENGTH} символов."
        )));
    }
    Ok(text.to_string())
}

/// A reminder must be a positive unix-millisecond timestamp; null clears it.
pub fn normalize_reminder(value: Option<i64>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(ms) if ms <= 0 => Err(AppError::Validation(
            "Некорректная дата напоминания.".to_string(),
        )),
        Some(ms) => Ok(Some(ms)),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub ok: bool,
    pub task: Task,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TasksResponse {
    pub ok: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}
