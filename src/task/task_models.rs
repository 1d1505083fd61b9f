use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Maximum task text length in characters (not bytes).
pub const MAX_TASK_LENGTH: usize = 300;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Task {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub text: String,
    pub is_done: bool,
    /// Reminder instant as unix milliseconds, absent when the task has none.
    pub reminder_at_ms: Option<i64>,
    /// Set once the reminder has been delivered. Internal bookkeeping, never
    /// exposed over the API.
    #[serde(skip_serializing)]
    pub notified_at_ms: Option<i64>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

/// A due reminder joined with the owner's delivery preferences.
#[derive(Debug, Clone, FromRow)]
pub struct DueReminder {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub reminder_at_ms: i64,
    pub timezone: String,
}
