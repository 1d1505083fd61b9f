use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Per-user preferences, created lazily with defaults on first access.
/// `user_id` is the row key and is never serialized to clients.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserSettings {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub timezone: String,
    pub notify_before_minutes: i64,
    pub chat_notifications_enabled: bool,
}
