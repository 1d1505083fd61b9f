use crate::settings::settings_models::UserSettings;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `PUT /api/settings`. Absent fields fall back to the documented
/// defaults (default zone, 0 minutes, notifications on) rather than keeping
/// the stored values.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    pub timezone: Option<String>,
    pub notify_before_minutes: Option<i64>,
    pub chat_notifications_enabled: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub ok: bool,
    pub settings: UserSettings,
}
