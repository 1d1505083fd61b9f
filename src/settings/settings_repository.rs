use crate::{error::Result, settings::settings_models::UserSettings, timezone::TimezoneTable};
use sqlx::SqlitePool;

/// Storage for per-user preferences. Every read and write coerces the
/// timezone through the allow-list table, so an invalid zone never reaches a
/// caller and never survives an upsert.
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
    zones: TimezoneTable,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool, zones: TimezoneTable) -> Self {
        Self { pool, zones }
    }

    /// Fetch the user's settings, inserting defaults on first access.
    /// Idempotent under concurrent callers: the insert is `OR IGNORE`.
    pub async fn get_or_create(&self, user_id: i64) -> Result<UserSettings> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_settings
                 (user_id, timezone, notify_before_minutes, chat_notifications_enabled)
             VALUES (?, ?, 0, 1)",
        )
        .bind(user_id)
        .bind(self.zones.default_zone())
        .execute(&self.pool)
        .await?;

        let mut settings = sqlx::query_as::<_, UserSettings>(
            "SELECT user_id, timezone, notify_before_minutes, chat_notifications_enabled
             FROM user_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        settings.timezone = self.zones.canonicalize(&settings.timezone).to_string();
        Ok(settings)
    }

    /// Coerce the zone, clamp the lead minutes to [0, 120], upsert, and
    /// return the stored row.
    pub async fn update(
        &self,
        user_id: i64,
        timezone: &str,
        notify_before_minutes: i64,
        chat_notifications_enabled: bool,
    ) -> Result<UserSettings> {
        let zone = self.zones.canonicalize(timezone);
        let minutes = notify_before_minutes.clamp(0, 120);

        sqlx::query(
            "INSERT INTO user_settings
                 (user_id, timezone, notify_before_minutes, chat_notifications_enabled)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 timezone = excluded.timezone,
                 notify_before_minutes = excluded.notify_before_minutes,
                 chat_notifications_enabled = excluded.chat_notifications_enabled",
        )
        .bind(user_id)
        .bind(zone)
        .bind(minutes)
        .bind(chat_notifications_enabled)
        .execute(&self.pool)
        .await?;

        self.get_or_create(user_id).await
    }
}
