use crate::{
    error::Result,
    task::{
        task_dto::TaskChanges,
        task_models::{DueReminder, Task},
    },
};
use sqlx::SqlitePool;

/// Ceiling on how many due reminders one poll cycle picks up. Leftovers are
/// caught by the next cycle because delivered rows stop matching the query.
pub const REMINDER_BATCH_LIMIT: i64 = 200;

/// Open tasks without a reminder sort after every real reminder. The
/// sentinel is 3000-01-01 in unix milliseconds.
const NO_REMINDER_SENTINEL: i64 = 32_503_680_000_000;

const TASK_COLUMNS: &str = "id, user_id, text, is_done, reminder_at_ms, notified_at_ms, created_at";

#[derive(Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
}

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All tasks of one user. Open tasks come first, then by reminder time
    /// ascending with reminder-less tasks last, ties by id.
    pub async fn list(&self, user_id: i64) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks
             WHERE user_id = ?
             ORDER BY is_done ASC, COALESCE(reminder_at_ms, {NO_REMINDER_SENTINEL}) ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn create(
        &self,
        user_id: i64,
        text: &str,
        reminder_at_ms: Option<i64>,
    ) -> Result<Task> {
        // The reminder query joins user_settings, so every task owner must
        // have a settings row. Column defaults supply the initial values.
        sqlx::query("INSERT OR IGNORE INTO user_settings (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (user_id, text, is_done, reminder_at_ms, notified_at_ms)
             VALUES (?, ?, 0, ?, NULL)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(user_id)
        .bind(text)
        .bind(reminder_at_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    /// Apply a change set to one task. Returns false when nothing changed,
    /// either because the set was empty or because no owned row matched.
    /// Changing the reminder re-arms it by clearing the delivered mark.
    pub async fn update(&self, user_id: i64, task_id: i64, changes: &TaskChanges) -> Result<bool> {
        let mut sets: Vec<&str> = Vec::new();
        if changes.text.is_some() {
            sets.push("text = ?");
        }
        if changes.is_done.is_some() {
            sets.push("is_done = ?");
        }
        if changes.reminder_at_ms.is_some() {
            sets.push("reminder_at_ms = ?");
            sets.push("notified_at_ms = NULL");
        }
        if sets.is_empty() {
            return Ok(false);
        }

        let query = format!(
            "UPDATE tasks SET {} WHERE user_id = ? AND id = ?",
            sets.join(", ")
        );
        let mut db_query = sqlx::query(&query);
        if let Some(text) = changes.text.as_deref() {
            db_query = db_query.bind(text);
        }
        if let Some(is_done) = changes.is_done {
            db_query = db_query.bind(is_done);
        }
        if let Some(reminder_at_ms) = changes.reminder_at_ms {
            db_query = db_query.bind(reminder_at_ms);
        }

        let result = db_query
            .bind(user_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, user_id: i64, task_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reminders ready for delivery at `now_ms`: open, armed, not yet
    /// delivered, owner has chat notifications on, and the lead-shifted
    /// instant has passed. Oldest first, capped per cycle.
    pub async fn find_due_reminders(&self, now_ms: i64) -> Result<Vec<DueReminder>> {
        let due = sqlx::query_as::<_, DueReminder>(
            "SELECT t.id, t.user_id, t.text, t.reminder_at_ms, s.timezone
             FROM tasks t
             JOIN user_settings s ON s.user_id = t.user_id
             WHERE t.is_done = 0
               AND t.reminder_at_ms IS NOT NULL
               AND t.notified_at_ms IS NULL
               AND s.chat_notifications_enabled = 1
               AND (t.reminder_at_ms - (s.notify_before_minutes * 60000)) <= ?
             ORDER BY t.reminder_at_ms ASC
             LIMIT ?",
        )
        .bind(now_ms)
        .bind(REMINDER_BATCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(due)
    }

    pub async fn mark_notified(&self, task_id: i64, notified_at_ms: i64) -> Result<()> {
        sqlx::query("UPDATE tasks SET notified_at_ms = ? WHERE id = ?")
            .bind(notified_at_ms)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
