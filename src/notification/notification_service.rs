use crate::{
    error::{AppError, Result},
    notification::notifier::Notifier,
    task::TaskRepository,
    timezone::TimezoneTable,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Polling more often than this hammers the database for no benefit.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Cap on a single delivery attempt so one stuck send cannot stall the
/// whole cycle.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(20);

/// Background loop that turns due reminders into chat messages.
///
/// Delivery is at-least-once: a task is marked delivered only after the
/// notifier confirms success, so a crash between send and mark repeats the
/// message rather than losing it.
pub struct ReminderService {
    tasks: TaskRepository,
    notifier: Arc<dyn Notifier>,
    zones: TimezoneTable,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl ReminderService {
    pub fn new(
        tasks: TaskRepository,
        notifier: Arc<dyn Notifier>,
        zones: TimezoneTable,
        poll_secs: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tasks,
            notifier,
            zones,
            poll_interval: Duration::from_secs(poll_secs).max(MIN_POLL_INTERVAL),
            cancel,
        }
    }

    /// Poll until cancelled. A cycle runs immediately on startup so
    /// reminders that came due while the process was down go out without
    /// waiting a full interval.
    pub async fn run(self) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "reminder service started"
        );
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let now_ms = chrono::Utc::now().timestamp_millis();
            if let Err(err) = self.run_cycle(now_ms).await {
                if is_fatal(&err) {
                    error!("reminder service lost its database, shutting down: {err}");
                    return;
                }
                warn!("reminder cycle failed, retrying next interval: {err}");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!("reminder service stopped");
    }

    /// One poll cycle: fetch everything due at `now_ms` and deliver each in
    /// reminder order. Failures are per task, one bad chat does not block
    /// the rest of the batch.
    async fn run_cycle(&self, now_ms: i64) -> Result<()> {
        let due = self.tasks.find_due_reminders(now_ms).await?;
        if due.is_empty() {
            return Ok(());
        }
        debug!(count = due.len(), "delivering due reminders");

        for reminder in due {
            if self.cancel.is_cancelled() {
                break;
            }

            let zone = self.zones.canonicalize(&reminder.timezone);
            let date_text = self.zones.format_ms(reminder.reminder_at_ms, zone);
            let message = format!(
                "Напоминание о задаче\n\nЗадача: {}\nДата: {} ({})",
                reminder.text, date_text, zone
            );

            let sent = match tokio::time::timeout(
                NOTIFY_TIMEOUT,
                self.notifier.notify(reminder.user_id, &message),
            )
            .await
            {
                Ok(sent) => sent,
                Err(_) => {
                    warn!(task_id = reminder.id, "reminder delivery timed out");
                    false
                }
            };

            if sent {
                self.tasks.mark_notified(reminder.id, now_ms).await?;
                debug!(task_id = reminder.id, user_id = reminder.user_id, "reminder delivered");
            }
        }
        Ok(())
    }
}

/// A closed pool means shutdown is underway; retrying cycles is pointless.
fn is_fatal(err: &AppError) -> bool {
    matches!(err, AppError::Database(sqlx::Error::PoolClosed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Notifier that answers from a script, recording successful sends.
    /// An exhausted script answers true.
    #[derive(Default)]
    struct ScriptedNotifier {
        script: Mutex<VecDeque<bool>>,
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl ScriptedNotifier {
        fn failing_first(failures: usize) -> Self {
            let notifier = Self::default();
            notifier
                .script
                .lock()
                .unwrap()
                .extend(std::iter::repeat(false).take(failures));
            notifier
        }

        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn notify(&self, chat_id: i64, text: &str) -> bool {
            let ok = self.script.lock().unwrap().pop_front().unwrap_or(true);
            if ok {
                self.sent.lock().unwrap().push((chat_id, text.to_string()));
            }
            ok
        }
    }

    /// Notifier that never answers, for exercising the delivery timeout.
    struct StuckNotifier;

    #[async_trait]
    impl Notifier for StuckNotifier {
        async fn notify(&self, _chat_id: i64, _text: &str) -> bool {
            std::future::pending().await
        }
    }

    async fn service_with(notifier: Arc<dyn Notifier>) -> (ReminderService, TaskRepository) {
        let tasks = TaskRepository::new(memory_pool().await);
        let service = ReminderService::new(
            tasks.clone(),
            notifier,
            TimezoneTable::russian(),
            20,
            CancellationToken::new(),
        );
        (service, tasks)
    }

    #[tokio::test]
    async fn failed_delivery_keeps_task_due() {
        let notifier = Arc::new(ScriptedNotifier::failing_first(1));
        let (service, tasks) = service_with(notifier.clone()).await;
        tasks.create(1, "позвонить маме", Some(500)).await.expect("create");

        service.run_cycle(1000).await.expect("cycle");
        assert!(notifier.sent().is_empty());
        assert_eq!(tasks.find_due_reminders(1000).await.expect("due").len(), 1);

        service.run_cycle(1000).await.expect("cycle");
        assert_eq!(notifier.sent().len(), 1);
        assert!(tasks.find_due_reminders(1000).await.expect("due").is_empty());
    }

    #[tokio::test]
    async fn one_failing_chat_does_not_block_the_batch() {
        let notifier = Arc::new(ScriptedNotifier::failing_first(1));
        let (service, tasks) = service_with(notifier.clone()).await;
        // Older reminder first in the batch, and it is the one that fails.
        tasks.create(1, "первая", Some(100)).await.expect("create");
        tasks.create(2, "вторая", Some(200)).await.expect("create");

        service.run_cycle(1000).await.expect("cycle");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 2);
        let still_due = tasks.find_due_reminders(1000).await.expect("due");
        assert_eq!(still_due.len(), 1);
        assert_eq!(still_due[0].user_id, 1);
    }

    #[tokio::test]
    async fn message_carries_local_time_and_zone() {
        let notifier = Arc::new(ScriptedNotifier::default());
        let (service, tasks) = service_with(notifier.clone()).await;
        // 2024-03-01 12:00:00 UTC is 15:00 in Moscow.
        tasks
            .create(1, "встреча", Some(1_709_294_400_000))
            .await
            .expect("create");

        service.run_cycle(1_709_294_400_000).await.expect("cycle");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            "Напоминание о задаче\n\nЗадача: встреча\nДата: 01.03.2024 15:00 (Europe/Moscow)"
        );
    }

    #[tokio::test]
    async fn stuck_delivery_times_out_and_stays_due() {
        let (service, tasks) = service_with(Arc::new(StuckNotifier)).await;
        tasks.create(1, "висит", Some(500)).await.expect("create");

        // Pause the clock only around the cycle so the notify timeout elapses
        // virtually. The pool pings SQLite's worker thread (a plain OS thread)
        // on acquire/release, and under a paused clock auto-advance trips the
        // pool's acquire timeout before that thread can answer, so give the
        // pool real time to settle on either side.
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::time::pause();
        service.run_cycle(1000).await.expect("cycle");
        tokio::time::resume();
        assert_eq!(tasks.find_due_reminders(1000).await.expect("due").len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let tasks = TaskRepository::new(memory_pool().await);
        let cancel = CancellationToken::new();
        let service = ReminderService::new(
            tasks,
            Arc::new(ScriptedNotifier::default()),
            TimezoneTable::russian(),
            20,
            cancel.clone(),
        );

        let handle = tokio::spawn(service.run());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("service exits after cancel")
            .expect("service task does not panic");
    }
}
