use async_trait::async_trait;

/// Delivery sink for reminder messages. Returns whether the message reached
/// the recipient; a false answer leaves the reminder due, so delivery is
/// retried on a later cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: i64, text: &str) -> bool;
}
