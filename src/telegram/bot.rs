use crate::telegram::client::{
    KeyboardButton, ReplyKeyboardMarkup, TelegramClient, TelegramError, Update, WebAppInfo,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Server-side long-poll window for getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a transient polling failure before trying again.
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

const START_TEXT: &str = "Откройте мини-приложение кнопкой ниже.";
const APP_TEXT: &str = "Открыть мини-приложение:";
const HELP_TEXT: &str = "Команды:\n\
    /start - показать кнопку мини-приложения\n\
    /app - открыть кнопку мини-приложения\n\
    /help - показать это сообщение";
const BUTTON_TEXT: &str = "Открыть мини-приложение";

/// Long-polling bot that answers chat commands with a button opening the
/// mini app. Everything stateful lives in Telegram; the bot only derives the
/// next poll offset from the updates it has seen.
pub struct CommandBot {
    client: TelegramClient,
    mini_app_url: String,
    public_api_base_url: String,
    cancel: CancellationToken,
}

impl CommandBot {
    pub fn new(
        client: TelegramClient,
        mini_app_url: String,
        public_api_base_url: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            mini_app_url,
            public_api_base_url,
            cancel,
        }
    }

    /// Poll until cancelled. A 409 from Telegram means another process owns
    /// the token, which is unrecoverable, so it cancels the whole service
    /// instead of fighting over updates.
    pub async fn run(self) {
        info!("command bot started");
        let mut offset: Option<i64> = None;
        loop {
            let updates = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.client.get_updates(offset, POLL_TIMEOUT_SECS) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(TelegramError::Conflict) => {
                    error!("another process is polling this bot token, shutting down");
                    self.cancel.cancel();
                    break;
                }
                Err(err) => {
                    warn!(
                        "polling failed, retrying in {}s: {err}",
                        RETRY_BACKOFF.as_secs()
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_BACKOFF) => {}
                    }
                }
            }
        }
        info!("command bot stopped");
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let chat_id = message.chat.id;

        let result = match parse_command(text) {
            Some("start") => {
                self.client
                    .send_message(chat_id, START_TEXT, Some(&self.keyboard()))
                    .await
            }
            Some("app") => {
                self.client
                    .send_message(chat_id, APP_TEXT, Some(&self.keyboard()))
                    .await
            }
            Some("help") => self.client.send_message(chat_id, HELP_TEXT, None).await,
            _ => return,
        };

        if let Err(err) = result {
            warn!(chat_id, "failed to answer command: {err}");
        }
    }

    fn keyboard(&self) -> ReplyKeyboardMarkup {
        ReplyKeyboardMarkup {
            keyboard: vec![vec![KeyboardButton {
                text: BUTTON_TEXT.to_string(),
                web_app: Some(WebAppInfo {
                    url: build_mini_app_url(&self.mini_app_url, &self.public_api_base_url),
                }),
            }]],
            resize_keyboard: true,
        }
    }
}

/// Extract the bare command name from a message, tolerating the @botname
/// suffix and trailing arguments. Non-commands yield None.
fn parse_command(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let command = word.split('@').next()?;
    if command.is_empty() {
        None
    } else {
        Some(command)
    }
}

/// Append the backend address to the mini app link so the frontend knows
/// where to call. An empty address leaves the link untouched.
pub fn build_mini_app_url(base: &str, public_api_base_url: &str) -> String {
    let api_url = public_api_base_url.trim();
    if api_url.is_empty() {
        return base.to_string();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}api={}", urlencoding::encode(api_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parse_command_handles_suffix_and_arguments() {
        assert_eq!(parse_command("/start"), Some("start"));
        assert_eq!(parse_command("/start@tgdailybot"), Some("start"));
        assert_eq!(parse_command("/app и что-то ещё"), Some("app"));
        assert_eq!(parse_command("  /help  "), Some("help"));
        assert_eq!(parse_command("привет"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn mini_app_url_appends_encoded_backend_address() {
        assert_eq!(
            build_mini_app_url("https://example.github.io/app/", ""),
            "https://example.github.io/app/"
        );
        assert_eq!(
            build_mini_app_url("https://example.github.io/app/", "  "),
            "https://example.github.io/app/"
        );
        assert_eq!(
            build_mini_app_url("https://example.github.io/app/", "https://api.example.com/v1"),
            "https://example.github.io/app/?api=https%3A%2F%2Fapi.example.com%2Fv1"
        );
        assert_eq!(
            build_mini_app_url("https://example.github.io/app/?lang=ru", "https://api.example.com"),
            "https://example.github.io/app/?lang=ru&api=https%3A%2F%2Fapi.example.com"
        );
    }

    fn update(chat_id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {"chat": {"id": chat_id}, "text": text}
        }))
        .expect("update")
    }

    async fn bot(server: &MockServer) -> CommandBot {
        CommandBot::new(
            TelegramClient::with_base_url("TEST:TOKEN", &server.uri()).expect("client"),
            "https://example.github.io/app/".to_string(),
            "https://api.example.com".to_string(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn start_command_answers_with_webapp_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 5,
                "text": "Откройте мини-приложение кнопкой ниже.",
                "reply_markup": {
                    "resize_keyboard": true,
                    "keyboard": [[{
                        "text": "Открыть мини-приложение",
                        "web_app": {"url": "https://example.github.io/app/?api=https%3A%2F%2Fapi.example.com"}
                    }]]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        bot(&server).await.handle_update(update(5, "/start")).await;
    }

    #[tokio::test]
    async fn help_command_answers_without_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_partial_json(json!({"chat_id": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        bot(&server).await.handle_update(update(5, "/help")).await;
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(0)
            .mount(&server)
            .await;

        let bot = bot(&server).await;
        bot.handle_update(update(5, "просто текст")).await;
        bot.handle_update(update(5, "/unknown")).await;
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let bot = CommandBot::new(
            TelegramClient::with_base_url("TEST:TOKEN", &server.uri()).expect("client"),
            "https://example.github.io/app/".to_string(),
            String::new(),
            cancel.clone(),
        );
        let handle = tokio::spawn(bot.run());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("bot exits after cancel")
            .expect("bot task does not panic");
    }

    #[tokio::test]
    async fn conflict_cancels_the_shared_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(409).set_body_json(
                json!({"ok": false, "description": "Conflict"}),
            ))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let bot = CommandBot::new(
            TelegramClient::with_base_url("TEST:TOKEN", &server.uri()).expect("client"),
            "https://example.github.io/app/".to_string(),
            String::new(),
            cancel.clone(),
        );
        tokio::time::timeout(Duration::from_secs(2), bot.run())
            .await
            .expect("bot exits on conflict");
        assert!(cancel.is_cancelled());
    }
}
