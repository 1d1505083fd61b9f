use crate::notification::Notifier;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Ceiling for a plain Bot API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Slack on top of the long-poll window so the server side closes the
/// request before the client does.
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Another process is long-polling with the same token. Telegram allows
    /// exactly one consumer, so this is not retryable.
    #[error("bot token is already polled by another process (HTTP 409)")]
    Conflict,
    #[error("telegram transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api error: {0}")]
    Api(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

#[derive(Debug, Serialize)]
pub struct WebAppInfo {
    pub url: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Thin Bot API client covering the two methods this service needs,
/// sendMessage and getUpdates.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        Self::with_base_url(token, TELEGRAM_API_BASE)
    }

    /// Point the client at a different server, used by tests.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&ReplyKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest {
                chat_id,
                text,
                reply_markup,
            })
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(TelegramError::Conflict);
        }

        let body: ApiResponse<serde_json::Value> = response.json().await?;
        if !body.ok {
            return Err(TelegramError::Api(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }

    /// Long-poll for updates. Blocks server side up to `timeout_secs`, so
    /// the request timeout is widened beyond the client default.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs) + LONG_POLL_SLACK)
            .json(&GetUpdatesRequest {
                offset,
                timeout: timeout_secs,
            })
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(TelegramError::Conflict);
        }

        let body: ApiResponse<Vec<Update>> = response.json().await?;
        if !body.ok {
            return Err(TelegramError::Api(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(body.result.unwrap_or_default())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, chat_id: i64, text: &str) -> bool {
        match self.send_message(chat_id, text, None).await {
            Ok(()) => true,
            Err(err) => {
                error!(chat_id, "failed to send telegram message: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::with_base_url("TEST:TOKEN", &server.uri()).expect("client")
    }

    #[tokio::test]
    async fn send_message_posts_chat_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_partial_json(json!({"chat_id": 42, "text": "привет"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .send_message(42, "привет", None)
            .await
            .expect("send");
    }

    #[tokio::test]
    async fn send_message_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"ok": false, "description": "Bad Request: chat not found"}),
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .send_message(42, "привет", None)
            .await
            .expect_err("api error");
        assert!(matches!(err, TelegramError::Api(msg) if msg.contains("chat not found")));
    }

    #[tokio::test]
    async fn conflict_status_is_its_own_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(409).set_body_json(
                json!({"ok": false, "description": "Conflict: terminated by other getUpdates request"}),
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_updates(None, 0)
            .await
            .expect_err("conflict");
        assert!(matches!(err, TelegramError::Conflict));
    }

    #[tokio::test]
    async fn get_updates_passes_offset_and_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/getUpdates"))
            .and(body_partial_json(json!({"offset": 7})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 7, "message": {"chat": {"id": 1}, "text": "/start"}},
                    {"update_id": 8, "message": {"chat": {"id": 2}}}
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server).get_updates(Some(7), 0).await.expect("updates");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].update_id, 7);
        assert_eq!(
            updates[0].message.as_ref().and_then(|m| m.text.as_deref()),
            Some("/start")
        );
        assert!(updates[1].message.as_ref().is_some_and(|m| m.text.is_none()));
    }

    #[tokio::test]
    async fn notify_swallows_failures_into_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(!client.notify(1, "текст").await);

        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .mount(&server)
            .await;
        assert!(client.notify(1, "текст").await);
    }
}
