use crate::{settings::SettingsRepository, task::TaskRepository};
use anyhow::{bail, Context};
use axum::http::HeaderValue;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings_repository: SettingsRepository,
    pub task_repository: TaskRepository,
}

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub db_path: String,
    pub host: String,
    pub port: u16,
    /// Exact CORS origin, or "*" to allow any.
    pub allowed_origin: String,
    /// Backend address handed to the mini app frontend, may be empty.
    pub public_api_base_url: String,
    pub mini_app_url: String,
    pub init_data_max_age_secs: i64,
    pub reminder_poll_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let allowed_origin = env_or("API_ALLOWED_ORIGIN", "https://amnyam666.github.io");
        if allowed_origin != "*" {
            HeaderValue::from_str(&allowed_origin)
                .context("API_ALLOWED_ORIGIN is not a valid header value")?;
        }

        Ok(Self {
            bot_token: load_bot_token()?,
            db_path: env_or("TODO_DB_PATH", "todo.sqlite3"),
            host: env_or("WEB_SERVER_HOST", "0.0.0.0"),
            port: env_or("WEB_SERVER_PORT", "8080")
                .parse()
                .context("WEB_SERVER_PORT must be a port number")?,
            allowed_origin,
            public_api_base_url: env_or("PUBLIC_API_BASE_URL", ""),
            mini_app_url: env_or("MINI_APP_URL", "https://amnyam666.github.io/tgdailybot/"),
            init_data_max_age_secs: env_or("INIT_DATA_MAX_AGE_SECONDS", "86400")
                .parse()
                .context("INIT_DATA_MAX_AGE_SECONDS must be a number of seconds")?,
            reminder_poll_secs: env_or("REMINDER_POLL_SECONDS", "20")
                .parse()
                .context("REMINDER_POLL_SECONDS must be a number of seconds")?,
        })
    }

    #[cfg(test)]
    pub fn for_tests(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            db_path: ":memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origin: "*".to_string(),
            public_api_base_url: String::new(),
            mini_app_url: "https://example.github.io/app/".to_string(),
            init_data_max_age_secs: 86_400,
            reminder_poll_secs: 20,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// The token comes from the environment or from a token file, in that
/// order. The file route matches how the bot is deployed next to its
/// `bot_token.txt`.
fn load_bot_token() -> anyhow::Result<String> {
    if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
        let token = token.trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let path = env_or("TELEGRAM_BOT_TOKEN_FILE", "bot_token.txt");
    let token = std::fs::read_to_string(&path)
        .with_context(|| format!("bot token file not found: {path}"))?
        .trim()
        .to_string();
    if token.is_empty() || token == "PASTE_YOUR_BOT_TOKEN_HERE" {
        bail!("bot token file {path} holds no real token, put the token from @BotFather there");
    }
    Ok(token)
}
