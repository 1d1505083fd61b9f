use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

/// Failure modes of init data verification. Display strings are the
/// user-visible messages shown by the mini app.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("Отсутствует Telegram initData.")]
    MissingPayload,

    #[error("Некорректный Telegram initData: отсутствует hash.")]
    MissingSignature,

    #[error("Некорректная подпись Telegram initData.")]
    BadSignature,

    #[error("Некорректный Telegram initData: неверный auth_date.")]
    BadAuthDate,

    #[error("Сессия Telegram истекла. Откройте мини-приложение заново.")]
    Expired,

    #[error("Некорректный Telegram initData: пользователь не найден.")]
    MissingUser,
}

/// The `user` object embedded in init data. Fields Telegram adds later are
/// preserved in `extra` and echoed back by `/api/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A successfully verified init data payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InitData {
    pub user_id: i64,
    pub user: TelegramUser,
}

/// Verify a Telegram WebApp `initData` string and extract the identity.
///
/// Pure function of its inputs; the caller supplies the clock so expiry is
/// testable. Every request re-runs verification; there is no session cache.
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age_secs: i64,
    now_unix: i64,
) -> Result<InitData, InitDataError> {
    if raw.is_empty() {
        return Err(InitDataError::MissingPayload);
    }

    let mut fields = parse_query_pairs(raw);
    let received_hash = fields.remove("hash").ok_or(InitDataError::MissingSignature)?;

    // Canonical check string: fields sorted by key, joined as k=v lines.
    let check_string = fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n");

    // The signing key is itself an HMAC: the literal "WebAppData" keyed over
    // the bot token, per the WebApp validation scheme.
    let secret_key = hmac_sha256(b"WebAppData", bot_token.as_bytes());
    let expected = hex::encode(hmac_sha256(&secret_key, check_string.as_bytes()));

    let matches: bool = expected.as_bytes().ct_eq(received_hash.as_bytes()).into();
    if !matches {
        return Err(InitDataError::BadSignature);
    }

    let auth_date = fields
        .get("auth_date")
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(InitDataError::BadAuthDate)?;
    if now_unix - auth_date > max_age_secs {
        return Err(InitDataError::Expired);
    }

    let user_json = fields
        .get("user")
        .filter(|v| !v.is_empty())
        .ok_or(InitDataError::MissingUser)?;
    let user: TelegramUser =
        serde_json::from_str(user_json).map_err(|_| InitDataError::MissingUser)?;

    Ok(InitData {
        user_id: user.id,
        user,
    })
}

/// Split a query string into decoded key/value pairs. Later duplicates win;
/// blank values are kept; keys without `=` map to an empty value. The map is
/// ordered by key, which is exactly the check-string order.
fn parse_query_pairs(raw: &str) -> BTreeMap<String, String> {
    raw.split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(segment), String::new()),
        })
        .collect()
}

/// Form-style decoding: `+` means space, then percent-decoding (lossy on
/// invalid UTF-8, like the original backend).
fn decode_component(encoded: &str) -> String {
    let plus_decoded = encoded.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(plus_decoded.as_bytes())).into_owned()
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}
