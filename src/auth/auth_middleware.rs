use crate::{
    auth::init_data::{verify_init_data, TelegramUser},
    error::AppError,
    state::AppState,
};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

/// Header the mini app sends the raw init data in (lowercase for CORS use).
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// The verified identity a request carries past the auth layer.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub user: TelegramUser,
}

/// Re-verifies the init data signature on every request and stores the
/// resulting identity as a request extension. No session state is kept.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let raw = req
        .headers()
        .get(INIT_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .trim();

    let verified = verify_init_data(
        raw,
        &state.config.bot_token,
        state.config.init_data_max_age_secs,
        Utc::now().timestamp(),
    )
    .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    req.extensions_mut().insert(CurrentUser {
        id: verified.user_id,
        user: verified.user,
    });

    Ok(next.run(req).await)
}
