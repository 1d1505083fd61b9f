use crate::{
    auth::CurrentUser,
    error::{ErrorResponse, Result},
    settings::settings_dto::{SettingsResponse, UpdateSettingsRequest},
    state::AppState,
    timezone::DEFAULT_TIMEZONE,
};
use axum::{extract::State, Extension, Json};

/// Get current user's settings, creating defaults on first access
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsResponse),
        (status = 401, description = "Missing or invalid session payload", body = ErrorResponse)
    ),
    security(("init_data" = [])),
    tag = "settings"
)]
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<SettingsResponse>> {
    let settings = state.settings_repository.get_or_create(current.id).await?;
    Ok(Json(SettingsResponse { ok: true, settings }))
}

/// Replace current user's settings. Absent fields fall back to defaults.
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Stored settings after coercion", body = SettingsResponse),
        (status = 401, description = "Missing or invalid session payload", body = ErrorResponse)
    ),
    security(("init_data" = [])),
    tag = "settings"
)]
pub async fn put_settings(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Option<Json<UpdateSettingsRequest>>,
) -> Result<Json<SettingsResponse>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let timezone = body
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let minutes = body.notify_before_minutes.unwrap_or(0);
    let enabled = body.chat_notifications_enabled.unwrap_or(true);

    let settings = state
        .settings_repository
        .update(current.id, &timezone, minutes, enabled)
        .await?;
    Ok(Json(SettingsResponse { ok: true, settings }))
}
