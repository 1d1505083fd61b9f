use crate::auth::{auth_dto::ProfileResponse, auth_middleware::CurrentUser};
use axum::{Extension, Json};

/// Echo the authenticated Telegram user back to the mini app.
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Authenticated user", body = ProfileResponse),
        (status = 401, description = "Missing or invalid init data", body = crate::error::ErrorResponse)
    ),
    tag = "profile",
    security(("init_data" = []))
)]
pub async fn get_profile(Extension(current): Extension<CurrentUser>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        ok: true,
        user: current.user,
    })
}
