use crate::{
    auth::{self, auth_middleware, TelegramUser, INIT_DATA_HEADER},
    error::ErrorResponse,
    settings,
    settings::{SettingsResponse, UpdateSettingsRequest, UserSettings},
    state::AppState,
    task,
    task::{
        CreateTaskRequest, OkResponse, Task, TaskResponse, TasksResponse, UpdateTaskRequest,
    },
};
use anyhow::Context;
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, patch},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        auth::auth_handlers::get_profile,
        task::task_handlers::get_tasks,
        task::task_handlers::create_task,
        task::task_handlers::update_task,
        task::task_handlers::delete_task,
        settings::settings_handlers::get_settings,
        settings::settings_handlers::put_settings,
    ),
    components(
        schemas(
            ErrorResponse,
            OkResponse,
            auth::auth_dto::ProfileResponse,
            TelegramUser,
            Task,
            CreateTaskRequest,
            UpdateTaskRequest,
            TaskResponse,
            TasksResponse,
            UserSettings,
            UpdateSettingsRequest,
            SettingsResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness probe"),
        (name = "profile", description = "Authenticated Telegram identity"),
        (name = "tasks", description = "Task management endpoints"),
        (name = "settings", description = "Per-user notification preferences")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "init_data",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Telegram-Init-Data"),
                    ),
                ),
            )
        }
    }
}

/// Liveness probe, stays open so the frontend can detect the backend
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = OkResponse)),
    tag = "health"
)]
async fn health() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

pub fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = {
        let base = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(INIT_DATA_HEADER)]);
        match state.config.allowed_origin.as_str() {
            "*" => base.allow_origin(Any),
            origin => base.allow_origin(
                HeaderValue::from_str(origin)
                    .context("API_ALLOWED_ORIGIN is not a valid header value")?,
            ),
        }
    };

    // Everything except the health probe requires verified init data.
    let protected = Router::new()
        .route("/profile", get(auth::auth_handlers::get_profile))
        .route("/tasks", get(task::get_tasks).post(task::create_task))
        .route("/tasks/:id", patch(task::update_task).delete(task::delete_task))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::put_settings),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new().route("/health", get(health)).merge(protected);

    Ok(Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
