use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    auth::CurrentUser,
    error::{AppError, ErrorResponse, Result},
    state::AppState,
};

use super::task_dto::{
    normalize_reminder, normalize_text, CreateTaskRequest, OkResponse, TaskResponse,
    TasksResponse, UpdateTaskRequest,
};

/// Get all tasks of the authenticated user
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "Tasks in display order", body = TasksResponse),
        (status = 401, description = "Missing or invalid session payload", body = ErrorResponse)
    ),
    security(("init_data" = [])),
    tag = "tasks"
)]
pub async fn get_tasks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<TasksResponse>> {
    let tasks = state.task_repository.list(current.id).await?;
    Ok(Json(TasksResponse { ok: true, tasks }))
}

/// Create a task, optionally with a reminder
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Created task", body = TaskResponse),
        (status = 400, description = "Invalid text or reminder", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session payload", body = ErrorResponse)
    ),
    security(("init_data" = [])),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Option<Json<CreateTaskRequest>>,
) -> Result<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let text = normalize_text(&body.text)?;
    let reminder_at_ms = normalize_reminder(body.reminder_at_ms)?;

    let task = state
        .task_repository
        .create(current.id, &text, reminder_at_ms)
        .await?;
    Ok((StatusCode::CREATED, Json(TaskResponse { ok: true, task })))
}

/// Partially update a task. A null reminder clears it.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = OkResponse),
        (status = 400, description = "Invalid text or reminder", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session payload", body = ErrorResponse),
        (status = 404, description = "No owned task matched or nothing to change", body = ErrorResponse)
    ),
    security(("init_data" = [])),
    tag = "tasks"
)]
pub async fn update_task(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    body: Option<Json<UpdateTaskRequest>>,
) -> Result<Json<OkResponse>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let changes = body.into_changes()?;

    let updated = state
        .task_repository
        .update(current.id, task_id, &changes)
        .await?;
    if !updated {
        return Err(AppError::NotFound(
            "Задача не найдена или данные не изменены.".to_string(),
        ));
    }
    Ok(Json(OkResponse { ok: true }))
}

/// Delete a task
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = OkResponse),
        (status = 401, description = "Missing or invalid session payload", body = ErrorResponse),
        (status = 404, description = "No owned task matched", body = ErrorResponse)
    ),
    security(("init_data" = [])),
    tag = "tasks"
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
) -> Result<Json<OkResponse>> {
    let deleted = state.task_repository.delete(current.id, task_id).await?;
    if !deleted {
        return Err(AppError::NotFound("Задача не найдена.".to_string()));
    }
    Ok(Json(OkResponse { ok: true }))
}
