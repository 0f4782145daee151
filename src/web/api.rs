//! JSON REST API handlers.
//!
//! All task resources are scoped to the session user; a task owned by
//! someone else (or soft-deleted) is indistinguishable from a missing one.

use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use super::auth;
use super::server::AppState;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    HistoryFilter, NewTask, Task, TaskFilter, TaskPatch, TaskStatus, TaskStatusChange, User,
};

/// Owner details embedded in task payloads.
#[derive(Debug, Serialize)]
pub struct OwnerPayload {
    pub username: String,
    pub email: String,
}

/// Wire shape of a task.
#[derive(Debug, Serialize)]
pub struct TaskPayload {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub priority: i32,
    pub completed: bool,
    pub status: TaskStatus,
    pub user: OwnerPayload,
    pub created_date: i64,
}

fn task_payload(task: Task, user: &User) -> TaskPayload {
    TaskPayload {
        id: task.id,
        title: task.title,
        description: task.description,
        priority: task.priority,
        completed: task.completed,
        status: task.status,
        user: OwnerPayload {
            username: user.username.clone(),
            email: user.email.clone(),
        },
        created_date: task.created_date,
    }
}

fn parse_status_param(value: Option<&str>, field: &str) -> ApiResult<Option<TaskStatus>> {
    match value {
        None | Some("") => Ok(None),
        Some(s) => TaskStatus::from_str(s)
            .map(Some)
            .ok_or_else(|| ApiError::invalid_value(field, &format!("unknown status: {}", s))),
    }
}

fn parse_bool_param(value: Option<&str>, field: &str) -> ApiResult<Option<bool>> {
    match value {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(s) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(s) => Err(ApiError::invalid_value(
            field,
            &format!("expected true or false, got: {}", s),
        )),
    }
}

/// Health check response.
#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Query parameters for the task list.
#[derive(Debug, Deserialize)]
pub(crate) struct TaskListParams {
    title: Option<String>,
    status: Option<String>,
    completed: Option<String>,
}

pub(crate) async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TaskListParams>,
) -> ApiResult<Json<Vec<TaskPayload>>> {
    let user = auth::api_user(&state, &headers)?;

    let filter = TaskFilter {
        title: params.title.filter(|t| !t.is_empty()),
        status: parse_status_param(params.status.as_deref(), "status")?,
        completed: parse_bool_param(params.completed.as_deref(), "completed")?,
    };

    let tasks = state.db.list_tasks(user.id, &filter)?;
    let payloads = tasks
        .into_iter()
        .map(|t| task_payload(t, &user))
        .collect();

    Ok(Json(payloads))
}

pub(crate) async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<TaskPayload>)> {
    let user = auth::api_user(&state, &headers)?;

    let task = state.db.create_task(user.id, input)?;

    Ok((StatusCode::CREATED, Json(task_payload(task, &user))))
}

pub(crate) async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<TaskPayload>> {
    let user = auth::api_user(&state, &headers)?;

    let task = state
        .db
        .get_task(user.id, task_id)?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;

    Ok(Json(task_payload(task, &user)))
}

pub(crate) async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<TaskPayload>> {
    let user = auth::api_user(&state, &headers)?;

    // API updates record status transitions in the history log.
    let task = state
        .db
        .update_task(user.id, task_id, patch, true)?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;

    Ok(Json(task_payload(task, &user)))
}

pub(crate) async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user = auth::api_user(&state, &headers)?;

    // API deletion is physical removal, unlike the UI's soft delete.
    if state.db.delete_task(user.id, task_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::task_not_found(task_id))
    }
}

pub(crate) async fn task_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<TaskStatusChange>>> {
    let user = auth::api_user(&state, &headers)?;

    // 404 for a missing/deleted/foreign task rather than an empty list.
    state
        .db
        .get_task(user.id, task_id)?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;

    let changes = state.db.task_history(user.id, task_id)?;
    Ok(Json(changes))
}

/// Query parameters for the account-wide history list.
#[derive(Debug, Deserialize)]
pub(crate) struct HistoryListParams {
    /// Millisecond timestamp; only changes at or after this instant.
    changed_since: Option<i64>,
    original_status: Option<String>,
    updated_status: Option<String>,
}

pub(crate) async fn list_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HistoryListParams>,
) -> ApiResult<Json<Vec<TaskStatusChange>>> {
    let user = auth::api_user(&state, &headers)?;

    let filter = HistoryFilter {
        changed_since: params.changed_since,
        original_status: parse_status_param(params.original_status.as_deref(), "original_status")?,
        updated_status: parse_status_param(params.updated_status.as_deref(), "updated_status")?,
    };

    let changes = state.db.list_history(user.id, &filter)?;
    Ok(Json(changes))
}
