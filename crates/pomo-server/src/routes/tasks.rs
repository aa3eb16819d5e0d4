use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use pomo_core::task::{Cleared, NewTask, Task, TaskUpdate};
use pomo_core::{Listing, OwnerId};

use crate::error::AppError;
use crate::state::{AppState, ChangeKind};

/// GET /api/v1/tasks: the caller's tasks in creation order.
pub async fn list_tasks(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<Listing<Task>>, AppError> {
    let store = app.store.clone();
    let tasks = tokio::task::spawn_blocking(move || store.list_tasks(&owner))
        .await
        .map_err(AppError::join)??;
    Ok(Json(Listing::from(tasks)))
}

/// POST /api/v1/tasks: create a task.
pub async fn add_task(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let Json(body) = body?;
    let store = app.store.clone();
    let who = owner.clone();
    let task = tokio::task::spawn_blocking(move || store.add_task(&who, &body.description))
        .await
        .map_err(AppError::join)??;
    app.notify(&owner, ChangeKind::Tasks);
    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /api/v1/tasks/{id}: set the completion flag.
pub async fn set_task_completion(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<String>,
    body: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let Json(body) = body?;
    let store = app.store.clone();
    let who = owner.clone();
    let task = tokio::task::spawn_blocking(move || {
        store.set_task_completion(&who, &id, body.is_completed)
    })
    .await
    .map_err(AppError::join)??;
    app.notify(&owner, ChangeKind::Tasks);
    Ok(Json(task))
}

/// DELETE /api/v1/tasks/completed: remove the caller's completed tasks.
pub async fn delete_completed_tasks(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<Cleared>, AppError> {
    let store = app.store.clone();
    let who = owner.clone();
    let deleted = tokio::task::spawn_blocking(move || store.delete_completed_tasks(&who))
        .await
        .map_err(AppError::join)??;
    if deleted > 0 {
        app.notify(&owner, ChangeKind::Tasks);
    }
    Ok(Json(Cleared { deleted }))
}
