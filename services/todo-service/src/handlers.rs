use crate::app::AppState;
use crate::error::ApiError;
use crate::store::Todo;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::{counter, histogram};
use serde::Deserialize;
use tokio::time::Instant;

#[derive(Debug, Deserialize)]
pub struct NewTodo {
    pub task: String,
}

/// Body of `PUT /todos/{id}`. Other todo fields may be sent and are ignored.
#[derive(Debug, Deserialize)]
pub struct TodoUpdate {
    #[serde(default)]
    pub completed: bool,
}

pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = state.store.list().await.map_err(|e| state.api_error(e))?;
    Ok(Json(todos))
}

pub async fn add_todo(
    State(state): State<AppState>,
    body: Result<Json<NewTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let Json(new) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let task = new.task.trim();
    if task.is_empty() {
        return Err(ApiError::Validation("task must not be empty".into()));
    }

    let todo = state
        .store
        .add(task.to_string())
        .await
        .map_err(|e| state.api_error(e))?;

    tracing::info!(id = todo.id, "todo added");
    counter!("todos_added_total").increment(1);
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TodoUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    state
        .store
        .set_completed(id, update.completed)
        .await
        .map_err(|e| state.api_error(e))?;

    tracing::info!(id, completed = update.completed, "todo updated");
    counter!("todos_updated_total").increment(1);
    Ok(StatusCode::OK)
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete(id).await.map_err(|e| state.api_error(e))?;

    tracing::info!(id, "todo deleted");
    counter!("todos_deleted_total").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

/// 200 when the primary answers. A failing replica is only logged.
pub async fn healthz(State(state): State<AppState>) -> Response {
    let report = state.store.health().await;
    if report.is_healthy() {
        return (StatusCode::OK, "OK").into_response();
    }

    let message = match report.primary_error {
        Some(error) if state.expose_errors => format!("Database connection failed: {error}"),
        _ => "Database connection failed".to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Counts every request and times it, by path, method and status.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let path = metric_path(request.uri().path());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let code = response.status().as_u16().to_string();
    counter!("http_requests_total", "path" => path.clone(), "method" => method.clone(), "code" => code)
        .increment(1);
    histogram!("http_request_duration_seconds", "path" => path, "method" => method)
        .record(started.elapsed().as_secs_f64());
    response
}

/// Collapses `/todos/{id}` so ids do not become label values.
pub fn metric_path(path: &str) -> String {
    match path.strip_prefix("/todos/") {
        Some(rest) if !rest.is_empty() => "/todos/:id".to_string(),
        _ => path.to_string(),
    }
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation("Invalid todo ID".into()))
}
