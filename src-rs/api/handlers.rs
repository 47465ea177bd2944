use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::RegistryError;
use crate::jobs::JobRunner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<JobRunner>,
    pub token: Option<Arc<str>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TasksQuery {
    pub limit: Option<usize>,
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_tasks(
    State(state): State<AppState>,
    Query(query): Query<TasksQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(10);
    Json(json!({"tasks": state.runner.store().list(limit)}))
}

pub async fn handle_get_task(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    match state.runner.store().get(&task_id) {
        Some(task) => Json(task).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "task not found"),
    }
}

pub async fn handle_submit(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };

    match state.runner.submit(&kind, payload) {
        Ok(task) => {
            debug!(task_id = %task.task_id, kind = %kind, "job accepted");
            (StatusCode::ACCEPTED, Json(json!({"taskId": task.task_id}))).into_response()
        }
        Err(err @ RegistryError::Unknown(_)) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

/// Rejects requests without the configured bearer token; open when none is configured.
pub async fn require_token<B>(State(state): State<AppState>, request: Request<B>, next: Next<B>) -> Response {
    let Some(expected) = state.token.as_deref() else {
        return next.run(request).await;
    };
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);
    if authorized {
        next.run(request).await
    } else {
        error_response(StatusCode::UNAUTHORIZED, "unauthorized")
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
