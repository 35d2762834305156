use axum::extract::path::ErrorKind;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::domain::user::{Actor, Principal};
use crate::http::AppError;
use crate::AppState;

pub mod admin;
pub mod comments;
pub mod follow;
pub mod groups;
pub mod jwt;
pub mod posts;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.db.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "database ping failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

/// Unwraps path ids. Segments that do not parse as ids never match a
/// resource, so they answer 404.
pub(crate) fn path_ids<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    match path {
        Ok(Path(ids)) => Ok(ids),
        Err(PathRejection::FailedToDeserializePathParams(err)) => match err.kind() {
            ErrorKind::ParseErrorAtKey { .. }
            | ErrorKind::ParseErrorAtIndex { .. }
            | ErrorKind::ParseError { .. } => Err(AppError::not_found()),
            _ => {
                tracing::error!(error = %err, "unexpected path parameters");
                Err(AppError::internal("failed to read path"))
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "missing path parameters");
            Err(AppError::internal("failed to read path"))
        }
    }
}

/// The acting user once a write has been authorized.
pub(crate) fn acting(principal: &Principal) -> Result<&Actor, AppError> {
    principal.actor().ok_or_else(AppError::not_authenticated)
}
