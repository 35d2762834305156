use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::http::error::FieldErrors;
use crate::http::projection::{parse_object, string_field, Payload};
use crate::http::AppError;
use crate::AppState;

const TOKEN_INVALID: &str = "Token is invalid or expired";

#[derive(Serialize)]
pub struct TokenPairResponse {
    pub refresh: String,
    pub access: String,
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub access: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {}

pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenPairResponse>, AppError> {
    let payload = parse_object(&body)?;
    let mut errors = FieldErrors::new();
    let username = string_field(&payload, "username", true, true, &mut errors);
    let password = string_field(&payload, "password", true, false, &mut errors);
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::validation(errors));
    };

    let tokens = state
        .auth_service()
        .login(&username, &password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?
        .ok_or_else(|| AppError::unauthorized("No active account found with the given credentials"))?;

    Ok(Json(TokenPairResponse {
        refresh: tokens.refresh_token,
        access: tokens.access_token,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AccessResponse>, AppError> {
    let payload = parse_object(&body)?;
    let token = token_field(&payload, "refresh")?;

    let access = state
        .auth_service()
        .refresh(&token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?
        .ok_or_else(|| AppError::token_not_valid(TOKEN_INVALID))?;

    Ok(Json(AccessResponse { access }))
}

pub async fn verify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerifyResponse>, AppError> {
    let payload = parse_object(&body)?;
    let token = token_field(&payload, "token")?;

    if !state.auth_service().verify(&token) {
        return Err(AppError::token_not_valid(TOKEN_INVALID));
    }
    Ok(Json(VerifyResponse {}))
}

fn token_field(payload: &Payload, name: &str) -> Result<String, AppError> {
    let mut errors = FieldErrors::new();
    string_field(payload, name, true, true, &mut errors).ok_or_else(|| AppError::validation(errors))
}
