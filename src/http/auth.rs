use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderName;
use subtle::ConstantTimeEq;

use crate::domain::user::Principal;
use crate::http::AppError;
use crate::AppState;

const ADMIN_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-admin-token");
const INVALID_TOKEN: &str = "Given token not valid for any token type";

#[derive(Debug, Clone)]
pub struct AdminToken;

/// Resolves the bearer token, if any. A request without an `Authorization`
/// header, or with a non-bearer scheme, is anonymous; a bearer header that
/// does not carry a valid access token is rejected outright.
#[axum::async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Principal::Anonymous);
        };
        let auth_header = auth_header
            .to_str()
            .map_err(|_| AppError::token_not_valid(INVALID_TOKEN))?;

        let mut pieces = auth_header.split_whitespace();
        match pieces.next() {
            Some("Bearer") => {}
            _ => return Ok(Principal::Anonymous),
        }
        let token = match (pieces.next(), pieces.next()) {
            (Some(token), None) => token,
            _ => {
                return Err(AppError::unauthorized(
                    "Authorization header must contain two space-delimited values",
                ))
            }
        };

        let actor = state
            .auth_service()
            .authenticate_access_token(token)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to authenticate");
                AppError::internal("failed to authenticate")
            })?;

        match actor {
            Some(actor) => Ok(Principal::User(actor)),
            None => Err(AppError::token_not_valid(INVALID_TOKEN)),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("admin token not configured"))?;

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing admin token"))?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::forbidden("invalid admin token"));
        }

        Ok(AdminToken)
    }
}
