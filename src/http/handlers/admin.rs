//! Account and group management behind the admin token.

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app::groups::GroupService;
use crate::app::users::UserService;
use crate::domain::group::NewGroup;
use crate::http::auth::AdminToken;
use crate::http::error::{is_unique_violation, FieldErrors};
use crate::http::handlers::path_ids;
use crate::http::projection::{parse_object, string_field, GroupWire};
use crate::http::AppError;
use crate::AppState;

const MAX_TITLE_CHARS: usize = 200;
const MAX_PASSWORD_LEN: usize = 128;

#[derive(Serialize)]
pub struct CreatedUser {
    pub id: i64,
    pub username: String,
}

pub async fn create_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedUser>), AppError> {
    let payload = parse_object(&body)?;
    let mut errors = FieldErrors::new();
    let username = string_field(&payload, "username", true, true, &mut errors);
    let password = string_field(&payload, "password", true, false, &mut errors);
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::validation(errors));
    };
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::field(
            "password",
            format!("Ensure this field has no more than {} characters.", MAX_PASSWORD_LEN),
        ));
    }

    let user = UserService::new(state.db.clone())
        .create_user(&username, &password)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return AppError::conflict("username already taken");
            }
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    tracing::info!(user_id = user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            id: user.id,
            username: user.username,
        }),
    ))
}

pub async fn delete_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let user_id = path_ids(path)?;

    let deleted = UserService::new(state.db.clone())
        .delete_user(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id, "failed to delete user");
            AppError::internal("failed to delete user")
        })?;

    if !deleted {
        return Err(AppError::not_found());
    }
    tracing::info!(user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<GroupWire>), AppError> {
    let payload = parse_object(&body)?;
    let mut errors = FieldErrors::new();
    let title = string_field(&payload, "title", true, true, &mut errors);
    let slug = string_field(&payload, "slug", false, true, &mut errors);
    let description = string_field(&payload, "description", false, true, &mut errors);
    if let Some(title) = &title {
        if title.chars().count() > MAX_TITLE_CHARS {
            errors.add(
                "title",
                format!("Ensure this field has no more than {} characters.", MAX_TITLE_CHARS),
            );
        }
    }
    let Some(title) = title.filter(|_| errors.is_empty()) else {
        return Err(AppError::validation(errors));
    };

    let group = GroupService::new(state.db.clone())
        .create(NewGroup {
            title,
            slug,
            description,
        })
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return AppError::conflict("slug already taken");
            }
            tracing::error!(error = ?err, "failed to create group");
            AppError::internal("failed to create group")
        })?;

    Ok((StatusCode::CREATED, Json(GroupWire::from(group))))
}

pub async fn delete_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let group_id = path_ids(path)?;

    let deleted = GroupService::new(state.db.clone())
        .delete(group_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id, "failed to delete group");
            AppError::internal("failed to delete group")
        })?;

    if !deleted {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
