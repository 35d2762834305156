use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::comments::CommentService;
use crate::app::policy::{authorize, Action, Resource, Target};
use crate::app::posts::PostService;
use crate::domain::comment::Comment;
use crate::domain::user::Principal;
use crate::http::error::is_foreign_key_violation;
use crate::http::handlers::{acting, path_ids};
use crate::http::projection::{comment_from_wire, parse_object, CommentWire};
use crate::http::AppError;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<CommentWire>>, AppError> {
    let post_id = path_ids(path)?;
    authorize(&principal, Action::List, Resource::Comment, Target::Collection)?;
    ensure_post(&state, post_id).await?;

    let comments = CommentService::new(state.db.clone())
        .list_for_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(comments.into_iter().map(CommentWire::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<CommentWire>), AppError> {
    let post_id = path_ids(path)?;
    authorize(&principal, Action::Create, Resource::Comment, Target::Collection)?;
    let actor = acting(&principal)?;
    ensure_post(&state, post_id).await?;

    let payload = parse_object(&body)?;
    let text = comment_from_wire(&payload, false)?
        .ok_or_else(|| AppError::field("text", "This field is required."))?;

    let comment = CommentService::new(state.db.clone())
        .create_comment(actor.id, post_id, text)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                return AppError::not_found();
            }
            tracing::error!(error = ?err, post_id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?;

    Ok((StatusCode::CREATED, Json(CommentWire::from(comment))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<CommentWire>, AppError> {
    let (post_id, comment_id) = path_ids(path)?;
    let comment = load_authorized(&state, &principal, Action::Retrieve, post_id, comment_id).await?;
    Ok(Json(CommentWire::from(comment)))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<(i64, i64)>, PathRejection>,
    body: Bytes,
) -> Result<Json<CommentWire>, AppError> {
    let (post_id, comment_id) = path_ids(path)?;
    write(state, principal, post_id, comment_id, body, false).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<(i64, i64)>, PathRejection>,
    body: Bytes,
) -> Result<Json<CommentWire>, AppError> {
    let (post_id, comment_id) = path_ids(path)?;
    write(state, principal, post_id, comment_id, body, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let (post_id, comment_id) = path_ids(path)?;
    load_authorized(&state, &principal, Action::Delete, post_id, comment_id).await?;

    let deleted = CommentService::new(state.db.clone())
        .delete_comment(comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    if !deleted {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn write(
    state: AppState,
    principal: Principal,
    post_id: i64,
    comment_id: i64,
    body: Bytes,
    partial: bool,
) -> Result<Json<CommentWire>, AppError> {
    let comment = load_authorized(&state, &principal, Action::Update, post_id, comment_id).await?;

    let payload = parse_object(&body)?;
    let Some(text) = comment_from_wire(&payload, partial)? else {
        return Ok(Json(CommentWire::from(comment)));
    };

    let comment = CommentService::new(state.db.clone())
        .update_text(comment_id, text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(CommentWire::from(comment)))
}

async fn ensure_post(state: &AppState, post_id: i64) -> Result<(), AppError> {
    let exists = PostService::new(state.db.clone())
        .exists(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to look up post");
            AppError::internal("failed to look up post")
        })?;

    if !exists {
        return Err(AppError::not_found());
    }
    Ok(())
}

/// Resolves a comment under its post, with both policy phases around it.
async fn load_authorized(
    state: &AppState,
    principal: &Principal,
    action: Action,
    post_id: i64,
    comment_id: i64,
) -> Result<Comment, AppError> {
    authorize(principal, action, Resource::Comment, Target::Collection)?;
    ensure_post(state, post_id).await?;

    let comment = CommentService::new(state.db.clone())
        .get_comment(post_id, comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id, "failed to load comment");
            AppError::internal("failed to load comment")
        })?
        .ok_or_else(AppError::not_found)?;

    authorize(
        principal,
        action,
        Resource::Comment,
        Target::Owned {
            owner_id: comment.author_id,
        },
    )?;
    Ok(comment)
}
