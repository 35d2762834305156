use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app::groups::GroupService;
use crate::app::media::{verify_image, DecodedImage, MediaService};
use crate::app::policy::{authorize, Action, Resource, Target};
use crate::app::posts::PostService;
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::user::Principal;
use crate::http::error::is_foreign_key_violation;
use crate::http::handlers::{acting, path_ids};
use crate::http::links::Links;
use crate::http::pagination::{resolve_page, PageQuery, Paginated};
use crate::http::projection::{
    invalid_group, parse_object, post_from_wire, ImageInput, PostInput, PostWire,
};
use crate::http::AppError;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    links: Links,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    authorize(&principal, Action::List, Resource::Post, Target::Collection)?;

    let service = PostService::new(state.db.clone());
    let page = resolve_page(&query, state.page_size);

    let posts = service.list(page).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to list posts")
    })?;
    let items: Vec<PostWire> = posts
        .into_iter()
        .map(|post| PostWire::project(post, &links))
        .collect();

    let Some(page) = page else {
        return Ok(Json(items).into_response());
    };

    let count = service.count().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to count posts");
        AppError::internal("failed to list posts")
    })?;

    Ok(Json(Paginated::new(page, count, items, &links)).into_response())
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    links: Links,
    body: Bytes,
) -> Result<(StatusCode, Json<PostWire>), AppError> {
    authorize(&principal, Action::Create, Resource::Post, Target::Collection)?;
    let actor = acting(&principal)?;

    let payload = parse_object(&body)?;
    let PostInput { text, group, image } = post_from_wire(&payload, false)?;
    let (image, upload) = verified_image(image).await?;
    ensure_group(&state, group).await?;

    let text = text.ok_or_else(|| AppError::field("text", "This field is required."))?;

    let post = post_service(&state)
        .create_post(
            actor.id,
            NewPost {
                text,
                group_id: group.flatten(),
                image: image.flatten(),
            },
            upload.as_ref(),
        )
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                return AppError::validation(invalid_group(group.flatten().unwrap_or_default()));
            }
            tracing::error!(error = ?err, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    tracing::info!(post_id = post.id, author_id = actor.id, "post created");
    Ok((StatusCode::CREATED, Json(PostWire::project(post, &links))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    principal: Principal,
    links: Links,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PostWire>, AppError> {
    let post_id = path_ids(path)?;
    let post = load_authorized(&state, &principal, Action::Retrieve, post_id).await?;
    Ok(Json(PostWire::project(post, &links)))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    links: Links,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<Json<PostWire>, AppError> {
    let post_id = path_ids(path)?;
    write(state, principal, links, post_id, body, false).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    principal: Principal,
    links: Links,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<Json<PostWire>, AppError> {
    let post_id = path_ids(path)?;
    write(state, principal, links, post_id, body, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let post_id = path_ids(path)?;
    load_authorized(&state, &principal, Action::Delete, post_id).await?;

    let deleted = PostService::new(state.db.clone())
        .delete_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to delete post");
            AppError::internal("failed to delete post")
        })?;

    if !deleted {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn write(
    state: AppState,
    principal: Principal,
    links: Links,
    post_id: i64,
    body: Bytes,
    partial: bool,
) -> Result<Json<PostWire>, AppError> {
    load_authorized(&state, &principal, Action::Update, post_id).await?;

    let payload = parse_object(&body)?;
    let PostInput { text, group, image } = post_from_wire(&payload, partial)?;
    let (image, upload) = verified_image(image).await?;
    ensure_group(&state, group).await?;

    let changes = PostChanges {
        text,
        group_id: group,
        image,
    };

    let post = post_service(&state)
        .update_post(post_id, changes, upload.as_ref())
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                return AppError::validation(invalid_group(group.flatten().unwrap_or_default()));
            }
            tracing::error!(error = ?err, post_id, "failed to update post");
            AppError::internal("failed to update post")
        })?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(PostWire::project(post, &links)))
}

/// Runs the collection check, resolves the post and runs the object check.
async fn load_authorized(
    state: &AppState,
    principal: &Principal,
    action: Action,
    post_id: i64,
) -> Result<Post, AppError> {
    authorize(principal, action, Resource::Post, Target::Collection)?;

    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to load post");
            AppError::internal("failed to load post")
        })?
        .ok_or_else(AppError::not_found)?;

    authorize(
        principal,
        action,
        Resource::Post,
        Target::Owned {
            owner_id: post.author_id,
        },
    )?;
    Ok(post)
}

async fn ensure_group(state: &AppState, group: Option<Option<i64>>) -> Result<(), AppError> {
    let Some(Some(group_id)) = group else {
        return Ok(());
    };

    let exists = GroupService::new(state.db.clone())
        .exists(group_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id, "failed to look up group");
            AppError::internal("failed to look up group")
        })?;

    if !exists {
        return Err(AppError::validation(invalid_group(group_id)));
    }
    Ok(())
}

fn post_service(state: &AppState) -> PostService {
    PostService::new(state.db.clone()).with_media(MediaService::new(state.storage.clone()))
}

/// Checks an uploaded image and returns the column change it implies along
/// with the file to write once the row is accepted.
async fn verified_image(
    image: Option<ImageInput>,
) -> Result<(Option<Option<String>>, Option<DecodedImage>), AppError> {
    match image {
        None => Ok((None, None)),
        Some(ImageInput::Clear) => Ok((Some(None), None)),
        Some(ImageInput::Upload(image)) => {
            let image = verify_image(image)
                .await
                .map_err(|rejection| AppError::field("image", rejection.to_string()))?;
            Ok((Some(Some(image.key())), Some(image)))
        }
    }
}
