use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::app::follows::{FollowError, FollowService};
use crate::app::policy::{authorize, Action, Resource, Target};
use crate::domain::user::Principal;
use crate::http::handlers::acting;
use crate::http::projection::{follow_from_wire, parse_object, FollowWire};
use crate::http::AppError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<FollowWire>>, AppError> {
    authorize(&principal, Action::List, Resource::Follow, Target::Collection)?;
    let actor = acting(&principal)?;

    let terms = query.search.as_deref().map(search_terms).unwrap_or_default();
    let follows = FollowService::new(state.db.clone())
        .list_following(actor.id, &terms)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = actor.id, "failed to list follows");
            AppError::internal("failed to list follows")
        })?;

    Ok(Json(follows.into_iter().map(FollowWire::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    body: Bytes,
) -> Result<(StatusCode, Json<FollowWire>), AppError> {
    authorize(&principal, Action::Create, Resource::Follow, Target::Collection)?;
    let actor = acting(&principal)?;

    let payload = parse_object(&body)?;
    let following = follow_from_wire(&payload)?;

    let follow = FollowService::new(state.db.clone())
        .follow(actor, &following)
        .await
        .map_err(|err| rejection(err, actor.id))?;

    tracing::info!(
        user_id = follow.user_id,
        following_id = follow.following_id,
        "follow created"
    );
    Ok((StatusCode::CREATED, Json(FollowWire::from(follow))))
}

fn rejection(err: FollowError, user_id: i64) -> AppError {
    match err.field() {
        Some(field) => AppError::field(field, err.to_string()),
        None => {
            tracing::error!(error = ?err, user_id, "failed to create follow");
            AppError::internal("failed to create follow")
        }
    }
}

/// Splits a search string into terms on whitespace and commas.
fn search_terms(raw: &str) -> Vec<String> {
    raw.replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_split_on_spaces_and_commas() {
        assert_eq!(search_terms(" al, Ice  bob"), vec!["al", "Ice", "bob"]);
        assert!(search_terms(" , ").is_empty());
    }

    #[test]
    fn rejections_keep_their_field() {
        let err = rejection(FollowError::SelfFollow, 1);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = rejection(FollowError::Store(sqlx::Error::RowNotFound), 1);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
