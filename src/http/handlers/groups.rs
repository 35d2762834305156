use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::app::groups::GroupService;
use crate::app::policy::{authorize, Action, Resource, Target};
use crate::domain::user::Principal;
use crate::http::handlers::path_ids;
use crate::http::projection::GroupWire;
use crate::http::AppError;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<GroupWire>>, AppError> {
    authorize(&principal, Action::List, Resource::Group, Target::Collection)?;

    let groups = GroupService::new(state.db.clone()).list().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list groups");
        AppError::internal("failed to list groups")
    })?;

    Ok(Json(groups.into_iter().map(GroupWire::from).collect()))
}

pub async fn retrieve(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<GroupWire>, AppError> {
    let group_id = path_ids(path)?;
    authorize(&principal, Action::Retrieve, Resource::Group, Target::Collection)?;

    let group = GroupService::new(state.db.clone())
        .get(group_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id, "failed to load group");
            AppError::internal("failed to load group")
        })?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(GroupWire::from(group)))
}
