use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod auth;
pub mod error;
mod handlers;
pub mod links;
pub mod pagination;
pub mod projection;
mod routes;

pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.storage.root());
    let body_limit = state.upload_max_bytes;

    Router::new()
        .merge(routes::health())
        .merge(routes::jwt())
        .merge(routes::posts())
        .merge(routes::comments())
        .merge(routes::groups())
        .merge(routes::follow())
        .merge(routes::admin())
        .nest_service("/media", media)
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .with_state(state)
}
