use axum::{routing::delete, routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn jwt() -> Router<AppState> {
    Router::new()
        .route("/v1/jwt/create/", post(handlers::jwt::create))
        .route("/v1/jwt/refresh/", post(handlers::jwt::refresh))
        .route("/v1/jwt/verify/", post(handlers::jwt::verify))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/posts/",
            get(handlers::posts::list).post(handlers::posts::create),
        )
        .route(
            "/v1/posts/:id/",
            get(handlers::posts::retrieve)
                .put(handlers::posts::update)
                .patch(handlers::posts::partial_update)
                .delete(handlers::posts::destroy),
        )
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/posts/:post_id/comments/",
            get(handlers::comments::list).post(handlers::comments::create),
        )
        .route(
            "/v1/posts/:post_id/comments/:id/",
            get(handlers::comments::retrieve)
                .put(handlers::comments::update)
                .patch(handlers::comments::partial_update)
                .delete(handlers::comments::destroy),
        )
}

pub fn groups() -> Router<AppState> {
    Router::new()
        .route("/v1/groups/", get(handlers::groups::list))
        .route("/v1/groups/:id/", get(handlers::groups::retrieve))
}

pub fn follow() -> Router<AppState> {
    Router::new().route(
        "/v1/follow/",
        get(handlers::follow::list).post(handlers::follow::create),
    )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(handlers::admin::create_user))
        .route("/admin/users/:id", delete(handlers::admin::delete_user))
        .route("/admin/groups", post(handlers::admin::create_group))
        .route("/admin/groups/:id", delete(handlers::admin::delete_group))
}
