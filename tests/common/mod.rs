#![allow(dead_code)]

use std::io::Cursor;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use postline::app::groups::GroupService;
use postline::app::users::UserService;
use postline::config::AppConfig;
use postline::domain::group::NewGroup;
use postline::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const DEFAULT_PASSWORD: &str = "testpassword123";
const TEST_SIGNING_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";

// ---------------------------------------------------------------------------
// TestApp: one private in-memory database and media directory per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    _media: TempDir,
    _data: Option<TempDir>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or("").to_string()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body_bytes
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn test_config(media_root: &std::path::Path) -> AppConfig {
    AppConfig {
        http_addr: "127.0.0.1:0".to_string(),
        app_mode: "api".to_string(),
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        db_connect_timeout_seconds: 5,
        db_idle_timeout_seconds: 300,
        db_max_lifetime_seconds: 1800,
        media_root: media_root.to_path_buf(),
        media_public_url: None,
        upload_max_bytes: 10 * 1024 * 1024,
        jwt_signing_key: TEST_SIGNING_KEY,
        access_ttl_minutes: 15,
        refresh_ttl_days: 30,
        admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        page_size: None,
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Builds the app from a test config adjusted by `configure`.
    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let media = TempDir::new().expect("failed to create media dir");
        let mut config = test_config(media.path());
        configure(&mut config);

        let state = AppState::from_config(&config)
            .await
            .expect("AppState::from_config failed");
        let router = postline::http::router(state.clone());

        TestApp {
            router,
            state,
            _media: media,
            _data: None,
        }
    }

    /// Builds the app on a SQLite file with a multi-connection pool, so
    /// writers on separate connections can contend for the database lock.
    pub async fn spawn_file_backed(max_connections: u32) -> Self {
        let data = TempDir::new().expect("failed to create data dir");
        let database_url = format!("sqlite://{}", data.path().join("postline.db").display());

        let mut app = Self::spawn_with(|config| {
            config.database_url = database_url;
            config.db_max_connections = max_connections;
        })
        .await;
        app._data = Some(data);
        app
    }

    pub fn pool(&self) -> &SqlitePool {
        self.state.db.pool()
    }

    // ------------------------------------------------------------------
    // Low-level request helpers
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let body = body.map(|body| serde_json::to_string(&body).unwrap());
        self.request_raw(method, path, body, headers).await
    }

    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    async fn with_token(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let auth = token.map(|t| format!("Bearer {}", t));
        let mut headers = vec![];
        if let Some(auth) = &auth {
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(method, path, body, &headers).await
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.with_token(Method::GET, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.with_token(Method::POST, path, Some(body), token).await
    }

    pub async fn put_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.with_token(Method::PUT, path, Some(body), token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.with_token(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.with_token(Method::DELETE, path, None, token).await
    }

    /// POST with an admin token in the x-admin-token header.
    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    /// DELETE with an admin token in the x-admin-token header.
    pub async fn delete_admin(&self, path: &str, admin_token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Create a user directly in the DB and issue tokens for it.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let user = UserService::new(self.state.db.clone())
            .create_user(username, DEFAULT_PASSWORD)
            .await
            .expect("create user failed");

        let tokens = self
            .state
            .auth_service()
            .issue_token_pair(user.id)
            .expect("issue tokens failed");

        TestUser {
            id: user.id,
            username: user.username,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> i64 {
        GroupService::new(self.state.db.clone())
            .create(NewGroup {
                title: title.to_string(),
                slug: Some(slug.to_string()),
                description: Some(format!("about {}", title)),
            })
            .await
            .expect("create group failed")
            .id
    }

    /// Create a post through the API and return its id.
    pub async fn create_post(&self, user: &TestUser, text: &str) -> i64 {
        let resp = self
            .post_json(
                "/v1/posts/",
                serde_json::json!({ "text": text }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create post: {}", resp.json());
        resp.json()["id"].as_i64().unwrap()
    }

    /// Create a comment through the API and return its id.
    pub async fn create_comment(&self, user: &TestUser, post_id: i64, text: &str) -> i64 {
        let resp = self
            .post_json(
                &format!("/v1/posts/{}/comments/", post_id),
                serde_json::json!({ "text": text }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create comment: {}", resp.json());
        resp.json()["id"].as_i64().unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.pool())
            .await
            .expect("count failed")
    }
}

/// A 2x2 PNG as a base64 data URI.
pub fn png_data_uri() -> String {
    let mut bytes = Vec::new();
    image::RgbImage::new(2, 2)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png failed");
    format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
}

pub fn png_bytes(data_uri: &str) -> Vec<u8> {
    let (_, payload) = data_uri.split_once(";base64,").unwrap();
    STANDARD.decode(payload).unwrap()
}
