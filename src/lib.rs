pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;

use crate::app::auth::AuthService;
use crate::config::AppConfig;
use crate::infra::{db::Db, storage::MediaStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub storage: MediaStorage,
    pub upload_max_bytes: usize,
    pub admin_token: Option<String>,
    pub jwt_signing_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub media_public_url: Option<String>,
    pub page_size: Option<u32>,
}

impl AppState {
    /// Connects the store, applies pending migrations and prepares media
    /// storage.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let db = Db::connect(config).await?;
        db.migrate().await?;
        let storage = MediaStorage::new(config).await?;

        Ok(Self {
            db,
            storage,
            upload_max_bytes: config.upload_max_bytes,
            admin_token: config.admin_token.clone(),
            jwt_signing_key: config.jwt_signing_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
            media_public_url: config.media_public_url.clone(),
            page_size: config.page_size,
        })
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.jwt_signing_key,
            self.access_ttl_minutes,
            self.refresh_ttl_days,
        )
    }
}
