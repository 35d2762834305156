use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub media_root: PathBuf,
    pub media_public_url: Option<String>,
    pub upload_max_bytes: usize,
    pub jwt_signing_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub admin_token: Option<String>,
    pub page_size: Option<u32>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let page_size = match std::env::var("PAGE_SIZE") {
            Ok(value) => Some(parse_page_size(&value)?),
            Err(_) => None,
        };

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "5")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            media_root: PathBuf::from(env_or("MEDIA_ROOT", "media")),
            media_public_url: std::env::var("MEDIA_PUBLIC_URL").ok(),
            upload_max_bytes: env_or_parse("UPLOAD_MAX_BYTES", "10485760")?,
            jwt_signing_key: env_key_32("JWT_SIGNING_KEY")?,
            access_ttl_minutes: env_or_parse("ACCESS_TTL_MINUTES", "15")?,
            refresh_ttl_days: env_or_parse("REFRESH_TTL_DAYS", "30")?,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            page_size,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    decode_key_32(&value).map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn decode_key_32(value: &str) -> Result<[u8; 32]> {
    let decoded = STANDARD.decode(value.trim().as_bytes())?;
    if decoded.len() != 32 {
        return Err(anyhow!("expected 32 bytes, got {}", decoded.len()));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}

fn parse_page_size(value: &str) -> Result<u32> {
    let size = value
        .trim()
        .parse::<u32>()
        .map_err(|err| anyhow!("invalid PAGE_SIZE: {}", err))?;
    if size == 0 {
        return Err(anyhow!("invalid PAGE_SIZE: must be positive"));
    }
    Ok(size)
}
