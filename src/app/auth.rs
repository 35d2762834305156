use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::Actor;
use crate::infra::db::Db;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub user_id: i64,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    signing_key: [u8; 32],
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl AuthService {
    pub fn new(
        db: Db,
        signing_key: [u8; 32],
        access_ttl_minutes: u64,
        refresh_ttl_days: u64,
    ) -> Self {
        Self {
            db,
            signing_key,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    /// Exchanges credentials for a token pair. `None` means the
    /// credentials do not match an active account.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<TokenPair>> {
        let row = sqlx::query(
            "SELECT id, password_hash, is_active FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: i64 = row.get("id");
        let password_hash: String = row.get("password_hash");
        let is_active: bool = row.get("is_active");
        if !is_active || password_hash.is_empty() {
            return Ok(None);
        }

        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let tokens = self.issue_token_pair(user_id)?;
        Ok(Some(tokens))
    }

    /// Issues a fresh access token for a valid refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<String>> {
        let claims = match self.decode_claims(refresh_token) {
            Some(claims) if claims.token_type == REFRESH => claims,
            _ => return Ok(None),
        };

        if self.load_active_actor(claims.user_id).await?.is_none() {
            return Ok(None);
        }

        let access = self.encode_token(claims.user_id, ACCESS, self.access_ttl())?;
        Ok(Some(access))
    }

    /// Accepts any well-formed, unexpired token signed by this service.
    pub fn verify(&self, token: &str) -> bool {
        self.decode_claims(token).is_some()
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<Actor>> {
        let claims = match self.decode_claims(token) {
            Some(claims) if claims.token_type == ACCESS => claims,
            _ => return Ok(None),
        };
        self.load_active_actor(claims.user_id).await
    }

    pub fn issue_token_pair(&self, user_id: i64) -> Result<TokenPair> {
        let access_token = self.encode_token(user_id, ACCESS, self.access_ttl())?;
        let refresh_token = self.encode_token(user_id, REFRESH, self.refresh_ttl())?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn decode_claims(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &DecodingKey::from_secret(&self.signing_key), &validation)
            .ok()
            .map(|data| data.claims)
    }

    fn encode_token(&self, user_id: i64, token_type: &str, ttl: Duration) -> Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            token_type: token_type.to_string(),
            exp: (now + ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            user_id,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|err| anyhow!("failed to sign {} token: {}", token_type, err))
    }

    async fn load_active_actor(&self, user_id: i64) -> Result<Option<Actor>> {
        let row = sqlx::query("SELECT id, username FROM users WHERE id = ? AND is_active = 1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| Actor {
            id: row.get("id"),
            username: row.get("username"),
        }))
    }

    fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes as i64)
    }

    fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_ttl_days as i64)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service(access_ttl_minutes: u64) -> AuthService {
        let config = crate::config::AppConfig {
            http_addr: "127.0.0.1:0".to_string(),
            app_mode: "api".to_string(),
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            db_connect_timeout_seconds: 5,
            db_idle_timeout_seconds: 0,
            db_max_lifetime_seconds: 0,
            media_root: std::env::temp_dir(),
            media_public_url: None,
            upload_max_bytes: 1024,
            jwt_signing_key: [7u8; 32],
            access_ttl_minutes,
            refresh_ttl_days: 1,
            admin_token: None,
            page_size: None,
        };
        let db = Db::connect(&config).await.unwrap();
        AuthService::new(db, [7u8; 32], access_ttl_minutes, 1)
    }

    #[tokio::test]
    async fn issued_tokens_carry_type_and_subject() {
        let service = service(15).await;
        let pair = service.issue_token_pair(42).unwrap();

        let access = service.decode_claims(&pair.access_token).unwrap();
        assert_eq!(access.token_type, "access");
        assert_eq!(access.user_id, 42);
        assert!(access.exp > access.iat);

        let refresh = service.decode_claims(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, "refresh");
        assert_ne!(access.jti, refresh.jti);
    }

    #[tokio::test]
    async fn tokens_from_another_key_are_rejected() {
        let ours = service(15).await;
        let theirs = AuthService::new(ours.db.clone(), [9u8; 32], 15, 1);
        let pair = theirs.issue_token_pair(1).unwrap();

        assert!(!ours.verify(&pair.access_token));
        assert!(!ours.verify("not-a-token"));
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let service = service(0).await;
        let token = service
            .encode_token(1, ACCESS, Duration::seconds(-5))
            .unwrap();
        assert!(service.decode_claims(&token).is_none());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn each_hash_gets_a_fresh_salt() {
        let first = hash_password("s3cret-pass").unwrap();
        let second = hash_password("s3cret-pass").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("s3cret-pass", &second).unwrap());
    }
}
