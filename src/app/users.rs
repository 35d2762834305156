use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::app::auth::hash_password;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, password_hash, is_active, date_joined) \
             VALUES (?, ?, 1, ?) \
             RETURNING id, username",
        )
        .bind(username)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.db.pool())
        .await?;

        Ok(user_from_row(&row))
    }

    /// Removes the account; posts, comments and follows go with it.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
    }
}
