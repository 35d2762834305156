use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::comment::Comment;
use crate::infra::db::Db;

const COMMENT_SELECT: &str = "SELECT c.id, c.text, c.created, c.author_id, u.username AS author, \
                                     c.post_id \
                              FROM comments c \
                              JOIN users u ON u.id = c.author_id";

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_comment(&self, author_id: i64, post_id: i64, text: String) -> Result<Comment> {
        let mut tx = self.db.pool().begin().await?;

        let comment_id: i64 = sqlx::query_scalar(
            "INSERT INTO comments (text, created, author_id, post_id) VALUES (?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(text)
        .bind(OffsetDateTime::now_utc())
        .bind(author_id)
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(comment_from_row(&row))
    }

    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!("{} WHERE c.post_id = ? ORDER BY c.id", COMMENT_SELECT))
            .bind(post_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Looks a comment up within its parent post only.
    pub async fn get_comment(&self, post_id: i64, comment_id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("{} WHERE c.id = ? AND c.post_id = ?", COMMENT_SELECT))
            .bind(comment_id)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    pub async fn update_text(&self, comment_id: i64, text: String) -> Result<Option<Comment>> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
            .bind(text)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
            .bind(comment_id)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    pub async fn delete_comment(&self, comment_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn comment_from_row(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        text: row.get("text"),
        created: row.get("created"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        post_id: row.get("post_id"),
    }
}
