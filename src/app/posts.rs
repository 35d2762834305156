use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use time::OffsetDateTime;

use crate::app::media::{DecodedImage, MediaService};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::infra::db::Db;

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, u.username AS author, \
                                  p.group_id, p.image \
                           FROM posts p \
                           JOIN users u ON u.id = p.author_id";

#[derive(Clone)]
pub struct PostService {
    db: Db,
    media: Option<MediaService>,
}

/// A window into the post list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db, media: None }
    }

    /// Enables image uploads on create and update.
    pub fn with_media(mut self, media: MediaService) -> Self {
        self.media = Some(media);
        self
    }

    /// Inserts the post. An `upload` is written to media storage before the
    /// row commits, so a rejected insert leaves no file behind; `post.image`
    /// must carry its key.
    pub async fn create_post(
        &self,
        author_id: i64,
        post: NewPost,
        upload: Option<&DecodedImage>,
    ) -> Result<Post> {
        let mut tx = self.db.pool().begin().await?;

        let post_id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, pub_date, author_id, group_id, image) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(post.text)
        .bind(OffsetDateTime::now_utc())
        .bind(author_id)
        .bind(post.group_id)
        .bind(post.image)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_SELECT))
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        self.store_upload(upload).await?;
        tx.commit().await?;

        Ok(post_from_row(&row))
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_SELECT))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn exists(&self, post_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = ?)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    pub async fn list(&self, page: Option<Page>) -> Result<Vec<Post>> {
        let rows = match page {
            Some(page) => {
                sqlx::query(&format!("{} ORDER BY p.id LIMIT ? OFFSET ?", POST_SELECT))
                    .bind(page.limit)
                    .bind(page.offset)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                sqlx::query(&format!("{} ORDER BY p.id", POST_SELECT))
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Applies `changes` and returns the updated post, or `None` if it is gone.
    /// An `upload` is stored the same way as in [`Self::create_post`].
    pub async fn update_post(
        &self,
        post_id: i64,
        changes: PostChanges,
        upload: Option<&DecodedImage>,
    ) -> Result<Option<Post>> {
        let mut tx = self.db.pool().begin().await?;

        if !changes.is_empty() {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE posts SET ");
            let mut fields = builder.separated(", ");
            if let Some(text) = changes.text {
                fields.push("text = ");
                fields.push_bind_unseparated(text);
            }
            if let Some(group_id) = changes.group_id {
                fields.push("group_id = ");
                fields.push_bind_unseparated(group_id);
            }
            if let Some(image) = changes.image {
                fields.push("image = ");
                fields.push_bind_unseparated(image);
            }
            builder.push(" WHERE id = ");
            builder.push_bind(post_id);
            builder.build().execute(&mut *tx).await?;
        }

        let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_SELECT))
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;

        if row.is_some() {
            self.store_upload(upload).await?;
        }
        tx.commit().await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn store_upload(&self, upload: Option<&DecodedImage>) -> Result<()> {
        let Some(image) = upload else {
            return Ok(());
        };
        let media = self
            .media
            .as_ref()
            .context("post service has no media storage")?;
        media.store(image).await?;
        Ok(())
    }
}

fn post_from_row(row: &SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        group_id: row.get("group_id"),
        image: row.get("image"),
    }
}
