use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::group::{Group, NewGroup};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT id, title, slug, description FROM post_groups ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    pub async fn get(&self, group_id: i64) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    pub async fn exists(&self, group_id: i64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM post_groups WHERE id = ?)")
                .bind(group_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(exists)
    }

    pub async fn create(&self, group: NewGroup) -> Result<Group> {
        let row = sqlx::query(
            "INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?) \
             RETURNING id, title, slug, description",
        )
        .bind(group.title)
        .bind(group.slug)
        .bind(group.description)
        .fetch_one(self.db.pool())
        .await?;

        Ok(group_from_row(&row))
    }

    /// Deletes the group. Posts that referenced it keep existing without a group.
    pub async fn delete(&self, group_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post_groups WHERE id = ?")
            .bind(group_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn group_from_row(row: &SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}
