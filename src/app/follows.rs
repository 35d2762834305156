//! Follow edges and the integrity rules that guard them.
//!
//! A follow may never point at its own author and a pair may exist only
//! once. The schema enforces both (`follows_prevent_self_follow`,
//! `follows_unique_relationships`); the checks here run first inside the
//! same transaction so callers get a typed rejection instead of a raw
//! constraint failure. The transaction holds the write lock from its first
//! statement, and any constraint failure that still reaches the insert is
//! classified into the same rejections.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use thiserror::Error;

use crate::domain::follow::Follow;
use crate::domain::user::Actor;
use crate::infra::db::Db;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("Object with username={0} does not exist.")]
    UnknownUser(String),
    #[error("cannot follow yourself")]
    SelfFollow,
    #[error("cannot follow this user again")]
    Duplicate,
    #[error(transparent)]
    Store(#[from] sqlx::Error),
    #[error("follow task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FollowError {
    /// The payload field a rejection is reported against, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::UnknownUser(_) | Self::SelfFollow => Some("following"),
            Self::Duplicate => Some("non_field_errors"),
            Self::Store(_) | Self::Task(_) => None,
        }
    }
}

/// Checks both follow invariants against the current store state.
pub async fn validate_follow(
    conn: &mut SqliteConnection,
    user_id: i64,
    following_id: i64,
) -> Result<(), FollowError> {
    if user_id == following_id {
        return Err(FollowError::SelfFollow);
    }

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = ? AND following_id = ?)",
    )
    .bind(user_id)
    .bind(following_id)
    .fetch_one(&mut *conn)
    .await?;

    if exists {
        return Err(FollowError::Duplicate);
    }
    Ok(())
}

/// Maps a store constraint failure onto the rejection it stands for.
pub fn classify_store_error(err: sqlx::Error) -> FollowError {
    let (unique, check) = match err.as_database_error() {
        Some(db_err) => (db_err.is_unique_violation(), db_err.is_check_violation()),
        None => (false, false),
    };

    if unique {
        FollowError::Duplicate
    } else if check {
        FollowError::SelfFollow
    } else {
        FollowError::Store(err)
    }
}

#[derive(Clone)]
pub struct FollowService {
    db: Db,
}

impl FollowService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Records `actor` following `following`.
    ///
    /// The check and the insert run under the store's write lock, so
    /// concurrent requests for the same pair serialize and every loser sees
    /// `Duplicate`. The work runs on its own task and always ends its
    /// transaction even when the caller stops waiting.
    pub async fn follow(&self, actor: &Actor, following: &str) -> Result<Follow, FollowError> {
        let service = self.clone();
        let actor = actor.clone();
        let following = following.to_string();

        tokio::spawn(async move { service.follow_locked(&actor, &following).await }).await?
    }

    async fn follow_locked(&self, actor: &Actor, following: &str) -> Result<Follow, FollowError> {
        let mut conn = self.db.pool().acquire().await?;

        // A deferred transaction that has already read cannot take the write
        // lock while another writer holds it; SQLite answers SQLITE_BUSY
        // without waiting. IMMEDIATE waits on the busy timeout instead.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = insert_follow(&mut *conn, actor, following).await;
        let end = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };

        let ended = sqlx::query(end).execute(&mut *conn).await;
        if let Err(err) = ended {
            if sqlx::query("ROLLBACK").execute(&mut *conn).await.is_err() {
                // Never hand a connection with an open transaction back to the pool.
                drop(conn.detach());
            }
            return result.and(Err(classify_store_error(err)));
        }

        result
    }

    /// Follows authored by `user_id` whose followed username contains every
    /// search term, ignoring case.
    pub async fn list_following(&self, user_id: i64, terms: &[String]) -> anyhow::Result<Vec<Follow>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT f.id, f.user_id, u.username AS follower_name, f.following_id, fu.username AS following_name \
             FROM follows f \
             JOIN users u ON u.id = f.user_id \
             JOIN users fu ON fu.id = f.following_id \
             WHERE f.user_id = ",
        );
        builder.push_bind(user_id);
        for term in terms {
            builder.push(" AND instr(lower(fu.username), lower(");
            builder.push_bind(term.clone());
            builder.push(")) > 0");
        }
        builder.push(" ORDER BY f.id");

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        Ok(rows.iter().map(follow_from_row).collect())
    }
}

async fn insert_follow(
    conn: &mut SqliteConnection,
    actor: &Actor,
    following: &str,
) -> Result<Follow, FollowError> {
    let following_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(following)
        .fetch_optional(&mut *conn)
        .await?;
    let following_id =
        following_id.ok_or_else(|| FollowError::UnknownUser(following.to_string()))?;

    validate_follow(&mut *conn, actor.id, following_id).await?;

    let follow_id: i64 = sqlx::query_scalar(
        "INSERT INTO follows (user_id, following_id) VALUES (?, ?) RETURNING id",
    )
    .bind(actor.id)
    .bind(following_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(classify_store_error)?;

    Ok(Follow {
        id: follow_id,
        user_id: actor.id,
        user: actor.username.clone(),
        following_id,
        following: following.to_string(),
    })
}

fn follow_from_row(row: &SqliteRow) -> Follow {
    Follow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user: row.get("follower_name"),
        following_id: row.get("following_id"),
        following: row.get("following_name"),
    }
}
