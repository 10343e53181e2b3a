//! # ks-db-sqlite Implementation
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `ks-core` domain models. One `SqliteForumRepo` serves every
//! repository port.

mod bookkeeping;
mod forums;
mod users;
mod watches;

use chrono::{DateTime, Utc};
use ks_core::models::{Forum, Post, Thread};
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub struct SqliteForumRepo {
    pool: SqlitePool,
}

impl SqliteForumRepo {
    /// Opens (or creates) the database and applies pending migrations.
    ///
    /// In-memory databases live as long as their connection, so they get a
    /// single connection that is never recycled. File databases run in WAL
    /// mode and wait up to [`BUSY_TIMEOUT`] for the write lock.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "sqlite database ready");

        Ok(Self { pool })
    }

    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction that holds the write lock from its first statement.
    ///
    /// A deferred transaction that reads before it writes cannot wait for the
    /// lock when another connection commits in between; SQLite fails it with
    /// `SQLITE_BUSY` instead. Every read-modify-write path goes through here.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Helpers for timestamp conversion
fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {micros}").into()))
}

fn forum_from_row(row: &SqliteRow) -> Result<Forum, sqlx::Error> {
    Ok(Forum {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        last_post_id: row.try_get("last_post_id")?,
        display_order: row.try_get("display_order")?,
        is_listed: row.try_get("is_listed")?,
    })
}

fn thread_from_row(row: &SqliteRow) -> Result<Thread, sqlx::Error> {
    let replies: i64 = row.try_get("replies")?;
    Ok(Thread {
        id: row.try_get("id")?,
        forum_id: row.try_get("forum_id")?,
        title: row.try_get("title")?,
        creator_id: row.try_get("creator_id")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        last_post_id: row.try_get("last_post_id")?,
        replies: u32::try_from(replies)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        is_locked: row.try_get("is_locked")?,
        is_sticky: row.try_get("is_sticky")?,
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
        updated_by: row.try_get("updated_by")?,
    })
}
