//! Recomputation of the cached `replies` / `last_post_id` columns.
//!
//! Callers run these on the same transaction as the mutation they follow.

use crate::from_micros;
use ks_core::bookkeeping::{newest, ForumTally, PostStamp, ThreadTally};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

fn stamps(rows: &[SqliteRow]) -> Result<Vec<PostStamp>, sqlx::Error> {
    rows.iter()
        .map(|row| {
            Ok(PostStamp {
                id: row.try_get("id")?,
                created_at: from_micros(row.try_get("created_at")?)?,
            })
        })
        .collect()
}

/// Rewrites the thread's counters from its remaining posts.
pub(crate) async fn refresh_thread(
    conn: &mut SqliteConnection,
    thread_id: Uuid,
) -> Result<ThreadTally, sqlx::Error> {
    let post_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE thread_id = ?")
        .bind(thread_id)
        .fetch_one(&mut *conn)
        .await?;

    // Every post sharing the newest timestamp; `newest` settles the tie.
    let candidates = sqlx::query(
        "SELECT id, created_at FROM posts
         WHERE thread_id = ?
           AND created_at = (SELECT MAX(created_at) FROM posts WHERE thread_id = ?)",
    )
    .bind(thread_id)
    .bind(thread_id)
    .fetch_all(&mut *conn)
    .await?;

    let tally = ThreadTally::new(
        u64::try_from(post_count).unwrap_or_default(),
        newest(stamps(&candidates)?),
    );

    sqlx::query("UPDATE threads SET replies = ?, last_post_id = ? WHERE id = ?")
        .bind(i64::from(tally.replies()))
        .bind(tally.last_post_id)
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;

    debug!(%thread_id, replies = tally.replies(), last_post = ?tally.last_post_id, "thread counters refreshed");
    Ok(tally)
}

/// Points the forum at the newest post across all of its threads.
pub(crate) async fn refresh_forum(
    conn: &mut SqliteConnection,
    forum_id: Uuid,
) -> Result<ForumTally, sqlx::Error> {
    let candidates = sqlx::query(
        "SELECT p.id, p.created_at FROM posts p
         JOIN threads t ON t.id = p.thread_id
         WHERE t.forum_id = ?
           AND p.created_at = (
               SELECT MAX(p2.created_at) FROM posts p2
               JOIN threads t2 ON t2.id = p2.thread_id
               WHERE t2.forum_id = ?
           )",
    )
    .bind(forum_id)
    .bind(forum_id)
    .fetch_all(&mut *conn)
    .await?;

    let tally = ForumTally {
        last_post_id: newest(stamps(&candidates)?),
    };

    sqlx::query("UPDATE forums SET last_post_id = ? WHERE id = ?")
        .bind(tally.last_post_id)
        .bind(forum_id)
        .execute(&mut *conn)
        .await?;

    debug!(%forum_id, last_post = ?tally.last_post_id, "forum last post refreshed");
    Ok(tally)
}

/// Forum currently holding the thread.
pub(crate) async fn forum_of_thread(
    conn: &mut SqliteConnection,
    thread_id: Uuid,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT forum_id FROM threads WHERE id = ?")
        .bind(thread_id)
        .fetch_optional(&mut *conn)
        .await
}
