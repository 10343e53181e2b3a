use crate::bookkeeping::{forum_of_thread, refresh_forum, refresh_thread};
use crate::{forum_from_row, post_from_row, thread_from_row, to_micros, SqliteForumRepo};
use anyhow::Context;
use async_trait::async_trait;
use ks_core::models::{Forum, Post, PostDeletion, Thread};
use ks_core::traits::ForumRepo;
use sqlx::sqlite::SqliteConnection;
use tracing::info;
use uuid::Uuid;

async fn insert_post(conn: &mut SqliteConnection, post: &Post) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO posts (id, thread_id, author_id, content, created_at, updated_at, updated_by)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(post.id)
    .bind(post.thread_id)
    .bind(post.author_id)
    .bind(&post.content)
    .bind(to_micros(post.created_at))
    .bind(to_micros(post.updated_at))
    .bind(post.updated_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Removes a thread, its posts and its watches. The caller refreshes the forum.
async fn remove_thread(conn: &mut SqliteConnection, thread_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE threads SET last_post_id = NULL WHERE id = ?")
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM posts WHERE thread_id = ?")
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM watches WHERE target_kind = 'thread' AND target_id = ?")
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM threads WHERE id = ?")
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

const THREAD_COLUMNS: &str = "t.id, t.forum_id, t.title, t.creator_id, t.created_at, \
                              t.last_post_id, t.replies, t.is_locked, t.is_sticky";

#[async_trait]
impl ForumRepo for SqliteForumRepo {
    async fn list_forums(&self) -> anyhow::Result<Vec<Forum>> {
        let rows = sqlx::query("SELECT * FROM forums ORDER BY display_order ASC, name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(forum_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_forum(&self, slug: &str) -> anyhow::Result<Option<Forum>> {
        let row = sqlx::query("SELECT * FROM forums WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(forum_from_row).transpose()?)
    }

    async fn get_forum_by_id(&self, id: Uuid) -> anyhow::Result<Option<Forum>> {
        let row = sqlx::query("SELECT * FROM forums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(forum_from_row).transpose()?)
    }

    async fn create_forum(&self, forum: Forum) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO forums (id, name, slug, description, last_post_id, display_order, is_listed)
             VALUES (?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(forum.id)
        .bind(&forum.name)
        .bind(&forum.slug)
        .bind(&forum.description)
        .bind(forum.display_order)
        .bind(forum.is_listed)
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting forum `{}`", forum.slug))?;
        Ok(())
    }

    /// Atomic operation to create a thread and its first post.
    ///
    /// # Developer Note
    /// Using a Transaction (tx) ensures we don't end up with "ghost threads"
    /// that have no initial post if the second insert fails.
    async fn create_thread(&self, thread: Thread, first_post: Post) -> anyhow::Result<()> {
        let mut tx = self.begin_write().await?;

        // 1. Insert Thread (counters are filled in by the refresh below)
        sqlx::query(
            "INSERT INTO threads (id, forum_id, title, creator_id, created_at, last_post_id, replies, is_locked, is_sticky)
             VALUES (?, ?, ?, ?, ?, NULL, 0, ?, ?)",
        )
        .bind(thread.id)
        .bind(thread.forum_id)
        .bind(&thread.title)
        .bind(thread.creator_id)
        .bind(to_micros(thread.created_at))
        .bind(thread.is_locked)
        .bind(thread.is_sticky)
        .execute(&mut *tx)
        .await?;

        // 2. Insert OP Post
        insert_post(&mut *tx, &first_post).await?;

        // 3. Counters
        refresh_thread(&mut *tx, thread.id).await?;
        refresh_forum(&mut *tx, thread.forum_id).await?;

        tx.commit().await?;
        info!(thread_id = %thread.id, forum_id = %thread.forum_id, "thread created");
        Ok(())
    }

    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>> {
        let row = sqlx::query(&format!("SELECT {THREAD_COLUMNS} FROM threads t WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(thread_from_row).transpose()?)
    }

    async fn list_threads(
        &self,
        forum_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Thread>> {
        let sql = format!(
            "SELECT {THREAD_COLUMNS} FROM threads t
             LEFT JOIN posts p ON p.id = t.last_post_id
             WHERE t.forum_id = ?
             ORDER BY t.is_sticky DESC, p.created_at DESC, t.last_post_id DESC, t.created_at DESC
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(forum_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(thread_from_row).collect::<Result<_, _>>()?)
    }

    async fn count_threads(&self, forum_id: Uuid) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM threads WHERE forum_id = ?")
            .bind(forum_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count)?)
    }

    async fn rename_thread(&self, thread_id: Uuid, title: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE threads SET title = ? WHERE id = ?")
            .bind(title)
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn toggle_thread_lock(&self, thread_id: Uuid) -> anyhow::Result<Option<bool>> {
        let locked = sqlx::query_scalar(
            "UPDATE threads SET is_locked = NOT is_locked WHERE id = ? RETURNING is_locked",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(locked)
    }

    async fn toggle_thread_sticky(&self, thread_id: Uuid) -> anyhow::Result<Option<bool>> {
        let sticky = sqlx::query_scalar(
            "UPDATE threads SET is_sticky = NOT is_sticky WHERE id = ? RETURNING is_sticky",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sticky)
    }

    async fn move_thread(&self, thread_id: Uuid, to_forum: Uuid) -> anyhow::Result<()> {
        let mut tx = self.begin_write().await?;

        let from_forum = forum_of_thread(&mut *tx, thread_id)
            .await?
            .with_context(|| format!("moving unknown thread {thread_id}"))?;

        sqlx::query("UPDATE threads SET forum_id = ? WHERE id = ?")
            .bind(to_forum)
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;

        refresh_forum(&mut *tx, from_forum).await?;
        refresh_forum(&mut *tx, to_forum).await?;

        tx.commit().await?;
        info!(%thread_id, %from_forum, %to_forum, "thread moved");
        Ok(())
    }

    async fn delete_thread(&self, thread_id: Uuid) -> anyhow::Result<()> {
        let mut tx = self.begin_write().await?;

        let Some(forum_id) = forum_of_thread(&mut *tx, thread_id).await? else {
            return Ok(());
        };
        remove_thread(&mut *tx, thread_id).await?;
        refresh_forum(&mut *tx, forum_id).await?;

        tx.commit().await?;
        info!(%thread_id, %forum_id, "thread deleted");
        Ok(())
    }

    async fn create_post(&self, post: Post) -> anyhow::Result<()> {
        let mut tx = self.begin_write().await?;

        let forum_id = forum_of_thread(&mut *tx, post.thread_id)
            .await?
            .with_context(|| format!("replying to unknown thread {}", post.thread_id))?;

        insert_post(&mut *tx, &post).await?;
        refresh_thread(&mut *tx, post.thread_id).await?;
        refresh_forum(&mut *tx, forum_id).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(post_from_row).transpose()?)
    }

    async fn list_posts(
        &self,
        thread_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE thread_id = ?
             ORDER BY created_at ASC, id ASC
             LIMIT ? OFFSET ?",
        )
        .bind(thread_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect::<Result<_, _>>()?)
    }

    async fn update_post(&self, post: &Post) -> anyhow::Result<()> {
        sqlx::query("UPDATE posts SET content = ?, updated_at = ?, updated_by = ? WHERE id = ?")
            .bind(&post.content)
            .bind(to_micros(post.updated_at))
            .bind(post.updated_by)
            .bind(post.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_post(&self, post_id: Uuid) -> anyhow::Result<Option<PostDeletion>> {
        let mut tx = self.begin_write().await?;

        let thread_id: Option<Uuid> = sqlx::query_scalar("SELECT thread_id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(thread_id) = thread_id else {
            return Ok(None);
        };
        let forum_id = forum_of_thread(&mut *tx, thread_id)
            .await?
            .with_context(|| format!("post {post_id} belongs to missing thread {thread_id}"))?;

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        let tally = refresh_thread(&mut *tx, thread_id).await?;
        let thread_deleted = tally.is_orphaned();
        if thread_deleted {
            remove_thread(&mut *tx, thread_id).await?;
        }
        refresh_forum(&mut *tx, forum_id).await?;

        tx.commit().await?;
        info!(%post_id, %thread_id, thread_deleted, "post deleted");
        Ok(Some(PostDeletion {
            post_id,
            thread_id,
            thread_deleted,
        }))
    }

    async fn post_position(&self, post: &Post) -> anyhow::Result<u64> {
        let created = to_micros(post.created_at);
        let position: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts
             WHERE thread_id = ?
               AND (created_at < ? OR (created_at = ? AND id < ?))",
        )
        .bind(post.thread_id)
        .bind(created)
        .bind(created)
        .bind(post.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(position)?)
    }
}
