use crate::{from_micros, to_micros, SqliteForumRepo};
use async_trait::async_trait;
use ks_core::events::{Watch, WatchTarget};
use ks_core::traits::WatchRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

fn watch_from_row(row: &SqliteRow) -> Result<Watch, sqlx::Error> {
    let kind: String = row.try_get("target_kind")?;
    let target_id: Uuid = row.try_get("target_id")?;
    let target = WatchTarget::from_parts(&kind, target_id)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown watch target `{kind}`").into()))?;
    Ok(Watch {
        id: row.try_get("id")?,
        target,
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        secret: row.try_get("secret")?,
        is_active: row.try_get("is_active")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl WatchRepo for SqliteForumRepo {
    async fn create_watch(&self, watch: Watch) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO watches (id, target_kind, target_id, user_id, email, secret, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(watch.id)
        .bind(watch.target.kind())
        .bind(watch.target.id())
        .bind(watch.user_id)
        .bind(&watch.email)
        .bind(&watch.secret)
        .bind(watch.is_active)
        .bind(to_micros(watch.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_watch(&self, id: Uuid) -> anyhow::Result<Option<Watch>> {
        let row = sqlx::query("SELECT * FROM watches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(watch_from_row).transpose()?)
    }

    async fn find_user_watch(
        &self,
        user_id: Uuid,
        target: WatchTarget,
    ) -> anyhow::Result<Option<Watch>> {
        let row = sqlx::query(
            "SELECT * FROM watches WHERE user_id = ? AND target_kind = ? AND target_id = ?
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(user_id)
        .bind(target.kind())
        .bind(target.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(watch_from_row).transpose()?)
    }

    async fn activate_watch(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE watches SET is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_watch(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM watches WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn active_watches(&self, target: WatchTarget) -> anyhow::Result<Vec<Watch>> {
        let rows = sqlx::query(
            "SELECT * FROM watches
             WHERE target_kind = ? AND target_id = ? AND is_active = 1
             ORDER BY created_at ASC",
        )
        .bind(target.kind())
        .bind(target.id())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(watch_from_row).collect::<Result<_, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{forum, repo, thread, user};
    use ks_core::events::{Watch, WatchTarget};
    use ks_core::traits::{ForumRepo, WatchRepo};

    #[tokio::test]
    async fn test_only_active_watches_are_listed() {
        let repo = repo().await;
        let member = user(&repo, "watcher").await;
        let forum = forum(&repo, "firefox").await;
        let target = WatchTarget::Forum(forum.id);

        let by_user = Watch::for_user(target, member.id);
        let by_email = Watch::for_email(target, "anon@example.org".into());
        repo.create_watch(by_user.clone()).await.unwrap();
        repo.create_watch(by_email.clone()).await.unwrap();

        let active = repo.active_watches(target).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, by_user.id);

        repo.activate_watch(by_email.id).await.unwrap();
        assert_eq!(repo.active_watches(target).await.unwrap().len(), 2);

        let found = repo.find_user_watch(member.id, target).await.unwrap().unwrap();
        assert_eq!(found.secret, by_user.secret);
    }

    #[tokio::test]
    async fn test_thread_watches_go_with_the_thread() {
        let repo = repo().await;
        let member = user(&repo, "watcher").await;
        let forum = forum(&repo, "firefox").await;
        let (thread, post) = thread(&repo, &forum, &member, 0).await;
        let watch = Watch::for_user(WatchTarget::Thread(thread.id), member.id);
        repo.create_watch(watch.clone()).await.unwrap();

        repo.delete_post(post.id).await.unwrap();

        assert!(repo.get_watch(watch.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_watch() {
        let repo = repo().await;
        let forum = forum(&repo, "firefox").await;
        let watch = Watch::for_email(WatchTarget::Forum(forum.id), "anon@example.org".into());
        repo.create_watch(watch.clone()).await.unwrap();

        repo.delete_watch(watch.id).await.unwrap();
        assert!(repo.get_watch(watch.id).await.unwrap().is_none());
    }
}
