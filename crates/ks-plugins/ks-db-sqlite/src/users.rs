use crate::SqliteForumRepo;
use async_trait::async_trait;
use ks_core::models::{Group, User};
use ks_core::permissions::{ForumPermission, Grant, Grantee};
use ks_core::traits::{AccessRepo, UserRepo};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        is_active: row.try_get("is_active")?,
        is_superuser: row.try_get("is_superuser")?,
        watch_new_thread: row.try_get("watch_new_thread")?,
        watch_after_reply: row.try_get("watch_after_reply")?,
    })
}

fn grantee_parts(grantee: &Grantee) -> (&'static str, Uuid) {
    match grantee {
        Grantee::User(id) => ("user", *id),
        Grantee::Group(id) => ("group", *id),
    }
}

fn grant_from_row(row: &SqliteRow) -> Result<Grant, sqlx::Error> {
    let kind: String = row.try_get("grantee_kind")?;
    let id: Uuid = row.try_get("grantee_id")?;
    let grantee = match kind.as_str() {
        "user" => Grantee::User(id),
        "group" => Grantee::Group(id),
        other => {
            return Err(sqlx::Error::Decode(
                format!("unknown grantee kind `{other}`").into(),
            ))
        }
    };
    let permission: String = row.try_get("permission")?;
    Ok(Grant {
        grantee,
        permission: permission
            .parse::<ForumPermission>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        forum_id: row.try_get("forum_id")?,
    })
}

#[async_trait]
impl UserRepo for SqliteForumRepo {
    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn create_user(&self, user: User) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, is_active, is_superuser, watch_new_thread, watch_after_reply)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(user.watch_new_thread)
        .bind(user.watch_after_reply)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_group(&self, group: Group) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO groups (id, name) VALUES (?, ?)")
            .bind(group.id)
            .bind(&group.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_to_group(&self, user_id: Uuid, group_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_groups(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let groups = sqlx::query_scalar("SELECT group_id FROM group_members WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }
}

#[async_trait]
impl AccessRepo for SqliteForumRepo {
    async fn grants_for_forum(&self, forum_id: Uuid) -> anyhow::Result<Vec<Grant>> {
        let rows = sqlx::query(
            "SELECT grantee_kind, grantee_id, permission, forum_id FROM grants
             WHERE forum_id IS NULL OR forum_id = ?",
        )
        .bind(forum_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(grant_from_row).collect::<Result<_, _>>()?)
    }

    async fn add_grant(&self, grant: Grant) -> anyhow::Result<()> {
        let (kind, id) = grantee_parts(&grant.grantee);
        sqlx::query(
            "INSERT OR IGNORE INTO grants (grantee_kind, grantee_id, permission, forum_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(kind)
        .bind(id)
        .bind(grant.permission.as_str())
        .bind(grant.forum_id)
        .execute(&self.pool)
        .await?;
        info!(grantee = kind, grantee_id = %id, permission = %grant.permission, forum = ?grant.forum_id, "permission granted");
        Ok(())
    }

    async fn remove_grant(&self, grant: &Grant) -> anyhow::Result<bool> {
        let (kind, id) = grantee_parts(&grant.grantee);
        let result = sqlx::query(
            "DELETE FROM grants
             WHERE grantee_kind = ? AND grantee_id = ? AND permission = ? AND forum_id IS ?",
        )
        .bind(kind)
        .bind(id)
        .bind(grant.permission.as_str())
        .bind(grant.forum_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
