//! Thread-level moderator actions.

use crate::{require_perm, require_user, ForumService};
use ks_core::error::{AppError, Result};
use ks_core::models::Thread;
use ks_core::permissions::{Actor, ForumPermission};
use ks_core::validation;
use tracing::info;
use uuid::Uuid;

impl ForumService {
    /// Creators may retitle their own threads; others need `thread_edit_forum`.
    pub async fn edit_thread_title(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
        title: &str,
    ) -> Result<Thread> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let mut thread = self.thread_in(&forum, thread_id).await?;
        let user = require_user(actor)?;
        if thread.creator_id != user.id && !table.has_perm(actor, ForumPermission::ThreadEditForum)
        {
            return Err(AppError::Forbidden(format!(
                "missing `{}`",
                ForumPermission::ThreadEditForum
            )));
        }
        thread.title = validation::thread_title(title)?;
        if !self.forums.rename_thread(thread.id, &thread.title).await? {
            return Err(AppError::not_found("Thread", thread_id));
        }
        Ok(thread)
    }

    pub async fn delete_thread(&self, actor: &Actor, slug: &str, thread_id: Uuid) -> Result<()> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let thread = self.thread_in(&forum, thread_id).await?;
        require_perm(&table, actor, ForumPermission::ThreadDeleteForum)?;
        self.forums.delete_thread(thread.id).await?;
        Ok(())
    }

    pub async fn toggle_lock(&self, actor: &Actor, slug: &str, thread_id: Uuid) -> Result<Thread> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let mut thread = self.thread_in(&forum, thread_id).await?;
        require_perm(&table, actor, ForumPermission::ThreadLockedForum)?;
        thread.is_locked = self
            .forums
            .toggle_thread_lock(thread.id)
            .await?
            .ok_or_else(|| AppError::not_found("Thread", thread_id))?;
        info!(%thread_id, is_locked = thread.is_locked, "thread lock toggled");
        Ok(thread)
    }

    pub async fn toggle_sticky(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
    ) -> Result<Thread> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let mut thread = self.thread_in(&forum, thread_id).await?;
        require_perm(&table, actor, ForumPermission::ThreadStickyForum)?;
        thread.is_sticky = self
            .forums
            .toggle_thread_sticky(thread.id)
            .await?
            .ok_or_else(|| AppError::not_found("Thread", thread_id))?;
        info!(%thread_id, is_sticky = thread.is_sticky, "thread sticky toggled");
        Ok(thread)
    }

    /// Needs `thread_move_forum` where the thread is, and posting rights
    /// where it goes.
    pub async fn move_thread(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
        to_slug: &str,
    ) -> Result<Thread> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let mut thread = self.thread_in(&forum, thread_id).await?;
        require_perm(&table, actor, ForumPermission::ThreadMoveForum)?;

        let (destination, destination_table) = self.viewable_forum(actor, to_slug).await?;
        if !destination_table.allows_posting_by(actor) {
            return Err(AppError::Forbidden(format!(
                "missing `{}` in {}",
                ForumPermission::PostInForum,
                destination.slug
            )));
        }
        if destination.id == forum.id {
            return Ok(thread);
        }

        self.forums.move_thread(thread.id, destination.id).await?;
        thread.forum_id = destination.id;
        Ok(thread)
    }
}
