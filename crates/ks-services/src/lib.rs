//! # ks-services
//!
//! Every user-facing forum operation. `ForumService` resolves the caller,
//! enforces the permission and locking rules, calls the repository ports and
//! publishes events for the notification queue.

mod admin;
mod forum;
mod moderation;
mod watch;

#[cfg(test)]
mod testing;

use ks_core::error::{AppError, Result};
use ks_core::models::{Forum, Post, Thread, User};
use ks_core::permissions::{AccessTable, Actor, ForumPermission};
use ks_core::traits::{AccessRepo, EventSink, ForumRepo, UserRepo, WatchRepo};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub use watch::EmailWatchRequest;

/// Input for starting a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct NewThread {
    pub title: String,
    pub content: String,
}

pub struct ForumService {
    forums: Arc<dyn ForumRepo>,
    users: Arc<dyn UserRepo>,
    access: Arc<dyn AccessRepo>,
    watches: Arc<dyn WatchRepo>,
    events: Arc<dyn EventSink>,
}

impl ForumService {
    pub fn new(
        forums: Arc<dyn ForumRepo>,
        users: Arc<dyn UserRepo>,
        access: Arc<dyn AccessRepo>,
        watches: Arc<dyn WatchRepo>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            forums,
            users,
            access,
            watches,
            events,
        }
    }

    /// Resolves the caller. `None` is an anonymous visitor; an id that does
    /// not name an active user is rejected.
    pub async fn actor(&self, user_id: Option<Uuid>) -> Result<Actor> {
        let Some(id) = user_id else {
            return Ok(Actor::anonymous());
        };
        let user = self
            .users
            .get_user(id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized(format!("unknown or inactive user {id}")))?;
        let groups = self.users.user_groups(id).await?;
        Ok(Actor::user(user, groups))
    }

    async fn access_table(&self, forum_id: Uuid) -> Result<AccessTable> {
        let grants = self.access.grants_for_forum(forum_id).await?;
        Ok(AccessTable::new(forum_id, grants))
    }

    /// Forums the caller may not view are reported as missing.
    async fn viewable_forum(&self, actor: &Actor, slug: &str) -> Result<(Forum, AccessTable)> {
        let forum = self
            .forums
            .get_forum(slug)
            .await?
            .ok_or_else(|| AppError::not_found("Forum", slug))?;
        let table = self.access_table(forum.id).await?;
        if !table.allows_viewing_by(actor) {
            return Err(AppError::not_found("Forum", slug));
        }
        Ok((forum, table))
    }

    /// The thread, provided it lives in `forum`.
    async fn thread_in(&self, forum: &Forum, thread_id: Uuid) -> Result<Thread> {
        self.forums
            .get_thread(thread_id)
            .await?
            .filter(|t| t.forum_id == forum.id)
            .ok_or_else(|| AppError::not_found("Thread", thread_id))
    }

    /// The post, provided it lives in `thread`.
    async fn post_in(&self, thread: &Thread, post_id: Uuid) -> Result<Post> {
        self.forums
            .get_post(post_id)
            .await?
            .filter(|p| p.thread_id == thread.id)
            .ok_or_else(|| AppError::not_found("Post", post_id))
    }
}

fn require_user(actor: &Actor) -> Result<&User> {
    actor
        .user
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("you must be logged in".to_string()))
}

fn require_perm(table: &AccessTable, actor: &Actor, perm: ForumPermission) -> Result<()> {
    require_user(actor)?;
    if table.has_perm(actor, perm) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("missing `{perm}`")))
    }
}
