//! Subscriptions to new threads (forum watches) and new posts (thread watches).

use crate::{require_user, ForumService};
use ks_core::error::{AppError, Result};
use ks_core::events::{Watch, WatchTarget};
use ks_core::permissions::Actor;
use ks_core::validation;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// An anonymous subscription request.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailWatchRequest {
    pub forum: String,
    /// Watch this thread instead of the whole forum
    pub thread: Option<Uuid>,
    pub email: String,
}

impl ForumService {
    /// Returns the user's existing watch on `target`, creating it if needed.
    pub(crate) async fn ensure_user_watch(&self, user_id: Uuid, target: WatchTarget) -> Result<Watch> {
        if let Some(existing) = self.watches.find_user_watch(user_id, target).await? {
            return Ok(existing);
        }
        let watch = Watch::for_user(target, user_id);
        self.watches.create_watch(watch.clone()).await?;
        Ok(watch)
    }

    async fn resolve_target(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Option<Uuid>,
    ) -> Result<WatchTarget> {
        let (forum, _) = self.viewable_forum(actor, slug).await?;
        match thread_id {
            Some(id) => Ok(WatchTarget::Thread(self.thread_in(&forum, id).await?.id)),
            None => Ok(WatchTarget::Forum(forum.id)),
        }
    }

    /// Subscribes the logged-in user to a forum (`thread_id == None`) or thread.
    pub async fn watch(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Option<Uuid>,
    ) -> Result<Watch> {
        let target = self.resolve_target(actor, slug, thread_id).await?;
        let user = require_user(actor)?;
        let watch = self.ensure_user_watch(user.id, target).await?;
        info!(user = %user.username, target = target.kind(), target_id = %target.id(), "watching");
        Ok(watch)
    }

    /// Removing a watch that does not exist is not an error.
    pub async fn unwatch(&self, actor: &Actor, slug: &str, thread_id: Option<Uuid>) -> Result<()> {
        let target = self.resolve_target(actor, slug, thread_id).await?;
        let user = require_user(actor)?;
        if let Some(watch) = self.watches.find_user_watch(user.id, target).await? {
            self.watches.delete_watch(watch.id).await?;
        }
        Ok(())
    }

    /// Creates an inactive email watch and asks for confirmation. The secret
    /// mailed to the address must come back through
    /// [`ForumService::activate_watch`] before notifications are sent.
    pub async fn watch_by_email(&self, actor: &Actor, request: EmailWatchRequest) -> Result<Watch> {
        let email = validation::email(&request.email)?;
        let target = self
            .resolve_target(actor, &request.forum, request.thread)
            .await?;
        let watch = Watch::for_email(target, email);
        self.watches.create_watch(watch.clone()).await?;
        self.events.confirm_watch(watch.id);
        Ok(watch)
    }

    async fn watch_with_secret(&self, id: Uuid, secret: &str) -> Result<Watch> {
        self.watches
            .get_watch(id)
            .await?
            .filter(|w| w.secret == secret)
            .ok_or_else(|| AppError::not_found("Watch", id))
    }

    pub async fn activate_watch(&self, id: Uuid, secret: &str) -> Result<()> {
        let watch = self.watch_with_secret(id, secret).await?;
        if !watch.is_active {
            self.watches.activate_watch(watch.id).await?;
        }
        Ok(())
    }

    pub async fn unsubscribe(&self, id: Uuid, secret: &str) -> Result<()> {
        let watch = self.watch_with_secret(id, secret).await?;
        self.watches.delete_watch(watch.id).await?;
        Ok(())
    }
}
