//! Superuser-only operations: forums and the authorization table.

use crate::{require_user, ForumService};
use ks_core::error::{AppError, Result};
use ks_core::models::{Forum, NewForum};
use ks_core::permissions::{Actor, Grant};
use ks_core::validation;
use tracing::info;
use uuid::Uuid;

fn require_superuser(actor: &Actor) -> Result<()> {
    require_user(actor)?;
    if actor.is_superuser() {
        Ok(())
    } else {
        Err(AppError::Forbidden("superuser required".to_string()))
    }
}

impl ForumService {
    pub async fn create_forum(&self, actor: &Actor, input: NewForum) -> Result<Forum> {
        require_superuser(actor)?;
        let slug = validation::forum_slug(&input.slug)?;
        let name = validation::forum_name(&input.name)?;
        if self.forums.get_forum(&slug).await?.is_some() {
            return Err(AppError::Conflict(format!("forum `{slug}` already exists")));
        }

        let forum = Forum {
            id: Uuid::now_v7(),
            name,
            slug,
            description: input.description.trim().to_string(),
            last_post_id: None,
            display_order: input.display_order,
            is_listed: input.is_listed,
        };
        self.forums.create_forum(forum.clone()).await?;
        info!(slug = %forum.slug, "forum created");
        Ok(forum)
    }

    pub async fn grant(&self, actor: &Actor, grant: Grant) -> Result<()> {
        require_superuser(actor)?;
        if let Some(forum_id) = grant.forum_id {
            if self.forums.get_forum_by_id(forum_id).await?.is_none() {
                return Err(AppError::not_found("Forum", forum_id));
            }
        }
        self.access.add_grant(grant).await?;
        Ok(())
    }

    /// Returns whether a grant was actually removed.
    pub async fn revoke(&self, actor: &Actor, grant: Grant) -> Result<bool> {
        require_superuser(actor)?;
        Ok(self.access.remove_grant(&grant).await?)
    }
}
