use crate::{require_user, ForumService, NewThread};
use chrono::Utc;
use ks_core::bookkeeping::{
    last_page, normalize_page, page_of_position, page_offset, POSTS_PER_PAGE, THREADS_PER_PAGE,
};
use ks_core::error::{AppError, Result};
use ks_core::events::{ForumEvent, WatchTarget};
use ks_core::models::{
    Forum, Post, PostDeletion, PostLocation, Thread, ThreadPage, ThreadView,
};
use ks_core::permissions::{Actor, ForumPermission};
use ks_core::validation;
use tracing::{info, warn};
use uuid::Uuid;

impl ForumService {
    /// Listed forums the caller can view, in display order.
    pub async fn list_forums(&self, actor: &Actor) -> Result<Vec<Forum>> {
        let mut visible = Vec::new();
        for forum in self.forums.list_forums().await? {
            if !forum.is_listed {
                continue;
            }
            if self.access_table(forum.id).await?.allows_viewing_by(actor) {
                visible.push(forum);
            }
        }
        Ok(visible)
    }

    pub async fn get_forum(&self, actor: &Actor, slug: &str) -> Result<Forum> {
        Ok(self.viewable_forum(actor, slug).await?.0)
    }

    pub async fn list_threads(
        &self,
        actor: &Actor,
        slug: &str,
        page: Option<u32>,
    ) -> Result<ThreadPage> {
        let (forum, _) = self.viewable_forum(actor, slug).await?;
        let page = normalize_page(page);
        let threads = self
            .forums
            .list_threads(
                forum.id,
                i64::from(THREADS_PER_PAGE),
                page_offset(page, THREADS_PER_PAGE),
            )
            .await?;
        let total_threads = self.forums.count_threads(forum.id).await?;
        Ok(ThreadPage {
            forum,
            threads,
            page,
            total_threads,
        })
    }

    pub async fn get_thread(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
        page: Option<u32>,
    ) -> Result<ThreadView> {
        let (forum, _) = self.viewable_forum(actor, slug).await?;
        let thread = self.thread_in(&forum, thread_id).await?;
        let page = normalize_page(page);
        let posts = self
            .forums
            .list_posts(
                thread.id,
                i64::from(POSTS_PER_PAGE),
                page_offset(page, POSTS_PER_PAGE),
            )
            .await?;
        Ok(ThreadView {
            last_page: last_page(thread.replies),
            forum,
            thread,
            posts,
            page,
        })
    }

    /// Starts a thread with its opening post.
    pub async fn new_thread(
        &self,
        actor: &Actor,
        slug: &str,
        input: NewThread,
    ) -> Result<(Thread, Post)> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let user = require_user(actor)?;
        if !table.allows_posting_by(actor) {
            return Err(AppError::Forbidden(format!(
                "missing `{}`",
                ForumPermission::PostInForum
            )));
        }
        let title = validation::thread_title(&input.title)?;
        let content = validation::post_content(&input.content)?;

        let thread = Thread {
            id: Uuid::now_v7(),
            forum_id: forum.id,
            title,
            creator_id: user.id,
            created_at: Utc::now(),
            last_post_id: None,
            replies: 0,
            is_locked: false,
            is_sticky: false,
        };
        let post = Post::new(thread.id, user.id, content);
        self.forums
            .create_thread(thread.clone(), post.clone())
            .await?;

        // The thread is committed; a failed auto-watch must not fail the request.
        if user.watch_new_thread {
            if let Err(e) = self
                .ensure_user_watch(user.id, WatchTarget::Thread(thread.id))
                .await
            {
                warn!(error = %e, thread_id = %thread.id, user = %user.username, "auto-watch failed");
            }
        }
        self.events.publish(ForumEvent::NewThread {
            forum_id: forum.id,
            thread_id: thread.id,
            post_id: post.id,
            author_id: user.id,
        });
        info!(forum = %forum.slug, thread_id = %thread.id, user = %user.username, "new thread");

        let stored = self
            .forums
            .get_thread(thread.id)
            .await?
            .unwrap_or(thread);
        Ok((stored, post))
    }

    /// Adds a reply. Locked threads refuse regardless of who is asking.
    pub async fn reply(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
        content: &str,
    ) -> Result<Post> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let thread = self.thread_in(&forum, thread_id).await?;
        if thread.is_locked {
            return Err(AppError::ThreadLocked(thread.id));
        }
        let user = require_user(actor)?;
        if !table.allows_posting_by(actor) {
            return Err(AppError::Forbidden(format!(
                "missing `{}`",
                ForumPermission::PostInForum
            )));
        }
        let content = validation::post_content(content)?;

        let post = Post::new(thread.id, user.id, content);
        self.forums.create_post(post.clone()).await?;

        if user.watch_after_reply {
            if let Err(e) = self
                .ensure_user_watch(user.id, WatchTarget::Thread(thread.id))
                .await
            {
                warn!(error = %e, thread_id = %thread.id, user = %user.username, "auto-watch failed");
            }
        }
        self.events.publish(ForumEvent::NewPost {
            forum_id: forum.id,
            thread_id: thread.id,
            post_id: post.id,
            author_id: user.id,
        });
        info!(thread_id = %thread.id, post_id = %post.id, user = %user.username, "reply posted");
        Ok(post)
    }

    /// Authors may edit their own posts; moderators need `post_edit_forum`.
    pub async fn edit_post(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
        post_id: Uuid,
        content: &str,
    ) -> Result<Post> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let thread = self.thread_in(&forum, thread_id).await?;
        let mut post = self.post_in(&thread, post_id).await?;
        if thread.is_locked {
            return Err(AppError::ThreadLocked(thread.id));
        }
        let user = require_user(actor)?;
        if post.author_id != user.id && !table.has_perm(actor, ForumPermission::PostEditForum) {
            return Err(AppError::Forbidden(format!(
                "missing `{}`",
                ForumPermission::PostEditForum
            )));
        }

        post.content = validation::post_content(content)?;
        post.updated_at = Utc::now();
        post.updated_by = Some(user.id);
        self.forums.update_post(&post).await?;
        Ok(post)
    }

    pub async fn delete_post(
        &self,
        actor: &Actor,
        slug: &str,
        thread_id: Uuid,
        post_id: Uuid,
    ) -> Result<PostDeletion> {
        let (forum, table) = self.viewable_forum(actor, slug).await?;
        let thread = self.thread_in(&forum, thread_id).await?;
        let post = self.post_in(&thread, post_id).await?;
        crate::require_perm(&table, actor, ForumPermission::PostDeleteForum)?;

        self.forums
            .delete_post(post.id)
            .await?
            .ok_or_else(|| AppError::not_found("Post", post.id))
    }

    /// Forum, thread and page a post is displayed on.
    pub async fn locate_post(&self, actor: &Actor, post_id: Uuid) -> Result<PostLocation> {
        let post = self
            .forums
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post", post_id))?;
        let thread = self
            .forums
            .get_thread(post.thread_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post", post_id))?;
        let forum = self
            .forums
            .get_forum_by_id(thread.forum_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post", post_id))?;
        if !self.access_table(forum.id).await?.allows_viewing_by(actor) {
            return Err(AppError::not_found("Post", post_id));
        }
        let position = self.forums.post_position(&post).await?;
        Ok(PostLocation {
            forum_slug: forum.slug,
            thread_id: thread.id,
            post_id: post.id,
            page: page_of_position(position, POSTS_PER_PAGE),
        })
    }
}
