//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use crate::events::{ForumEvent, OutgoingMail, Watch, WatchTarget};
use crate::models::{Forum, Group, Post, PostDeletion, Thread, User};
use crate::permissions::Grant;
use async_trait::async_trait;
use uuid::Uuid;

/// Data persistence contract for forums, threads, and posts.
///
/// Every mutating method leaves `Thread::replies`, `Thread::last_post_id` and
/// `Forum::last_post_id` consistent before it returns.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumRepo: Send + Sync {
    // Forum Operations
    async fn list_forums(&self) -> anyhow::Result<Vec<Forum>>;
    async fn get_forum(&self, slug: &str) -> anyhow::Result<Option<Forum>>;
    async fn get_forum_by_id(&self, id: Uuid) -> anyhow::Result<Option<Forum>>;
    async fn create_forum(&self, forum: Forum) -> anyhow::Result<()>;

    // Thread Operations
    /// Inserts the thread and its opening post atomically.
    async fn create_thread(&self, thread: Thread, first_post: Post) -> anyhow::Result<()>;
    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>>;
    /// Sticky threads first, then by newest last post.
    async fn list_threads(
        &self,
        forum_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Thread>>;
    async fn count_threads(&self, forum_id: Uuid) -> anyhow::Result<u64>;
    /// Writes only the title. `false` if the thread does not exist.
    async fn rename_thread(&self, thread_id: Uuid, title: &str) -> anyhow::Result<bool>;
    /// Flips the lock in place and returns the new state.
    async fn toggle_thread_lock(&self, thread_id: Uuid) -> anyhow::Result<Option<bool>>;
    async fn toggle_thread_sticky(&self, thread_id: Uuid) -> anyhow::Result<Option<bool>>;
    async fn move_thread(&self, thread_id: Uuid, to_forum: Uuid) -> anyhow::Result<()>;
    async fn delete_thread(&self, thread_id: Uuid) -> anyhow::Result<()>;

    // Post Operations
    async fn create_post(&self, post: Post) -> anyhow::Result<()>;
    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;
    /// Oldest first.
    async fn list_posts(
        &self,
        thread_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>>;
    /// Persists content, `updated_at` and `updated_by`.
    async fn update_post(&self, post: &Post) -> anyhow::Result<()>;
    /// `None` if the post did not exist.
    async fn delete_post(&self, post_id: Uuid) -> anyhow::Result<Option<PostDeletion>>;
    /// Zero-based index of the post within its thread.
    async fn post_position(&self, post: &Post) -> anyhow::Result<u64>;
}

/// Accounts and group membership.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create_user(&self, user: User) -> anyhow::Result<()>;
    async fn create_group(&self, group: Group) -> anyhow::Result<()>;
    async fn add_to_group(&self, user_id: Uuid, group_id: Uuid) -> anyhow::Result<()>;
    async fn user_groups(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
}

/// The authorization table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccessRepo: Send + Sync {
    /// Every global grant plus every grant scoped to `forum_id`.
    async fn grants_for_forum(&self, forum_id: Uuid) -> anyhow::Result<Vec<Grant>>;
    async fn add_grant(&self, grant: Grant) -> anyhow::Result<()>;
    /// Returns whether a grant was removed.
    async fn remove_grant(&self, grant: &Grant) -> anyhow::Result<bool>;
}

/// Watch persistence.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WatchRepo: Send + Sync {
    async fn create_watch(&self, watch: Watch) -> anyhow::Result<()>;
    async fn get_watch(&self, id: Uuid) -> anyhow::Result<Option<Watch>>;
    async fn find_user_watch(
        &self,
        user_id: Uuid,
        target: WatchTarget,
    ) -> anyhow::Result<Option<Watch>>;
    async fn activate_watch(&self, id: Uuid) -> anyhow::Result<()>;
    async fn delete_watch(&self, id: Uuid) -> anyhow::Result<()>;
    async fn active_watches(&self, target: WatchTarget) -> anyhow::Result<Vec<Watch>>;
}

/// Fire-and-forget event publication.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ForumEvent);
    /// Asks the owner of a new email watch to confirm it.
    fn confirm_watch(&self, watch_id: Uuid);
}

/// Outbound mail transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}
