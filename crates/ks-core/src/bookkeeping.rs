//! # Denormalized counters
//!
//! `Thread::replies`, `Thread::last_post_id` and `Forum::last_post_id` are
//! caches over the post table. Storage adapters recompute them from a
//! [`ThreadTally`] / [`ForumTally`] inside the transaction of every mutation.
//!
//! "Newest" means greatest `created_at`; equal timestamps fall back to the
//! greater post id, which for UUIDv7 is the later insert.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const THREADS_PER_PAGE: u32 = 20;
pub const POSTS_PER_PAGE: u32 = 20;

/// Ordering key of a post when looking for the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PostStamp {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Picks the newest post among the candidates.
pub fn newest(stamps: impl IntoIterator<Item = PostStamp>) -> Option<Uuid> {
    stamps.into_iter().max().map(|s| s.id)
}

/// What a thread's cached fields should be, given its remaining posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadTally {
    pub post_count: u64,
    pub last_post_id: Option<Uuid>,
}

impl ThreadTally {
    pub fn new(post_count: u64, last_post_id: Option<Uuid>) -> Self {
        Self {
            post_count,
            last_post_id,
        }
    }

    /// Replies never count the opening post.
    pub fn replies(&self) -> u32 {
        u32::try_from(self.post_count.saturating_sub(1)).unwrap_or(u32::MAX)
    }

    /// A thread without posts has nothing left to show and must go.
    pub fn is_orphaned(&self) -> bool {
        self.post_count == 0 || self.last_post_id.is_none()
    }
}

/// What a forum's cached pointer should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForumTally {
    pub last_post_id: Option<Uuid>,
}

/// Clamps a 1-based page number.
pub fn normalize_page(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

/// Row offset of a 1-based page.
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(per_page)
}

/// Page holding the post at a zero-based position within its thread.
pub fn page_of_position(position: u64, per_page: u32) -> u32 {
    u32::try_from(position / u64::from(per_page)).unwrap_or(u32::MAX - 1) + 1
}

/// Last page of a thread with the given reply count.
pub fn last_page(replies: u32) -> u32 {
    let posts = u64::from(replies) + 1;
    u32::try_from(posts.div_ceil(u64::from(POSTS_PER_PAGE))).unwrap_or(u32::MAX)
}
