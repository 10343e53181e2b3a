//! # Domain Models
//!
//! These structs represent the core entities of the Kitsune forums.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A discussion forum (e.g., "Firefox", "Contributors").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    pub id: Uuid,
    pub name: String,
    /// The URL slug (e.g., "firefox")
    pub slug: String,
    pub description: String,
    /// Newest post across every thread of this forum
    pub last_post_id: Option<Uuid>,
    pub display_order: i32,
    /// Unlisted forums stay reachable by slug but are left out of the index
    pub is_listed: bool,
}

/// Input for creating a forum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewForum {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "listed_by_default")]
    pub is_listed: bool,
}

fn listed_by_default() -> bool {
    true
}

/// A Thread contains an ordered collection of Posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub forum_id: Uuid,
    pub title: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_post_id: Option<Uuid>,
    /// Number of posts minus the opening one
    pub replies: u32,
    pub is_locked: bool,
    pub is_sticky: bool,
}

/// A single message in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl Post {
    /// A fresh post timestamped now.
    pub fn new(thread_id: Uuid, author_id: Uuid, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            thread_id,
            author_id,
            content,
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }
}

/// A registered community member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    /// Watch threads this user starts
    pub watch_new_thread: bool,
    /// Watch threads this user replies to
    pub watch_after_reply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
}

/// One page of a forum's thread listing.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadPage {
    pub forum: Forum,
    pub threads: Vec<Thread>,
    pub page: u32,
    pub total_threads: u64,
}

/// A thread together with one page of its posts.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    pub forum: Forum,
    pub thread: Thread,
    pub posts: Vec<Post>,
    pub page: u32,
    pub last_page: u32,
}

/// Where a post can be found for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostLocation {
    pub forum_slug: String,
    pub thread_id: Uuid,
    pub post_id: Uuid,
    pub page: u32,
}

/// Result of deleting a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostDeletion {
    pub post_id: Uuid,
    pub thread_id: Uuid,
    /// The post was the thread's only one, so the thread went with it
    pub thread_deleted: bool,
}
