//! # Events and watches
//!
//! Producers publish a [`ForumEvent`]; the notification worker resolves the
//! [`Watch`]es on the event's target and mails each watcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something happened that watchers may want to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForumEvent {
    /// A reply was added to a thread.
    NewPost {
        forum_id: Uuid,
        thread_id: Uuid,
        post_id: Uuid,
        author_id: Uuid,
    },
    /// A thread was started in a forum.
    NewThread {
        forum_id: Uuid,
        thread_id: Uuid,
        post_id: Uuid,
        author_id: Uuid,
    },
}

impl ForumEvent {
    /// The object whose watchers receive this event.
    pub fn target(&self) -> WatchTarget {
        match self {
            ForumEvent::NewPost { thread_id, .. } => WatchTarget::Thread(*thread_id),
            ForumEvent::NewThread { forum_id, .. } => WatchTarget::Forum(*forum_id),
        }
    }

    /// Whoever caused the event; never notified about it.
    pub fn author_id(&self) -> Uuid {
        match self {
            ForumEvent::NewPost { author_id, .. } | ForumEvent::NewThread { author_id, .. } => {
                *author_id
            }
        }
    }

    pub fn forum_id(&self) -> Uuid {
        match self {
            ForumEvent::NewPost { forum_id, .. } | ForumEvent::NewThread { forum_id, .. } => {
                *forum_id
            }
        }
    }

    pub fn thread_id(&self) -> Uuid {
        match self {
            ForumEvent::NewPost { thread_id, .. } | ForumEvent::NewThread { thread_id, .. } => {
                *thread_id
            }
        }
    }

    pub fn post_id(&self) -> Uuid {
        match self {
            ForumEvent::NewPost { post_id, .. } | ForumEvent::NewThread { post_id, .. } => *post_id,
        }
    }
}

/// What a watch is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WatchTarget {
    /// New posts in the thread
    Thread(Uuid),
    /// New threads in the forum
    Forum(Uuid),
}

impl WatchTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            WatchTarget::Thread(_) => "thread",
            WatchTarget::Forum(_) => "forum",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            WatchTarget::Thread(id) | WatchTarget::Forum(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "thread" => Some(WatchTarget::Thread(id)),
            "forum" => Some(WatchTarget::Forum(id)),
            _ => None,
        }
    }
}

/// A subscription of a user or of a bare email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub id: Uuid,
    pub target: WatchTarget,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    /// Proves ownership when activating or unsubscribing without logging in
    #[serde(skip_serializing)]
    pub secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Watch {
    pub fn for_user(target: WatchTarget, user_id: Uuid) -> Self {
        Self::build(target, Some(user_id), None, true)
    }

    /// Email-only watches wait for confirmation before they receive mail.
    pub fn for_email(target: WatchTarget, email: String) -> Self {
        Self::build(target, None, Some(email), false)
    }

    fn build(
        target: WatchTarget,
        user_id: Option<Uuid>,
        email: Option<String>,
        is_active: bool,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            target,
            user_id,
            email,
            secret: Uuid::new_v4().simple().to_string(),
            is_active,
            created_at: Utc::now(),
        }
    }
}

/// A rendered notification ready for the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}
