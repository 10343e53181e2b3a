//! # Permission resolution
//!
//! Grants form an authorization table: (user or group) × permission × optional
//! forum. A grant without a forum is global.
//!
//! Viewing and posting are public by default. As soon as one grant of
//! `view_in_forum` (or `post_in_forum`) exists on a forum, that action is
//! restricted to the grantees.

use crate::models::User;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForumPermission {
    ViewInForum,
    PostInForum,
    ThreadEditForum,
    ThreadDeleteForum,
    ThreadMoveForum,
    ThreadLockedForum,
    ThreadStickyForum,
    PostEditForum,
    PostDeleteForum,
}

impl ForumPermission {
    pub const ALL: [ForumPermission; 9] = [
        ForumPermission::ViewInForum,
        ForumPermission::PostInForum,
        ForumPermission::ThreadEditForum,
        ForumPermission::ThreadDeleteForum,
        ForumPermission::ThreadMoveForum,
        ForumPermission::ThreadLockedForum,
        ForumPermission::ThreadStickyForum,
        ForumPermission::PostEditForum,
        ForumPermission::PostDeleteForum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForumPermission::ViewInForum => "view_in_forum",
            ForumPermission::PostInForum => "post_in_forum",
            ForumPermission::ThreadEditForum => "thread_edit_forum",
            ForumPermission::ThreadDeleteForum => "thread_delete_forum",
            ForumPermission::ThreadMoveForum => "thread_move_forum",
            ForumPermission::ThreadLockedForum => "thread_locked_forum",
            ForumPermission::ThreadStickyForum => "thread_sticky_forum",
            ForumPermission::PostEditForum => "post_edit_forum",
            ForumPermission::PostDeleteForum => "post_delete_forum",
        }
    }
}

impl fmt::Display for ForumPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown forum permission `{0}`")]
pub struct UnknownPermission(pub String);

impl FromStr for ForumPermission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ForumPermission::ALL
            .into_iter()
            .find(|perm| perm.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Who a grant is given to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Grantee {
    User(Uuid),
    Group(Uuid),
}

/// One row of the authorization table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: ForumPermission,
    /// `None` grants the permission on every forum
    pub forum_id: Option<Uuid>,
}

/// The resolved caller of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user: Option<User>,
    pub groups: Vec<Uuid>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user: User, groups: Vec<Uuid>) -> Self {
        Self {
            user: Some(user),
            groups,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_superuser(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_superuser)
    }

    fn matches(&self, grantee: &Grantee) -> bool {
        match grantee {
            Grantee::User(id) => self.user_id() == Some(*id),
            Grantee::Group(id) => self.user.is_some() && self.groups.contains(id),
        }
    }
}

/// The grants relevant to one forum: every global grant plus every grant
/// scoped to that forum.
#[derive(Debug, Clone)]
pub struct AccessTable {
    forum_id: Uuid,
    grants: Vec<Grant>,
}

impl AccessTable {
    pub fn new(forum_id: Uuid, grants: Vec<Grant>) -> Self {
        let grants = grants
            .into_iter()
            .filter(|g| g.forum_id.is_none_or(|id| id == forum_id))
            .collect();
        Self { forum_id, grants }
    }

    /// True if the actor holds `perm` globally or on this forum.
    pub fn has_perm(&self, actor: &Actor, perm: ForumPermission) -> bool {
        if actor.is_superuser() {
            return true;
        }
        self.grants
            .iter()
            .any(|g| g.permission == perm && actor.matches(&g.grantee))
    }

    /// True if anybody holds `perm` scoped to this forum.
    pub fn is_defined_on(&self, perm: ForumPermission) -> bool {
        self.grants
            .iter()
            .any(|g| g.permission == perm && g.forum_id == Some(self.forum_id))
    }

    fn allows(&self, actor: &Actor, perm: ForumPermission) -> bool {
        !self.is_defined_on(perm) || self.has_perm(actor, perm)
    }

    pub fn allows_viewing_by(&self, actor: &Actor) -> bool {
        self.allows(actor, ForumPermission::ViewInForum)
    }

    pub fn allows_posting_by(&self, actor: &Actor) -> bool {
        self.allows(actor, ForumPermission::PostInForum)
    }
}
