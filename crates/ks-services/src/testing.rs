//! Mock wiring shared by the service tests.

use crate::ForumService;
use chrono::Utc;
use ks_core::models::{Forum, Post, Thread, User};
use ks_core::permissions::Grant;
use ks_core::traits::{
    MockAccessRepo, MockEventSink, MockForumRepo, MockUserRepo, MockWatchRepo,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub forums: MockForumRepo,
    pub users: MockUserRepo,
    pub access: MockAccessRepo,
    pub watches: MockWatchRepo,
    pub events: MockEventSink,
}

pub fn harness() -> Harness {
    Harness {
        forums: MockForumRepo::new(),
        users: MockUserRepo::new(),
        access: MockAccessRepo::new(),
        watches: MockWatchRepo::new(),
        events: MockEventSink::new(),
    }
}

impl Harness {
    /// Serves `forum` by slug and id, guarded by `grants`.
    pub fn with_forum(&mut self, forum: Forum, grants: Vec<Grant>) {
        let slug = forum.slug.clone();
        let id = forum.id;
        let by_slug = forum.clone();
        self.forums
            .expect_get_forum()
            .withf(move |s| s.to_string() == slug)
            .returning(move |_| Ok(Some(by_slug.clone())));
        self.forums
            .expect_get_forum_by_id()
            .withf(move |i| *i == id)
            .returning(move |_| Ok(Some(forum.clone())));
        self.access
            .expect_grants_for_forum()
            .withf(move |i| *i == id)
            .returning(move |_| Ok(grants.clone()));
    }

    pub fn with_thread(&mut self, thread: Thread) {
        let id = thread.id;
        self.forums
            .expect_get_thread()
            .withf(move |i| *i == id)
            .returning(move |_| Ok(Some(thread.clone())));
    }

    pub fn with_post(&mut self, post: Post) {
        let id = post.id;
        self.forums
            .expect_get_post()
            .withf(move |i| *i == id)
            .returning(move |_| Ok(Some(post.clone())));
    }

    pub fn build(self) -> ForumService {
        ForumService::new(
            Arc::new(self.forums),
            Arc::new(self.users),
            Arc::new(self.access),
            Arc::new(self.watches),
            Arc::new(self.events),
        )
    }
}

pub fn member() -> User {
    User {
        id: Uuid::now_v7(),
        username: "helpful".into(),
        email: "helpful@example.org".into(),
        is_active: true,
        is_superuser: false,
        watch_new_thread: false,
        watch_after_reply: false,
    }
}

pub fn forum(slug: &str) -> Forum {
    Forum {
        id: Uuid::now_v7(),
        name: slug.to_uppercase(),
        slug: slug.to_string(),
        description: String::new(),
        last_post_id: None,
        display_order: 1,
        is_listed: true,
    }
}

pub fn thread(forum: &Forum) -> Thread {
    Thread {
        id: Uuid::now_v7(),
        forum_id: forum.id,
        title: "Sync keeps failing".into(),
        creator_id: Uuid::now_v7(),
        created_at: Utc::now(),
        last_post_id: None,
        replies: 0,
        is_locked: false,
        is_sticky: false,
    }
}

pub fn post(thread: &Thread) -> Post {
    Post::new(thread.id, thread.creator_id, "Original question".into())
}
