use ks_core::bookkeeping::{page_of_position, POSTS_PER_PAGE};
use ks_core::events::{ForumEvent, OutgoingMail, Watch, WatchTarget};
use ks_core::models::{Forum, Post, Thread};
use ks_core::permissions::{AccessTable, Actor};
use ks_core::traits::{AccessRepo, ForumRepo, Mailer, UserRepo, WatchRepo};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Public base URL used to build links, without a trailing slash
    pub site_url: String,
    pub from_address: String,
}

/// Resolves the watchers of an event and mails each of them once.
pub struct Notifier {
    forums: Arc<dyn ForumRepo>,
    users: Arc<dyn UserRepo>,
    access: Arc<dyn AccessRepo>,
    watches: Arc<dyn WatchRepo>,
    mailer: Arc<dyn Mailer>,
    settings: NotifierSettings,
}

/// What every message for one event shares.
struct Context {
    forum: Forum,
    thread: Thread,
    post: Post,
    author: String,
    page: u32,
}

impl Notifier {
    pub fn new(
        forums: Arc<dyn ForumRepo>,
        users: Arc<dyn UserRepo>,
        access: Arc<dyn AccessRepo>,
        watches: Arc<dyn WatchRepo>,
        mailer: Arc<dyn Mailer>,
        mut settings: NotifierSettings,
    ) -> Self {
        settings.site_url = settings.site_url.trim_end_matches('/').to_string();
        Self {
            forums,
            users,
            access,
            watches,
            mailer,
            settings,
        }
    }

    /// Returns the number of messages handed to the mailer.
    ///
    /// Events whose forum, thread or post has disappeared in the meantime are
    /// dropped silently. A failed send is logged and does not stop delivery to
    /// the remaining watchers.
    pub async fn deliver(&self, event: ForumEvent) -> anyhow::Result<usize> {
        let Some(ctx) = self.context(&event).await? else {
            debug!(?event, "event target vanished before delivery");
            return Ok(0);
        };

        let grants = self.access.grants_for_forum(ctx.forum.id).await?;
        let table = AccessTable::new(ctx.forum.id, grants);

        let mut seen = HashSet::new();
        if let Some(author) = self.users.get_user(event.author_id()).await? {
            seen.insert(author.email.to_lowercase());
        }

        let mut sent = 0;
        for watch in self.watches.active_watches(event.target()).await? {
            if watch.user_id == Some(event.author_id()) {
                continue;
            }
            let Some((address, actor)) = self.recipient(&watch).await? else {
                continue;
            };
            if !table.allows_viewing_by(&actor) || !seen.insert(address.to_lowercase()) {
                continue;
            }

            let mail = self.render(&event, &ctx, &watch, address);
            match self.mailer.send(mail).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(error = %e, watch_id = %watch.id, "failed to send notification"),
            }
        }

        info!(kind = event.target().kind(), post_id = %ctx.post.id, sent, "notifications sent");
        Ok(sent)
    }

    /// Mails the activation link of an inactive email watch. Returns whether
    /// a message was sent.
    pub async fn confirm(&self, watch_id: Uuid) -> anyhow::Result<bool> {
        let Some(watch) = self.watches.get_watch(watch_id).await? else {
            return Ok(false);
        };
        let Some(email) = watch.email.clone().filter(|_| !watch.is_active) else {
            return Ok(false);
        };
        let subject = match watch.target {
            WatchTarget::Forum(id) => self
                .forums
                .get_forum_by_id(id)
                .await?
                .map(|f| format!("new threads in {}", f.name)),
            WatchTarget::Thread(id) => self
                .forums
                .get_thread(id)
                .await?
                .map(|t| format!("replies to \"{}\"", t.title)),
        };
        let Some(subject) = subject else {
            return Ok(false);
        };

        let site = &self.settings.site_url;
        let body = format!(
            "Someone asked to be notified about {subject} at this address.\n\n\
             Confirm: {site}/watches/{id}/activate?secret={secret}\n\n\
             If this was not you, ignore this message or cancel it: \
             {site}/watches/{id}/unsubscribe?secret={secret}\n",
            id = watch.id,
            secret = watch.secret,
        );
        self.mailer
            .send(OutgoingMail {
                from: self.settings.from_address.clone(),
                to: email,
                subject: format!("Confirm your subscription to {subject}"),
                body,
            })
            .await?;
        info!(watch_id = %watch.id, "watch confirmation sent");
        Ok(true)
    }

    async fn context(&self, event: &ForumEvent) -> anyhow::Result<Option<Context>> {
        let Some(forum) = self.forums.get_forum_by_id(event.forum_id()).await? else {
            return Ok(None);
        };
        let Some(thread) = self.forums.get_thread(event.thread_id()).await? else {
            return Ok(None);
        };
        let Some(post) = self.forums.get_post(event.post_id()).await? else {
            return Ok(None);
        };
        let position = self.forums.post_position(&post).await?;
        let author = self
            .users
            .get_user(event.author_id())
            .await?
            .map(|u| u.username)
            .unwrap_or_else(|| "Someone".to_string());

        Ok(Some(Context {
            forum,
            thread,
            post,
            author,
            page: page_of_position(position, POSTS_PER_PAGE),
        }))
    }

    /// Email-only watchers are judged as anonymous visitors.
    async fn recipient(&self, watch: &Watch) -> anyhow::Result<Option<(String, Actor)>> {
        match (watch.user_id, &watch.email) {
            (Some(user_id), _) => {
                let Some(user) = self.users.get_user(user_id).await? else {
                    return Ok(None);
                };
                if !user.is_active {
                    return Ok(None);
                }
                let groups = self.users.user_groups(user.id).await?;
                Ok(Some((user.email.clone(), Actor::user(user, groups))))
            }
            (None, Some(email)) => Ok(Some((email.clone(), Actor::anonymous()))),
            (None, None) => Ok(None),
        }
    }

    fn render(&self, event: &ForumEvent, ctx: &Context, watch: &Watch, to: String) -> OutgoingMail {
        let site = &self.settings.site_url;
        let (subject, action) = match event {
            ForumEvent::NewThread { .. } => (
                format!("[{}] New thread: {}", ctx.forum.name, ctx.thread.title),
                "started a new thread",
            ),
            ForumEvent::NewPost { .. } => (
                format!("[{}] Re: {}", ctx.forum.name, ctx.thread.title),
                "replied to",
            ),
        };
        let link = format!(
            "{site}/forums/{}/threads/{}?page={}#post-{}",
            ctx.forum.slug, ctx.thread.id, ctx.page, ctx.post.id
        );
        let unsubscribe = format!(
            "{site}/watches/{}/unsubscribe?secret={}",
            watch.id, watch.secret
        );
        let body = format!(
            "{} {action} \"{}\" in {}:\n\n{}\n\nView it at {link}\n\n--\nUnsubscribe: {unsubscribe}\n",
            ctx.author, ctx.thread.title, ctx.forum.name, ctx.post.content
        );

        OutgoingMail {
            from: self.settings.from_address.clone(),
            to,
            subject,
            body,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ks_core::models::User;
    use ks_core::permissions::{ForumPermission, Grant, Grantee};
    use ks_core::traits::{
        MockAccessRepo, MockForumRepo, MockMailer, MockUserRepo, MockWatchRepo,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    impl RecordingMailer {
        pub(crate) fn sent(&self) -> Vec<OutgoingMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(mail);
            Ok(())
        }
    }

    fn user(name: &str) -> User {
        User {
            id: Uuid::now_v7(),
            username: name.to_string(),
            email: format!("{name}@example.org"),
            is_active: true,
            is_superuser: false,
            watch_new_thread: false,
            watch_after_reply: false,
        }
    }

    struct Scene {
        forum: Forum,
        thread: Thread,
        post: Post,
        author: User,
        users: Vec<User>,
        grants: Vec<Grant>,
        watches: Vec<Watch>,
        /// Zero-based position of `post` in its thread
        position: u64,
    }

    impl Scene {
        fn new() -> Self {
            let author = user("author");
            let forum = Forum {
                id: Uuid::now_v7(),
                name: "Firefox".into(),
                slug: "firefox".into(),
                description: String::new(),
                last_post_id: None,
                display_order: 1,
                is_listed: true,
            };
            let thread = Thread {
                id: Uuid::now_v7(),
                forum_id: forum.id,
                title: "Sync keeps failing".into(),
                creator_id: author.id,
                created_at: Utc::now(),
                last_post_id: None,
                replies: 0,
                is_locked: false,
                is_sticky: false,
            };
            let post = Post::new(thread.id, author.id, "Have you tried a new profile?".into());
            Self {
                forum,
                thread,
                post,
                users: vec![author.clone()],
                author,
                grants: vec![],
                watches: vec![],
                position: 0,
            }
        }

        fn reply(&self) -> ForumEvent {
            ForumEvent::NewPost {
                forum_id: self.forum.id,
                thread_id: self.thread.id,
                post_id: self.post.id,
                author_id: self.author.id,
            }
        }

        fn watch(&mut self, watcher: &User) -> Watch {
            let watch = Watch::for_user(WatchTarget::Thread(self.thread.id), watcher.id);
            self.users.push(watcher.clone());
            self.watches.push(watch.clone());
            watch
        }

        fn watch_by_email(&mut self, email: &str) {
            let mut watch = Watch::for_email(WatchTarget::Thread(self.thread.id), email.into());
            watch.is_active = true;
            self.watches.push(watch);
        }

        fn notifier(self, mailer: Arc<dyn Mailer>) -> Notifier {
            let mut forums = MockForumRepo::new();
            let mut users = MockUserRepo::new();
            let mut access = MockAccessRepo::new();
            let mut watches = MockWatchRepo::new();

            let Scene {
                forum,
                thread,
                post,
                users: known,
                grants,
                watches: active,
                position,
                ..
            } = self;
            forums
                .expect_get_forum_by_id()
                .returning(move |_| Ok(Some(forum.clone())));
            forums
                .expect_get_thread()
                .returning(move |_| Ok(Some(thread.clone())));
            forums
                .expect_get_post()
                .returning(move |_| Ok(Some(post.clone())));
            forums
                .expect_post_position()
                .returning(move |_| Ok(position));
            users
                .expect_get_user()
                .returning(move |id| Ok(known.iter().find(|u| u.id == id).cloned()));
            users.expect_user_groups().returning(|_| Ok(vec![]));
            access
                .expect_grants_for_forum()
                .returning(move |_| Ok(grants.clone()));
            watches
                .expect_active_watches()
                .returning(move |_| Ok(active.clone()));

            Notifier::new(
                Arc::new(forums),
                Arc::new(users),
                Arc::new(access),
                Arc::new(watches),
                mailer,
                NotifierSettings {
                    site_url: "https://support.example.org/".into(),
                    from_address: "notifications@support.example.org".into(),
                },
            )
        }
    }

    /// One author watch and one other watcher: exactly one message.
    pub(crate) fn fixture(mailer: Arc<RecordingMailer>) -> (Notifier, ForumEvent) {
        let mut scene = Scene::new();
        let author = scene.author.clone();
        scene.watch(&author);
        scene.watch(&user("watcher"));
        let event = scene.reply();
        (scene.notifier(mailer), event)
    }

    #[tokio::test]
    async fn test_author_is_not_notified_of_own_post() {
        let mailer = Arc::new(RecordingMailer::default());
        let (notifier, event) = fixture(mailer.clone());

        assert_eq!(notifier.deliver(event).await.unwrap(), 1);
        let sent = mailer.sent();
        assert_eq!(sent[0].to, "watcher@example.org");
        assert_eq!(sent[0].subject, "[Firefox] Re: Sync keeps failing");
    }

    #[tokio::test]
    async fn test_message_links_to_the_page_holding_the_post() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut scene = Scene::new();
        scene.position = 45;
        let watch = scene.watch(&user("watcher"));
        let (thread_id, post_id) = (scene.thread.id, scene.post.id);
        let event = scene.reply();
        scene.notifier(mailer.clone()).deliver(event).await.unwrap();

        let body = &mailer.sent()[0].body;
        assert!(body.contains(&format!(
            "https://support.example.org/forums/firefox/threads/{thread_id}?page=3#post-{post_id}"
        )));
        assert!(body.contains(&format!(
            "https://support.example.org/watches/{}/unsubscribe?secret={}",
            watch.id, watch.secret
        )));
        assert!(body.contains("Have you tried a new profile?"));
    }

    #[tokio::test]
    async fn test_each_address_is_mailed_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut scene = Scene::new();
        scene.watch(&user("watcher"));
        scene.watch_by_email("Watcher@Example.org");
        scene.watch_by_email("AUTHOR@example.org");
        let event = scene.reply();

        let sent = scene.notifier(mailer.clone()).deliver(event).await.unwrap();
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn test_watchers_who_cannot_view_are_skipped() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut scene = Scene::new();
        let insider = user("insider");
        scene.grants.push(Grant {
            grantee: Grantee::User(insider.id),
            permission: ForumPermission::ViewInForum,
            forum_id: Some(scene.forum.id),
        });
        scene.watch(&insider);
        scene.watch(&user("outsider"));
        scene.watch_by_email("anon@example.org");
        let event = scene.reply();

        scene.notifier(mailer.clone()).deliver(event).await.unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "insider@example.org");
    }

    #[tokio::test]
    async fn test_inactive_users_are_skipped() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut scene = Scene::new();
        let mut banned = user("banned");
        banned.is_active = false;
        scene.watch(&banned);
        let event = scene.reply();

        let sent = scene.notifier(mailer.clone()).deliver(event).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_confirmation_links_to_activation() {
        let mailer = Arc::new(RecordingMailer::default());
        let scene = Scene::new();
        let watch = Watch::for_email(WatchTarget::Thread(scene.thread.id), "anon@example.org".into());
        let pending = watch.clone();
        let mut notifier = scene.notifier(mailer.clone());
        let mut watches = MockWatchRepo::new();
        watches
            .expect_get_watch()
            .returning(move |_| Ok(Some(pending.clone())));
        notifier.watches = Arc::new(watches) as Arc<dyn WatchRepo>;

        assert!(notifier.confirm(watch.id).await.unwrap());
        let sent = mailer.sent();
        assert_eq!(sent[0].to, "anon@example.org");
        assert!(sent[0].body.contains(&format!(
            "https://support.example.org/watches/{}/activate?secret={}",
            watch.id, watch.secret
        )));
    }

    #[tokio::test]
    async fn test_active_watches_are_not_reconfirmed() {
        let mailer = Arc::new(RecordingMailer::default());
        let scene = Scene::new();
        let mut watch = Watch::for_email(WatchTarget::Forum(scene.forum.id), "anon@example.org".into());
        watch.is_active = true;
        let id = watch.id;
        let mut notifier = scene.notifier(mailer.clone());
        let mut watches = MockWatchRepo::new();
        watches
            .expect_get_watch()
            .returning(move |_| Ok(Some(watch.clone())));
        notifier.watches = Arc::new(watches) as Arc<dyn WatchRepo>;

        assert!(!notifier.confirm(id).await.unwrap());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_delivery() {
        let mut scene = Scene::new();
        scene.watch(&user("first"));
        scene.watch(&user("second"));
        let event = scene.reply();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(2)
            .returning(|mail| {
                if mail.to.starts_with("first") {
                    Err(anyhow::anyhow!("connection refused"))
                } else {
                    Ok(())
                }
            });

        let sent = scene.notifier(Arc::new(mailer)).deliver(event).await.unwrap();
        assert_eq!(sent, 1);
    }
}
