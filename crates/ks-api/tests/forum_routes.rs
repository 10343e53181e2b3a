use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use ks_api::{app, AppState, USER_HEADER};
use ks_core::events::ForumEvent;
use ks_core::models::User;
use ks_core::traits::{EventSink, UserRepo, WatchRepo};
use ks_db_sqlite::SqliteForumRepo;
use ks_services::ForumService;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ForumEvent>>,
    confirmations: Mutex<Vec<Uuid>>,
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ForumEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn confirm_watch(&self, watch_id: Uuid) {
        self.confirmations.lock().unwrap().push(watch_id);
    }
}

struct TestApp {
    router: Router,
    repo: Arc<SqliteForumRepo>,
    sink: Arc<RecordingSink>,
    admin: Uuid,
}

impl TestApp {
    async fn new() -> Self {
        let repo = Arc::new(SqliteForumRepo::in_memory().await.unwrap());
        let sink = Arc::new(RecordingSink::default());
        let service = ForumService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            sink.clone(),
        );
        let router = app(AppState {
            service: Arc::new(service),
        });
        let mut app = Self {
            router,
            repo,
            sink,
            admin: Uuid::nil(),
        };
        app.admin = app.user("admin", true).await;
        app
    }

    async fn user(&self, name: &str, is_superuser: bool) -> Uuid {
        let user = User {
            id: Uuid::now_v7(),
            username: name.to_string(),
            email: format!("{name}@example.org"),
            is_active: true,
            is_superuser,
            watch_new_thread: false,
            watch_after_reply: false,
        };
        let id = user.id;
        self.repo.create_user(user).await.unwrap();
        id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(id) = user {
            request = request.header(USER_HEADER, id.to_string());
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn forum(&self, slug: &str) {
        let (status, _) = self
            .send(
                Method::POST,
                "/forums",
                Some(self.admin),
                Some(json!({ "name": slug.to_uppercase(), "slug": slug })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    /// Returns the thread id and the id of its opening post.
    async fn thread(&self, slug: &str, user: Uuid) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/forums/{slug}/threads"),
                Some(user),
                Some(json!({ "title": "Bookmarks vanished", "content": "All of them, overnight." })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["thread"]["id"].as_str().unwrap().to_string(),
            body["post"]["id"].as_str().unwrap().to_string(),
        )
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_reply_moves_last_post_pointers() {
    let app = TestApp::new().await;
    app.forum("firefox").await;
    let asker = app.user("asker", false).await;
    let helper = app.user("helper", false).await;
    let (thread_id, _) = app.thread("firefox", asker).await;

    let (status, reply) = app
        .send(
            Method::POST,
            &format!("/forums/firefox/threads/{thread_id}/replies"),
            Some(helper),
            Some(json!({ "content": "Check the places database." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, view) = app
        .send(
            Method::GET,
            &format!("/forums/firefox/threads/{thread_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(view["thread"]["replies"], 1);
    assert_eq!(view["thread"]["last_post_id"], reply["id"]);
    assert_eq!(view["posts"].as_array().unwrap().len(), 2);

    let (_, forum) = app.send(Method::GET, "/forums/firefox", None, None).await;
    assert_eq!(forum["last_post_id"], reply["id"]);
    assert_eq!(app.sink.events.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_locked_thread_rejects_replies() {
    let app = TestApp::new().await;
    app.forum("firefox").await;
    let asker = app.user("asker", false).await;
    let (thread_id, _) = app.thread("firefox", asker).await;

    let (status, thread) = app
        .send(
            Method::POST,
            &format!("/forums/firefox/threads/{thread_id}/lock"),
            Some(app.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["is_locked"], true);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/forums/firefox/threads/{thread_id}/replies"),
            Some(asker),
            Some(json!({ "content": "Any news on this?" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "thread_locked");
}

#[tokio::test]
async fn test_restricted_forum_is_hidden() {
    let app = TestApp::new().await;
    app.forum("staff").await;
    app.forum("firefox").await;
    let (_, staff) = app.send(Method::GET, "/forums/staff", None, None).await;
    let moderator = app.user("moderator", false).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/grants",
            Some(app.admin),
            Some(json!({
                "grantee": { "kind": "user", "id": moderator },
                "permission": "view_in_forum",
                "forum_id": staff["id"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(Method::GET, "/forums/staff", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(Method::GET, "/forums/staff", Some(moderator), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = app.send(Method::GET, "/forums", None, None).await;
    let slugs: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["slug"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(slugs, vec!["firefox"]);
}

#[tokio::test]
async fn test_anonymous_and_unknown_callers_cannot_post() {
    let app = TestApp::new().await;
    app.forum("firefox").await;
    let body = json!({ "title": "Bookmarks vanished", "content": "All of them." });

    let (status, _) = app
        .send(Method::POST, "/forums/firefox/threads", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            "/forums/firefox/threads",
            Some(Uuid::now_v7()),
            Some(body),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_short_title_is_a_validation_error() {
    let app = TestApp::new().await;
    app.forum("firefox").await;
    let asker = app.user("asker", false).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/forums/firefox/threads",
            Some(asker),
            Some(json!({ "title": "Hm", "content": "All of them." })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_deleting_the_only_post_removes_the_thread() {
    let app = TestApp::new().await;
    app.forum("firefox").await;
    let asker = app.user("asker", false).await;
    let (thread_id, post_id) = app.thread("firefox", asker).await;
    let (status, _) = app
        .send(
            Method::POST,
            "/grants",
            Some(app.admin),
            Some(json!({
                "grantee": { "kind": "user", "id": asker },
                "permission": "post_delete_forum",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, deletion) = app
        .send(
            Method::DELETE,
            &format!("/forums/firefox/threads/{thread_id}/posts/{post_id}"),
            Some(asker),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deletion["thread_deleted"], true);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/forums/firefox/threads/{thread_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, forum) = app.send(Method::GET, "/forums/firefox", None, None).await;
    assert_eq!(forum["last_post_id"], Value::Null);
}

#[tokio::test]
async fn test_email_watch_needs_the_right_secret() {
    let app = TestApp::new().await;
    app.forum("firefox").await;

    let (status, watch) = app
        .send(
            Method::POST,
            "/watches",
            None,
            Some(json!({ "forum": "firefox", "email": "anon@example.org" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(watch["is_active"], false);
    assert!(watch.get("secret").is_none());
    let id: Uuid = watch["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(*app.sink.confirmations.lock().unwrap(), vec![id]);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/watches/{id}/activate?secret=guess"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let secret = app.repo.get_watch(id).await.unwrap().unwrap().secret;
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/watches/{id}/activate?secret={secret}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.repo.get_watch(id).await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn test_mailed_links_work_with_get() {
    let app = TestApp::new().await;
    app.forum("firefox").await;

    let (_, watch) = app
        .send(
            Method::POST,
            "/watches",
            None,
            Some(json!({ "forum": "firefox", "email": "anon@example.org" })),
        )
        .await;
    let id: Uuid = watch["id"].as_str().unwrap().parse().unwrap();
    let secret = app.repo.get_watch(id).await.unwrap().unwrap().secret;

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/watches/{id}/activate?secret={secret}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.repo.get_watch(id).await.unwrap().unwrap().is_active);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/watches/{id}/unsubscribe?secret={secret}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.repo.get_watch(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_user_header_is_rejected() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/forums")
        .header(USER_HEADER, "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
