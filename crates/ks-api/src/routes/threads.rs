use super::PageQuery;
use crate::error::Result;
use crate::extract::{Caller, Json, Path, Query};
use crate::{ApiRouter, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use ks_core::events::Watch;
use ks_core::models::{Post, Thread, ThreadView};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> ApiRouter {
    Router::new()
        .route(
            "/forums/{slug}/threads/{thread}",
            get(get_thread).patch(edit_title).delete(delete_thread),
        )
        .route("/forums/{slug}/threads/{thread}/replies", post(reply))
        .route("/forums/{slug}/threads/{thread}/lock", post(toggle_lock))
        .route("/forums/{slug}/threads/{thread}/sticky", post(toggle_sticky))
        .route("/forums/{slug}/threads/{thread}/move", post(move_thread))
        .route(
            "/forums/{slug}/threads/{thread}/watch",
            post(watch_thread).delete(unwatch_thread),
        )
}

async fn get_thread(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ThreadView>> {
    Ok(Json(
        state
            .service
            .get_thread(&actor, &slug, thread_id, query.page)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct TitleInput {
    title: String,
}

async fn edit_title(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
    Json(input): Json<TitleInput>,
) -> Result<Json<Thread>> {
    Ok(Json(
        state
            .service
            .edit_thread_title(&actor, &slug, thread_id, &input.title)
            .await?,
    ))
}

async fn delete_thread(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
) -> Result<StatusCode> {
    state.service.delete_thread(&actor, &slug, thread_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentInput {
    pub content: String,
}

async fn reply(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
    Json(input): Json<ContentInput>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = state
        .service
        .reply(&actor, &slug, thread_id, &input.content)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn toggle_lock(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
) -> Result<Json<Thread>> {
    Ok(Json(state.service.toggle_lock(&actor, &slug, thread_id).await?))
}

async fn toggle_sticky(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
) -> Result<Json<Thread>> {
    Ok(Json(state.service.toggle_sticky(&actor, &slug, thread_id).await?))
}

#[derive(Debug, Deserialize)]
struct MoveInput {
    /// Slug of the destination forum
    forum: String,
}

async fn move_thread(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
    Json(input): Json<MoveInput>,
) -> Result<Json<Thread>> {
    Ok(Json(
        state
            .service
            .move_thread(&actor, &slug, thread_id, &input.forum)
            .await?,
    ))
}

async fn watch_thread(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
) -> Result<Json<Watch>> {
    Ok(Json(
        state.service.watch(&actor, &slug, Some(thread_id)).await?,
    ))
}

async fn unwatch_thread(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id)): Path<(String, Uuid)>,
) -> Result<StatusCode> {
    state
        .service
        .unwatch(&actor, &slug, Some(thread_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
