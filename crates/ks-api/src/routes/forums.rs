use super::PageQuery;
use crate::error::Result;
use crate::extract::{Caller, Json, Path, Query};
use crate::{ApiRouter, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use ks_core::events::Watch;
use ks_core::models::{Forum, NewForum, Post, Thread, ThreadPage};
use ks_services::NewThread;
use serde::Serialize;

pub fn routes() -> ApiRouter {
    Router::new()
        .route("/forums", get(list_forums).post(create_forum))
        .route("/forums/{slug}", get(get_forum))
        .route("/forums/{slug}/threads", get(list_threads).post(new_thread))
        .route("/forums/{slug}/watch", post(watch_forum).delete(unwatch_forum))
}

async fn list_forums(State(state): State<AppState>, Caller(actor): Caller) -> Result<Json<Vec<Forum>>> {
    Ok(Json(state.service.list_forums(&actor).await?))
}

async fn create_forum(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<NewForum>,
) -> Result<(StatusCode, Json<Forum>)> {
    let forum = state.service.create_forum(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(forum)))
}

async fn get_forum(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(slug): Path<String>,
) -> Result<Json<Forum>> {
    Ok(Json(state.service.get_forum(&actor, &slug).await?))
}

async fn list_threads(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ThreadPage>> {
    Ok(Json(
        state.service.list_threads(&actor, &slug, query.page).await?,
    ))
}

#[derive(Debug, Serialize)]
struct CreatedThread {
    thread: Thread,
    post: Post,
}

async fn new_thread(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(slug): Path<String>,
    Json(input): Json<NewThread>,
) -> Result<(StatusCode, Json<CreatedThread>)> {
    let (thread, post) = state.service.new_thread(&actor, &slug, input).await?;
    Ok((StatusCode::CREATED, Json(CreatedThread { thread, post })))
}

async fn watch_forum(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(slug): Path<String>,
) -> Result<Json<Watch>> {
    Ok(Json(state.service.watch(&actor, &slug, None).await?))
}

async fn unwatch_forum(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(slug): Path<String>,
) -> Result<StatusCode> {
    state.service.unwatch(&actor, &slug, None).await?;
    Ok(StatusCode::NO_CONTENT)
}
