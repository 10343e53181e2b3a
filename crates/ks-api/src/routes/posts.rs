use super::threads::ContentInput;
use crate::error::Result;
use crate::extract::{Caller, Json, Path};
use crate::{ApiRouter, AppState};
use axum::extract::State;
use axum::routing::{get, patch};
use axum::Router;
use ks_core::models::{Post, PostDeletion, PostLocation};
use uuid::Uuid;

pub fn routes() -> ApiRouter {
    Router::new()
        .route(
            "/forums/{slug}/threads/{thread}/posts/{post}",
            patch(edit_post).delete(delete_post),
        )
        .route("/posts/{post}/location", get(locate_post))
}

async fn edit_post(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id, post_id)): Path<(String, Uuid, Uuid)>,
    Json(input): Json<ContentInput>,
) -> Result<Json<Post>> {
    Ok(Json(
        state
            .service
            .edit_post(&actor, &slug, thread_id, post_id, &input.content)
            .await?,
    ))
}

/// Reports whether the thread went away with its last post.
async fn delete_post(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, thread_id, post_id)): Path<(String, Uuid, Uuid)>,
) -> Result<Json<PostDeletion>> {
    Ok(Json(
        state
            .service
            .delete_post(&actor, &slug, thread_id, post_id)
            .await?,
    ))
}

async fn locate_post(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostLocation>> {
    Ok(Json(state.service.locate_post(&actor, post_id).await?))
}
