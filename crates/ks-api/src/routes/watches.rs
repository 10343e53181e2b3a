use crate::error::Result;
use crate::extract::{Caller, Json, Path, Query};
use crate::{ApiRouter, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use ks_core::events::Watch;
use ks_services::EmailWatchRequest;
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> ApiRouter {
    Router::new()
        .route("/watches", post(watch_by_email))
        .route("/watches/{id}/activate", get(activate).post(activate))
        .route("/watches/{id}/unsubscribe", get(unsubscribe).post(unsubscribe))
}

async fn watch_by_email(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Json(request): Json<EmailWatchRequest>,
) -> Result<(StatusCode, Json<Watch>)> {
    let watch = state.service.watch_by_email(&actor, request).await?;
    Ok((StatusCode::ACCEPTED, Json(watch)))
}

/// The secret travels in the query string so the mailed links, which a
/// mail client opens with GET, work as-is.
#[derive(Debug, Deserialize)]
struct SecretQuery {
    secret: String,
}

async fn activate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SecretQuery>,
) -> Result<StatusCode> {
    state.service.activate_watch(id, &query.secret).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unsubscribe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SecretQuery>,
) -> Result<StatusCode> {
    state.service.unsubscribe(id, &query.secret).await?;
    Ok(StatusCode::NO_CONTENT)
}
