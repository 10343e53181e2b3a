use crate::error::Result;
use crate::extract::{Caller, Json};
use crate::{ApiRouter, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use ks_core::permissions::Grant;

pub fn routes() -> ApiRouter {
    Router::new().route("/grants", post(grant).delete(revoke))
}

async fn grant(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Json(grant): Json<Grant>,
) -> Result<StatusCode> {
    state.service.grant(&actor, grant).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Json(grant): Json<Grant>,
) -> Result<StatusCode> {
    if state.service.revoke(&actor, grant).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
