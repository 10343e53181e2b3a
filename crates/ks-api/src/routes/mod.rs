use crate::ApiRouter;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

mod forums;
mod grants;
mod posts;
mod threads;
mod watches;

pub fn routes() -> ApiRouter {
    Router::new()
        .route("/health", get(health))
        .merge(forums::routes())
        .merge(threads::routes())
        .merge(posts::routes())
        .merge(watches::routes())
        .merge(grants::routes())
}

async fn health() -> &'static str {
    "ok"
}

/// `?page=N`, 1-based. Missing or zero means the first page.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    pub page: Option<u32>,
}
