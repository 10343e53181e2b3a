//! # ks-api
//!
//! The JSON-over-HTTP surface of the forums, built on axum. Handlers are thin:
//! they extract the caller and the inputs, call [`ForumService`] and render
//! the result or an [`ApiError`].

mod error;
mod extract;
pub mod middleware;
mod routes;

pub use error::{ApiError, ErrorResponse};
pub use extract::{Caller, USER_HEADER};

use axum::extract::Request;
use axum::Router;
use ks_services::ForumService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ForumService>,
}

pub type ApiRouter = Router<AppState>;

/// The complete application with its middleware stack.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .fallback(fallback)
        .layer(middleware::cors_policy())
        .layer(middleware::propagate_request_id())
        .layer(middleware::trace_layer())
        .layer(middleware::set_request_id())
        .with_state(state)
}

async fn fallback(request: Request) -> ApiError {
    ApiError::UnknownRoute(request.into_parts().0.uri)
}
