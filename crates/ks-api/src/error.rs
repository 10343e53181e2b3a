use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use ks_core::error::AppError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),
    #[error("unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("path rejected: {0}")]
    Path(#[from] PathRejection),
    #[error("query rejected: {0}")]
    Query(#[from] QueryRejection),
    #[error("incoming JSON rejected: {0}")]
    Json(#[from] JsonRejection),
    #[error("x-kitsune-user is not a user id")]
    InvalidUserHeader,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::App(e) => match e {
                AppError::NotFound(..) => StatusCode::NOT_FOUND,
                AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
                AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                AppError::Forbidden(_) | AppError::ThreadLocked(_) => StatusCode::FORBIDDEN,
                AppError::Conflict(_) => StatusCode::CONFLICT,
                AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::UnknownRoute(_) | ApiError::Path(_) => StatusCode::NOT_FOUND,
            ApiError::Query(_) | ApiError::Json(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidUserHeader => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::App(e) => match e {
                AppError::NotFound(..) => "not_found",
                AppError::ValidationError(_) => "validation_error",
                AppError::Unauthorized(_) => "unauthorized",
                AppError::Forbidden(_) => "forbidden",
                AppError::ThreadLocked(_) => "thread_locked",
                AppError::Conflict(_) => "conflict",
                AppError::Internal(_) => "internal",
            },
            ApiError::UnknownRoute(_) | ApiError::Path(_) => "not_found",
            ApiError::Query(_) | ApiError::Json(_) => "bad_request",
            ApiError::InvalidUserHeader => "unauthorized",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, %status, "replying with error");
            None
        } else {
            warn!(error = %self, %status, "replying with error");
            Some(self.to_string())
        };

        let body = ErrorResponse {
            status: status.as_u16(),
            error: self.kind(),
            message,
        };
        (status, axum::Json(body)).into_response()
    }
}
