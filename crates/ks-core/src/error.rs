//! # AppError
//!
//! Centralized error handling for the Kitsune forums.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all ks-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found or not visible to the caller (e.g., Forum, Thread, Post)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., title too short, bad slug)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The caller must be a known, active user
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is known but lacks the permission
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// New posts and edits are rejected while the thread is locked
    #[error("thread {0} is locked")]
    ThreadLocked(Uuid),

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Resource already exists (e.g., duplicate forum slug)
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }
}

/// A specialized Result type for Kitsune logic.
pub type Result<T> = std::result::Result<T, AppError>;
