//! Error types for the application
//!
//! Most of these never reach a client: every call site maps them to a
//! static fallback. The HTTP mapping exists for the few handlers that
//! surface a failure directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Image failed to load: {0}")]
    ImageLoad(String),

    #[error("All image paths failed for {0}")]
    AllPathsExhausted(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::ImageLoad(_) | AppError::AllPathsExhausted(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::NetworkFailure(_)
            | AppError::ExternalApi(_)
            | AppError::MalformedResponse(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Store(_) | AppError::Config(_) | AppError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, message).into_response()
    }
}
