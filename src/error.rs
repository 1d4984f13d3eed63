use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Could not find '{0}' on Spotify")]
    SeedNotFound(String),

    #[error("Failed to get valid recommendations after {0} attempts")]
    GenerationFailed(u32),

    #[error("Spotify session expired or missing - re-authenticate")]
    AuthExpired,

    #[error("Spotify error: {0}")]
    Catalog(String),

    #[error("Gemini error: {0}")]
    Ai(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::SeedNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::GenerationFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::AuthExpired => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Catalog(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Ai(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Queue(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unsupported(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
