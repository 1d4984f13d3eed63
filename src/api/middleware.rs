use crate::error::AppError;
use crate::services::Session;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Pulls the caller's Spotify bearer token into a per-request [`Session`].
/// No token, no pipeline: the run aborts before it starts.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        // Authorization header first, query parameter as a fallback for
        // SSE (EventSource can't send custom headers)
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| {
                parts.uri.query().and_then(|q| {
                    q.split('&')
                        .find(|p| p.starts_with("token="))
                        .and_then(|p| p.strip_prefix("token="))
                })
            })
            .filter(|t| !t.is_empty())
            .ok_or(AppError::AuthExpired)?;

        Ok(Session::new(token))
    }
}
