use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{RecommendationRequest, RecommendationResponse, StreamEvent};
use crate::services::{Catalog, RecommendationPipeline, Session};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::{stream::Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use validator::Validate;

/// Events buffered between the pipeline and a slow SSE consumer before
/// the producer suspends.
const EVENT_CHANNEL_CAPACITY: usize = 32;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn Catalog>,
    pub pipeline: Arc<RecommendationPipeline>,
}

pub fn recommendation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", post(get_recommendations))
        .route("/recommendations/stream", post(stream_recommendations))
}

/// Aggregate operation: resolve, generate, verify, then queue only what
/// passed. One response with the full picture.
async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    tracing::info!("Getting recommendations for: {}", request.seed_song);

    let response = state.pipeline.aggregate(&session, &request).await?;
    Ok(Json(response))
}

/// Streaming operation: tracks are queued optimistically and delivered as
/// they resolve, with verification arriving in the background.
async fn stream_recommendations(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<RecommendationRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    tracing::info!("Streaming recommendations for: {}", request.seed_song);

    let (tx, rx) = mpsc::channel::<StreamEvent>(EVENT_CHANNEL_CAPACITY);

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.stream(session, request, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
