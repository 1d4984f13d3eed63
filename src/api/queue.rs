use crate::api::recommendations::AppState;
use crate::error::{AppError, Result};
use crate::services::Session;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct AddToQueueRequest {
    track_uri: String,
}

#[derive(Debug, Serialize)]
struct QueueOpResponse {
    success: bool,
    message: String,
}

pub fn queue_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/queue/add", post(add_to_queue))
        .route("/queue/remove", post(remove_from_queue))
}

/// Append one track to the caller's playback queue, waking a device if
/// none is active.
async fn add_to_queue(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<AddToQueueRequest>,
) -> Result<Json<QueueOpResponse>> {
    let devices = state.catalog.devices(&session).await?;
    if devices.is_empty() {
        return Err(AppError::Queue(
            "No Spotify devices found. Please open Spotify on a device first.".to_string(),
        ));
    }

    let device = devices
        .iter()
        .find(|d| d.is_active)
        .unwrap_or(&devices[0]);

    if !device.is_active {
        tracing::info!("No active device, using: {}", device.name);
        if let Err(e) = state.catalog.start_playback(&session, &device.id).await {
            tracing::warn!("Failed to activate device {}: {}", device.name, e);
        }
    }

    state.catalog.queue_track(&session, &request.track_uri).await?;

    tracing::info!("Added {} to queue on {}", request.track_uri, device.name);

    Ok(Json(QueueOpResponse {
        success: true,
        message: format!("Track added to queue on {}", device.name),
    }))
}

/// The playback queue is append-only: Spotify exposes no way to pull an
/// arbitrary queued track back out, so say so instead of pretending.
async fn remove_from_queue(
    State(_state): State<Arc<AppState>>,
    _session: Session,
) -> Result<Json<QueueOpResponse>> {
    Err(AppError::Unsupported(
        "Queued tracks cannot be removed via the Spotify API. Skip them in the Spotify app instead."
            .to_string(),
    ))
}
