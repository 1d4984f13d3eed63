use crate::error::{AppError, Result};
use crate::models::{PlaybackDevice, Track};
use crate::services::session::Session;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// The catalog/search/queue side of the pipeline, kept behind a trait so
/// runs can be driven against an in-memory fake in tests.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Ranked track candidates for a search query.
    async fn search(&self, session: &Session, query: &str, limit: usize) -> Result<Vec<Track>>;

    /// Append a track to the user's active playback queue.
    async fn queue_track(&self, session: &Session, uri: &str) -> Result<()>;

    /// The user's known playback devices.
    async fn devices(&self, session: &Session) -> Result<Vec<PlaybackDevice>>;

    /// Start playback on a specific device (used to wake an inactive one).
    async fn start_playback(&self, session: &Session, device_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: String,
    name: String,
    uri: String,
    #[serde(default)]
    popularity: u32,
    #[serde(default)]
    artists: Vec<ArtistItem>,
    album: Option<AlbumItem>,
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<DeviceItem>,
}

#[derive(Debug, Deserialize)]
struct DeviceItem {
    id: Option<String>,
    name: String,
    #[serde(default)]
    is_active: bool,
}

impl From<TrackItem> for Track {
    fn from(item: TrackItem) -> Self {
        let (album, image_url) = match item.album {
            Some(album) => (album.name, album.images.into_iter().next().map(|i| i.url)),
            None => (String::new(), None),
        };
        Track {
            id: item.id,
            name: item.name,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
            album,
            uri: item.uri,
            popularity: item.popularity,
            preview_url: item.preview_url,
            image_url,
        }
    }
}

impl SpotifyClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { base_url, client }
    }

    /// Map an error status to the run-level taxonomy. 401 means the
    /// caller's token died mid-run, which aborts everything.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(AppError::AuthExpired),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Spotify API error: {} - {}", status, body);
                Err(AppError::Catalog(format!(
                    "API returned status: {} - {}",
                    status,
                    &body[..body.len().min(200)]
                )))
            }
        }
    }
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn search(&self, session: &Session, query: &str, limit: usize) -> Result<Vec<Track>> {
        let url = format!("{}/search", self.base_url);

        tracing::debug!("Searching Spotify: {}", query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Catalog(format!("Request failed: {}", e)))?;

        let response = Self::check_status(response).await?;

        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Catalog(format!("Failed to parse search response: {}", e)))?;

        tracing::debug!("Found {} candidates for query: {}", data.tracks.items.len(), query);

        Ok(data.tracks.items.into_iter().map(Track::from).collect())
    }

    async fn queue_track(&self, session: &Session, uri: &str) -> Result<()> {
        let url = format!("{}/me/player/queue", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .query(&[("uri", uri)])
            .send()
            .await
            .map_err(|e| AppError::Queue(format!("Request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(AppError::AuthExpired),
            StatusCode::NOT_FOUND => Err(AppError::Queue(
                "No active playback device - open Spotify on a device first".to_string(),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Queue(format!(
                    "Queue request returned {}: {}",
                    status,
                    &body[..body.len().min(200)]
                )))
            }
        }
    }

    async fn devices(&self, session: &Session) -> Result<Vec<PlaybackDevice>> {
        let url = format!("{}/me/player/devices", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AppError::Catalog(format!("Request failed: {}", e)))?;

        let response = Self::check_status(response).await?;

        let data: DevicesResponse = response
            .json()
            .await
            .map_err(|e| AppError::Catalog(format!("Failed to parse devices response: {}", e)))?;

        Ok(data
            .devices
            .into_iter()
            .filter_map(|d| {
                d.id.map(|id| PlaybackDevice {
                    id,
                    name: d.name,
                    is_active: d.is_active,
                })
            })
            .collect())
    }

    async fn start_playback(&self, session: &Session, device_id: &str) -> Result<()> {
        let url = format!("{}/me/player/play", self.base_url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&session.access_token)
            .query(&[("device_id", device_id)])
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AppError::Catalog(format!("Request failed: {}", e)))?;

        Self::check_status(response).await?;
        Ok(())
    }
}
