use crate::models::{Suggestion, Track, VerificationResult};
use serde::{Deserialize, Serialize};

/// One entry in a run's event stream. Events are append-only and ordered
/// by emission; a stream ends with exactly one `complete` or one `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "status")]
    Status { message: String },
    #[serde(rename = "seed")]
    Seed { data: Track },
    #[serde(rename = "track")]
    Track { data: TrackEvent },
    #[serde(rename = "verification")]
    Verification { data: VerificationEvent },
    #[serde(rename = "skip")]
    Skip { data: SkipEvent },
    #[serde(rename = "complete")]
    Complete { data: CompleteEvent },
    #[serde(rename = "error")]
    Error { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEvent {
    /// Position of the originating suggestion in the model's output.
    pub index: usize,
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub uri: String,
    pub popularity: u32,
    pub preview_url: Option<String>,
    pub image_url: Option<String>,
    pub genre: Option<String>,
    pub reason: Option<String>,
    pub added_to_queue: bool,
    pub verification_pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationEvent {
    pub track_id: String,
    pub valid: bool,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipEvent {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteEvent {
    pub added_to_queue: usize,
    pub rejected: usize,
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }

    pub fn track(
        index: usize,
        track: &Track,
        suggestion: &Suggestion,
        added_to_queue: bool,
        verification_pending: bool,
    ) -> Self {
        StreamEvent::Track {
            data: TrackEvent {
                index,
                id: track.id.clone(),
                name: track.name.clone(),
                artists: track.artists.clone(),
                album: track.album.clone(),
                uri: track.uri.clone(),
                popularity: track.popularity,
                preview_url: track.preview_url.clone(),
                image_url: track.image_url.clone(),
                genre: suggestion.genre.clone(),
                reason: suggestion.reason.clone(),
                added_to_queue,
                verification_pending,
            },
        }
    }

    pub fn verification(track_id: &str, result: &VerificationResult) -> Self {
        StreamEvent::Verification {
            data: VerificationEvent {
                track_id: track_id.to_string(),
                valid: result.is_valid,
                confidence: result.confidence,
                reason: result.reason.clone(),
            },
        }
    }

    pub fn skip(title: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamEvent::Skip {
            data: SkipEvent {
                title: title.into(),
                reason: reason.into(),
            },
        }
    }

    pub fn complete(added_to_queue: usize, rejected: usize) -> Self {
        StreamEvent::Complete {
            data: CompleteEvent {
                added_to_queue,
                rejected,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let ev = StreamEvent::status("Searching for seed song...");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "Searching for seed song...");

        let ev = StreamEvent::skip("Starboy", "Not found on Spotify");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "skip");
        assert_eq!(json["data"]["reason"], "Not found on Spotify");

        let ev = StreamEvent::complete(4, 1);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["data"]["added_to_queue"], 4);
        assert_eq!(json["data"]["rejected"], 1);
    }
}
