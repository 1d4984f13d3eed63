use crate::models::Track;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One candidate song from the suggestion round. Nothing here is
/// guaranteed to exist on Spotify until resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub artists: Vec<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Suggestion {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Verdict from the verification round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub reason: String,
}

/// The unit of aggregate output: a suggestion, the track it resolved to,
/// and (when verification ran) its verdict. `in_queue` only ever goes
/// false -> true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub suggestion: Suggestion,
    pub track: Track,
    pub verification: Option<VerificationResult>,
    pub in_queue: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[validate(length(min = 1, message = "seed_song must not be empty"))]
    pub seed_song: String,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 25))]
    pub count: usize,
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_count() -> usize {
    5
}

fn default_verify() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub seed_track: Track,
    pub recommendations: Vec<RecommendationRecord>,
    pub total_found: usize,
    pub total_verified: usize,
    pub total_rejected: usize,
}
