pub mod events;
pub mod recommendation;
pub mod track;

pub use events::{CompleteEvent, SkipEvent, StreamEvent, TrackEvent, VerificationEvent};
pub use recommendation::{
    RecommendationRecord, RecommendationRequest, RecommendationResponse, Suggestion,
    VerificationResult,
};
pub use track::{PlaybackDevice, Track};
