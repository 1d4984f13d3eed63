pub mod gemini;
pub mod normalize;
pub mod pipeline;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod spotify;
pub mod suggestion;
pub mod verifier;

pub use gemini::{GeminiClient, TextModel};
pub use pipeline::RecommendationPipeline;
pub use resolver::CatalogResolver;
pub use session::Session;
pub use spotify::{Catalog, SpotifyClient};
pub use suggestion::SuggestionGenerator;
pub use verifier::VerificationAgent;
