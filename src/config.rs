use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_api_base: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub server_host: String,
    pub server_port: u16,
    /// Minimum fuzzy-match score for accepting a catalog candidate.
    pub match_threshold: f64,
    /// How many suggestion resolutions may be in flight at once.
    pub resolve_concurrency: usize,
    /// Allowed CORS origins (comma-separated). Use "*" for any origin (development only).
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        // The pipeline cannot run without a generative model behind it
        let gemini_api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            anyhow::anyhow!(
                "GEMINI_API_KEY environment variable must be set. \
                Create one at https://aistudio.google.com/apikey"
            )
        })?;

        let match_threshold = env::var("MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.6);

        if !(0.0..=1.0).contains(&match_threshold) {
            return Err(anyhow::anyhow!(
                "MATCH_THRESHOLD must be between 0.0 and 1.0, got {}",
                match_threshold
            ));
        }

        // Parse CORS origins - default to localhost for development
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            spotify_api_base: env::var("SPOTIFY_API_BASE")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            gemini_api_key,
            gemini_api_base: env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            match_threshold,
            resolve_concurrency: env::var("RESOLVE_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(5),
            cors_origins,
        })
    }
}
