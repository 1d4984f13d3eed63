use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use encore::api::{self, AppState};
use encore::config::Config;
use encore::services::{Catalog, GeminiClient, RecommendationPipeline, SpotifyClient, TextModel};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,encore=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Initialize services
    let catalog: Arc<dyn Catalog> = Arc::new(SpotifyClient::new(config.spotify_api_base.clone()));
    let model: Arc<dyn TextModel> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
    ));
    let pipeline = Arc::new(RecommendationPipeline::new(
        catalog.clone(),
        model,
        &config,
    ));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        catalog,
        pipeline,
    });

    // CORS: explicit origins from config, or wide open for development
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    };

    // Build router
    let app = Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(api::recommendation_routes())
                .merge(api::queue_routes())
                .merge(api::health_routes())
                .with_state(app_state.clone()),
        )
        // Middleware
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
