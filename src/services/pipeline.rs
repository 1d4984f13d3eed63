use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    RecommendationRecord, RecommendationRequest, RecommendationResponse, StreamEvent, Suggestion,
    Track, VerificationResult,
};
use crate::services::gemini::TextModel;
use crate::services::queue::QueueOrchestrator;
use crate::services::resolver::CatalogResolver;
use crate::services::session::Session;
use crate::services::spotify::Catalog;
use crate::services::suggestion::SuggestionGenerator;
use crate::services::verifier::VerificationAgent;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The run engine: seed resolution -> suggestion generation -> bounded
/// fan-out resolution -> queueing -> verification, in two flavors.
///
/// Streaming mode queues optimistically and verifies in the background,
/// emitting events as it goes. Aggregate mode verifies first, queues only
/// what passed, and returns everything at once.
pub struct RecommendationPipeline {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<CatalogResolver>,
    suggester: Arc<SuggestionGenerator>,
    verifier: Arc<VerificationAgent>,
    resolve_concurrency: usize,
}

/// How a streaming run ends internally. A fatal error still reaches the
/// client as the terminal `error` event; a disconnect just stops the run.
enum RunEnd {
    Fatal(AppError),
    Disconnected,
}

impl From<AppError> for RunEnd {
    fn from(e: AppError) -> Self {
        RunEnd::Fatal(e)
    }
}

impl From<Disconnected> for RunEnd {
    fn from(_: Disconnected) -> Self {
        RunEnd::Disconnected
    }
}

struct Disconnected;

/// Send half of the event stream. A failed send means the consumer hung
/// up, which cancels the run.
struct Emitter {
    tx: mpsc::Sender<StreamEvent>,
}

impl Emitter {
    async fn emit(&self, event: StreamEvent) -> std::result::Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }
}

/// Verification tasks owned by one run. Dropping the set aborts whatever
/// is still in flight, so a disconnected stream never leaks AI calls.
#[derive(Default)]
struct VerificationTasks {
    handles: Vec<JoinHandle<VerificationResult>>,
}

impl VerificationTasks {
    fn push(&mut self, handle: JoinHandle<VerificationResult>) {
        self.handles.push(handle);
    }

    fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every verdict, bailing out early if the consumer is gone.
    async fn join(mut self, tx: &mpsc::Sender<StreamEvent>) -> Vec<VerificationResult> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            if tx.is_closed() {
                handle.abort();
                continue;
            }
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!("Verification task panicked: {}", e),
            }
        }
        results
    }
}

impl Drop for VerificationTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl RecommendationPipeline {
    pub fn new(catalog: Arc<dyn Catalog>, model: Arc<dyn TextModel>, config: &Config) -> Self {
        Self::with_parts(
            catalog,
            SuggestionGenerator::new(model.clone()),
            VerificationAgent::new(model),
            config.match_threshold,
            config.resolve_concurrency,
        )
    }

    pub fn with_parts(
        catalog: Arc<dyn Catalog>,
        suggester: SuggestionGenerator,
        verifier: VerificationAgent,
        match_threshold: f64,
        resolve_concurrency: usize,
    ) -> Self {
        Self {
            resolver: Arc::new(CatalogResolver::new(catalog.clone(), match_threshold)),
            catalog,
            suggester: Arc::new(suggester),
            verifier: Arc::new(verifier),
            resolve_concurrency: resolve_concurrency.max(1),
        }
    }

    /// Streaming run. Emits an ordered event sequence into `tx`, ending
    /// with exactly one `complete` or `error` unless the consumer hangs
    /// up first.
    pub async fn stream(
        &self,
        session: Session,
        request: RecommendationRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let emitter = Emitter { tx };
        match self.stream_run(&session, &request, &emitter).await {
            Ok(()) => {}
            Err(RunEnd::Disconnected) => {
                tracing::info!("Stream consumer disconnected, run cancelled");
            }
            Err(RunEnd::Fatal(e)) => {
                tracing::error!("Stream run failed: {}", e);
                let _ = emitter.emit(StreamEvent::error(e.to_string())).await;
            }
        }
    }

    async fn stream_run(
        &self,
        session: &Session,
        request: &RecommendationRequest,
        emitter: &Emitter,
    ) -> std::result::Result<(), RunEnd> {
        emitter
            .emit(StreamEvent::status("Searching for seed song..."))
            .await?;

        let seed = self.resolver.resolve_seed(session, &request.seed_song).await?;
        emitter.emit(StreamEvent::Seed { data: seed.clone() }).await?;

        emitter
            .emit(StreamEvent::status("Getting AI recommendations..."))
            .await?;
        let suggestions = self.suggester.generate(&seed, request.count).await?;
        emitter
            .emit(StreamEvent::status(format!(
                "Got {} suggestions, resolving on Spotify...",
                suggestions.len()
            )))
            .await?;

        let mut queue = QueueOrchestrator::new(self.catalog.clone(), session.clone());
        let mut seen: HashSet<String> = HashSet::from([seed.id.clone()]);
        let mut tasks = VerificationTasks::default();
        let mut enqueue_attempts = 0usize;

        // Resolutions race up to the concurrency bound but are yielded in
        // suggestion order, so track/skip events stay index-ordered.
        let resolutions = futures::stream::iter(suggestions.into_iter().enumerate().map(
            |(index, suggestion)| {
                let resolver = self.resolver.clone();
                let session = session.clone();
                async move {
                    let outcome = resolver.resolve_suggestion(&session, &suggestion).await;
                    (index, suggestion, outcome)
                }
            },
        ))
        .buffered(self.resolve_concurrency);
        tokio::pin!(resolutions);

        while let Some((index, suggestion, outcome)) = resolutions.next().await {
            let track = match outcome {
                Ok(Some(track)) => track,
                Ok(None) => {
                    emitter
                        .emit(StreamEvent::skip(&suggestion.title, "Not found on Spotify"))
                        .await?;
                    continue;
                }
                Err(AppError::AuthExpired) => return Err(AppError::AuthExpired.into()),
                Err(e) => {
                    tracing::warn!("Resolution failed for '{}': {}", suggestion.title, e);
                    emitter
                        .emit(StreamEvent::skip(
                            &suggestion.title,
                            format!("Spotify lookup failed: {}", e),
                        ))
                        .await?;
                    continue;
                }
            };

            if !seen.insert(track.id.clone()) {
                emitter
                    .emit(StreamEvent::skip(&suggestion.title, "duplicate"))
                    .await?;
                continue;
            }

            // Streaming policy: queue now, verify in the background
            enqueue_attempts += 1;
            if let Err(e) = queue.enqueue(&track).await {
                tracing::warn!("Failed to queue '{}': {}", track.name, e);
                emitter
                    .emit(StreamEvent::skip(
                        &suggestion.title,
                        format!("Could not add to queue: {}", e),
                    ))
                    .await?;
                continue;
            }

            emitter
                .emit(StreamEvent::track(
                    index,
                    &track,
                    &suggestion,
                    true,
                    request.verify,
                ))
                .await?;

            if request.verify {
                let verifier = self.verifier.clone();
                let seed = seed.clone();
                let tx = emitter.tx.clone();
                tasks.push(tokio::spawn(async move {
                    let result = verifier.verify(&seed, &track, &suggestion).await;
                    let _ = tx.send(StreamEvent::verification(&track.id, &result)).await;
                    result
                }));
            }
        }

        if enqueue_attempts > 0 && queue.added() == 0 {
            return Err(AppError::Queue(
                "Could not add any track to the playback queue".to_string(),
            )
            .into());
        }

        // The terminal event waits for every verdict, so verification
        // events always precede it and the rejected count is real.
        let mut rejected = 0usize;
        if !tasks.is_empty() {
            emitter
                .emit(StreamEvent::status(format!(
                    "Verifying {} tracks...",
                    tasks.len()
                )))
                .await?;
            let results = tasks.join(&emitter.tx).await;
            rejected = results.iter().filter(|r| !r.is_valid).count();
        }

        emitter
            .emit(StreamEvent::complete(queue.added(), rejected))
            .await?;

        Ok(())
    }

    /// Aggregate run: synchronous policy. Verification gates queueing and
    /// a queue failure is fatal.
    pub async fn aggregate(
        &self,
        session: &Session,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse> {
        let seed = self.resolver.resolve_seed(session, &request.seed_song).await?;
        tracing::info!(
            "Resolved seed '{}' -> '{}' by {}",
            request.seed_song,
            seed.name,
            seed.artist_line()
        );

        let suggestions = self.suggester.generate(&seed, request.count).await?;

        let resolutions: Vec<(Suggestion, Result<Option<Track>>)> =
            futures::stream::iter(suggestions.into_iter().map(|suggestion| {
                let resolver = self.resolver.clone();
                let session = session.clone();
                async move {
                    let outcome = resolver.resolve_suggestion(&session, &suggestion).await;
                    (suggestion, outcome)
                }
            }))
            .buffered(self.resolve_concurrency)
            .collect()
            .await;

        let mut seen: HashSet<String> = HashSet::from([seed.id.clone()]);
        let mut resolved: Vec<(Suggestion, Track)> = Vec::new();
        for (suggestion, outcome) in resolutions {
            match outcome {
                Ok(Some(track)) => {
                    if seen.insert(track.id.clone()) {
                        resolved.push((suggestion, track));
                    } else {
                        tracing::debug!("Skipping duplicate: {}", suggestion.title);
                    }
                }
                Ok(None) => tracing::warn!("Could not find on Spotify: {}", suggestion.title),
                Err(AppError::AuthExpired) => return Err(AppError::AuthExpired),
                Err(e) => tracing::warn!("Resolution failed for '{}': {}", suggestion.title, e),
            }
        }
        let total_found = resolved.len();

        // Synchronous policy: every verdict lands before anything queues
        let verifications: Vec<Option<VerificationResult>> = if request.verify {
            tracing::info!("Verifying {} resolved tracks", resolved.len());
            let verify_futs: Vec<_> = resolved
                .iter()
                .map(|(suggestion, track)| {
                    let verifier = self.verifier.clone();
                    let seed = seed.clone();
                    let track = track.clone();
                    let suggestion = suggestion.clone();
                    async move { Some(verifier.verify(&seed, &track, &suggestion).await) }
                })
                .collect();
            futures::stream::iter(verify_futs)
            .buffered(self.resolve_concurrency)
            .collect()
            .await
        } else {
            vec![None; resolved.len()]
        };

        self.ensure_active_device(session).await;

        let mut queue = QueueOrchestrator::new(self.catalog.clone(), session.clone());
        let mut records = Vec::with_capacity(resolved.len());
        let mut rejected = 0usize;

        for ((suggestion, track), verification) in resolved.into_iter().zip(verifications) {
            if let Some(v) = &verification {
                if !v.is_valid {
                    tracing::info!("Rejected: {} - {}", track.name, v.reason);
                    rejected += 1;
                    continue;
                }
            }

            let in_queue = queue.enqueue(&track).await?;
            records.push(RecommendationRecord {
                suggestion,
                track,
                verification,
                in_queue,
            });
        }

        tracing::info!("Added {} tracks to the playback queue", queue.added());

        let total_verified = records.len();
        Ok(RecommendationResponse {
            seed_track: seed,
            recommendations: records,
            total_found,
            total_verified,
            total_rejected: rejected,
        })
    }

    /// Queue additions need an active device; try to wake one up front.
    /// Best-effort - the enqueue itself is the real arbiter.
    async fn ensure_active_device(&self, session: &Session) {
        match self.catalog.devices(session).await {
            Ok(devices) => {
                if devices.iter().any(|d| d.is_active) {
                    return;
                }
                match devices.first() {
                    Some(device) => {
                        tracing::info!("No active device, attempting to wake: {}", device.name);
                        if let Err(e) = self.catalog.start_playback(session, &device.id).await {
                            tracing::warn!("Failed to activate device {}: {}", device.name, e);
                        }
                    }
                    None => tracing::warn!(
                        "No Spotify devices found - queue additions will likely fail"
                    ),
                }
            }
            Err(e) => tracing::warn!("Failed to list playback devices: {}", e),
        }
    }
}
