use crate::error::{AppError, Result};
use crate::models::{Suggestion, Track};
use crate::services::normalize::{parse_freeform, similarity, strip_annotations};
use crate::services::session::Session;
use crate::services::spotify::Catalog;
use std::sync::Arc;

/// Candidates fetched per search query.
const SEARCH_LIMIT: usize = 10;

/// A match this strong stops the query ladder early.
const EARLY_ACCEPT: f64 = 0.75;

/// Resolves free-text titles/artists to canonical catalog tracks by
/// scoring search candidates on title, artist, and popularity.
pub struct CatalogResolver {
    catalog: Arc<dyn Catalog>,
    threshold: f64,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn Catalog>, threshold: f64) -> Self {
        Self { catalog, threshold }
    }

    /// Weighted match score in [0, 1] for one candidate.
    fn score(title: &str, artist_hint: Option<&[String]>, candidate: &Track) -> f64 {
        let title_score = similarity(title, &strip_annotations(&candidate.name));

        let artist_score = match artist_hint {
            Some(artists) if !artists.is_empty() => {
                let candidate_line = candidate.artist_line();
                let joined = artists.join(" ");
                let all_vs_all = similarity(&joined, &candidate_line);
                let best_single = artists
                    .iter()
                    .map(|a| similarity(a, &candidate_line))
                    .fold(0.0, f64::max);
                all_vs_all.max(best_single)
            }
            // Nothing to compare against; neutral rather than zero so a
            // bare-title query can still clear the threshold
            _ => 0.2,
        };

        let popularity = f64::from(candidate.popularity.min(100)) / 100.0;

        0.5 * title_score + 0.3 * artist_score + 0.2 * popularity
    }

    /// Resolve a title (plus optional artist hint) to the best catalog
    /// match, or `None` when nothing clears the acceptance threshold.
    pub async fn resolve(
        &self,
        session: &Session,
        title: &str,
        artist_hint: Option<&[String]>,
    ) -> Result<Option<Track>> {
        let clean_title = strip_annotations(title);

        // Most precise query first, bare title last
        let mut queries: Vec<String> = Vec::new();
        if let Some(artists) = artist_hint {
            for artist in artists {
                queries.push(format!(r#"track:"{}" artist:"{}""#, clean_title, artist));
            }
        }
        queries.push(format!(r#"track:"{}""#, clean_title));
        queries.push(clean_title.clone());

        let mut best: Option<(Track, f64)> = None;
        let mut last_error: Option<AppError> = None;

        for query in &queries {
            let candidates = match self.catalog.search(session, query, SEARCH_LIMIT).await {
                Ok(candidates) => candidates,
                Err(AppError::AuthExpired) => return Err(AppError::AuthExpired),
                Err(e) => {
                    tracing::warn!("Search failed for '{}': {}", query, e);
                    last_error = Some(e);
                    continue;
                }
            };

            for candidate in candidates {
                let score = Self::score(&clean_title, artist_hint, &candidate);
                let better = match &best {
                    None => true,
                    Some((held, held_score)) => {
                        score > held_score + 1e-9
                            || ((score - held_score).abs() <= 1e-9
                                && candidate.popularity > held.popularity)
                    }
                };
                if better {
                    best = Some((candidate, score));
                }
            }

            if matches!(&best, Some((_, score)) if *score >= EARLY_ACCEPT) {
                break;
            }
        }

        match best {
            Some((track, score)) if score >= self.threshold => {
                tracing::debug!(
                    "Resolved '{}' -> '{}' by {} (score {:.2})",
                    title,
                    track.name,
                    track.artist_line(),
                    score
                );
                Ok(Some(track))
            }
            Some((track, score)) => {
                tracing::debug!(
                    "Best candidate for '{}' was '{}' at {:.2}, below threshold {:.2}",
                    title,
                    track.name,
                    score,
                    self.threshold
                );
                Ok(None)
            }
            // Every query errored out: that is a catalog outage, not a miss
            None => match last_error {
                Some(e) => Err(e),
                None => Ok(None),
            },
        }
    }

    /// Resolve the user's seed text. Failure here is fatal to the run.
    pub async fn resolve_seed(&self, session: &Session, text: &str) -> Result<Track> {
        let (title, artists) = parse_freeform(text);
        self.resolve(session, &title, artists.as_deref())
            .await?
            .ok_or_else(|| AppError::SeedNotFound(text.to_string()))
    }

    /// Resolve one AI suggestion. `None` means skip, not failure.
    pub async fn resolve_suggestion(
        &self,
        session: &Session,
        suggestion: &Suggestion,
    ) -> Result<Option<Track>> {
        self.resolve(session, &suggestion.title, Some(&suggestion.artists))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::models::PlaybackDevice;

    struct FixedCatalog {
        results: Vec<Track>,
    }

    #[async_trait]
    impl Catalog for FixedCatalog {
        async fn search(&self, _: &Session, _: &str, _: usize) -> Result<Vec<Track>> {
            Ok(self.results.clone())
        }

        async fn queue_track(&self, _: &Session, _: &str) -> Result<()> {
            Ok(())
        }

        async fn devices(&self, _: &Session) -> Result<Vec<PlaybackDevice>> {
            Ok(Vec::new())
        }

        async fn start_playback(&self, _: &Session, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn track(id: &str, name: &str, artist: &str, popularity: u32) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artists: vec![artist.to_string()],
            album: "Album".to_string(),
            uri: format!("spotify:track:{}", id),
            popularity,
            preview_url: None,
            image_url: None,
        }
    }

    fn resolver(results: Vec<Track>) -> CatalogResolver {
        CatalogResolver::new(Arc::new(FixedCatalog { results }), 0.6)
    }

    fn session() -> Session {
        Session::new("token")
    }

    #[tokio::test]
    async fn picks_the_best_scoring_candidate() {
        let resolver = resolver(vec![
            track("1", "Blinding Lights - Live", "Cover Band", 10),
            track("2", "Blinding Lights", "The Weeknd", 95),
        ]);

        let hint = vec!["The Weeknd".to_string()];
        let found = resolver
            .resolve(&session(), "Blinding Lights", Some(&hint))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "2");
    }

    #[tokio::test]
    async fn rejects_everything_below_threshold() {
        let resolver = resolver(vec![track("1", "Some Other Song", "Nobody", 5)]);

        let hint = vec!["The Weeknd".to_string()];
        let found = resolver
            .resolve(&session(), "Blinding Lights", Some(&hint))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn popularity_separates_equal_text_matches() {
        let resolver = resolver(vec![
            track("low", "Blinding Lights", "The Weeknd", 40),
            track("high", "Blinding Lights", "The Weeknd", 90),
        ]);

        let hint = vec!["The Weeknd".to_string()];
        let found = resolver
            .resolve(&session(), "Blinding Lights", Some(&hint))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "high");
    }

    #[tokio::test]
    async fn seed_resolution_parses_freeform_and_fails_loudly() {
        let loaded = resolver(vec![track("1", "Lahore", "Guru Randhawa", 80)]);
        let seed = loaded
            .resolve_seed(&session(), "Lahore by Guru Randhawa")
            .await
            .unwrap();
        assert_eq!(seed.id, "1");

        let empty = resolver(vec![]);
        let err = empty
            .resolve_seed(&session(), "Nonexistent Song Title")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SeedNotFound(_)));
    }
}
