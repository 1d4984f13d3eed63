use crate::error::Result;
use crate::models::Track;
use crate::services::session::Session;
use crate::services::spotify::Catalog;
use std::collections::HashSet;
use std::sync::Arc;

/// Run-local playback-queue bookkeeping. The external queue is append-only
/// from this system's point of view, so the only invariant to hold is
/// at-most-once per track id within the run.
pub struct QueueOrchestrator {
    catalog: Arc<dyn Catalog>,
    session: Session,
    queued: HashSet<String>,
    added: usize,
}

impl QueueOrchestrator {
    pub fn new(catalog: Arc<dyn Catalog>, session: Session) -> Self {
        Self {
            catalog,
            session,
            queued: HashSet::new(),
            added: 0,
        }
    }

    /// Append a track to the user's queue. `Ok(true)` when submitted,
    /// `Ok(false)` when this run already queued the same id. A failed
    /// submission leaves the id unmarked.
    pub async fn enqueue(&mut self, track: &Track) -> Result<bool> {
        if self.queued.contains(&track.id) {
            tracing::debug!("Track already queued this run: {}", track.name);
            return Ok(false);
        }

        self.catalog.queue_track(&self.session, &track.uri).await?;

        self.queued.insert(track.id.clone());
        self.added += 1;
        tracing::info!("Added to queue: {}", track.name);

        Ok(true)
    }

    /// Tracks submitted to the queue so far in this run.
    pub fn added(&self) -> usize {
        self.added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::PlaybackDevice;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingCatalog {
        fail: bool,
        submissions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Catalog for RecordingCatalog {
        async fn search(&self, _: &Session, _: &str, _: usize) -> Result<Vec<Track>> {
            Ok(Vec::new())
        }

        async fn queue_track(&self, _: &Session, uri: &str) -> Result<()> {
            if self.fail {
                return Err(AppError::Queue("No active playback device".to_string()));
            }
            self.submissions.lock().unwrap().push(uri.to_string());
            Ok(())
        }

        async fn devices(&self, _: &Session) -> Result<Vec<PlaybackDevice>> {
            Ok(Vec::new())
        }

        async fn start_playback(&self, _: &Session, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {}", id),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            uri: format!("spotify:track:{}", id),
            popularity: 50,
            preview_url: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn same_track_is_never_submitted_twice() {
        let catalog = Arc::new(RecordingCatalog {
            fail: false,
            submissions: Mutex::new(Vec::new()),
        });
        let mut queue = QueueOrchestrator::new(catalog.clone(), Session::new("token"));

        assert!(queue.enqueue(&track("a")).await.unwrap());
        assert!(!queue.enqueue(&track("a")).await.unwrap());
        assert!(queue.enqueue(&track("b")).await.unwrap());

        assert_eq!(queue.added(), 2);
        assert_eq!(
            *catalog.submissions.lock().unwrap(),
            vec!["spotify:track:a", "spotify:track:b"]
        );
    }

    #[tokio::test]
    async fn failed_submission_leaves_track_unmarked() {
        let catalog = Arc::new(RecordingCatalog {
            fail: true,
            submissions: Mutex::new(Vec::new()),
        });
        let mut queue = QueueOrchestrator::new(catalog, Session::new("token"));

        assert!(queue.enqueue(&track("a")).await.is_err());
        assert_eq!(queue.added(), 0);
    }
}
