use crate::error::{AppError, Result};
use crate::models::{Suggestion, Track};
use crate::services::gemini::{GenerationParams, TextModel};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "\
You are a music recommendation engine. Given a verified seed track, suggest songs a listener \
would want queued right after it.\n\
\n\
Work through the seed before answering:\n\
1. Place its genre, era, and cultural context.\n\
2. Gauge its energy, production style, and vocal style.\n\
3. Favor 2-3 of the seed artist's own most similar tracks first, then well-known tracks by \
closely associated artists in the same scene.\n\
\n\
Respond with JSON only, matching exactly this shape:\n\
{\n\
  \"songs\": [\n\
    {\n\
      \"title\": \"exact song title as released\",\n\
      \"artists\": [\"exact artist name(s)\"],\n\
      \"genre\": \"specific genre label\",\n\
      \"reason\": \"1-2 lines on the sonic match\"\n\
    }\n\
  ]\n\
}\n\
\n\
Rules:\n\
- Only well-known tracks that are certain to exist on Spotify.\n\
- Match the seed's genre and cultural context; do not cross languages or scenes unless the seed does.\n\
- Never include the seed track itself, and no duplicates.\n\
- No prose or markdown outside the JSON.";

const PARAMS: GenerationParams = GenerationParams {
    temperature: 0.6,
    top_p: 0.95,
    top_k: 40,
    json_response: true,
};

/// First generative round: one call that turns the seed into a ranked
/// list of candidate songs.
pub struct SuggestionGenerator {
    model: Arc<dyn TextModel>,
    attempts: u32,
    backoff_base: Duration,
}

impl SuggestionGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self::with_retry(model, 3, Duration::from_millis(500))
    }

    pub fn with_retry(model: Arc<dyn TextModel>, attempts: u32, backoff_base: Duration) -> Self {
        Self {
            model,
            attempts: attempts.max(1),
            backoff_base,
        }
    }

    /// Suggestions in model order, at most `count`. Retries transient
    /// failures; exhaustion is fatal to the run.
    pub async fn generate(&self, seed: &Track, count: usize) -> Result<Vec<Suggestion>> {
        let prompt = Self::build_user_prompt(seed, count);

        for attempt in 1..=self.attempts {
            tracing::info!(
                "Requesting {} recommendations from Gemini (attempt {}/{})",
                count,
                attempt,
                self.attempts
            );

            match self.model.generate(SYSTEM_PROMPT, &prompt, PARAMS).await {
                Ok(raw) => match extract_suggestions(&raw) {
                    Some(mut songs) if !songs.is_empty() => {
                        tracing::info!("Received {} usable suggestions", songs.len());
                        songs.truncate(count);
                        return Ok(songs);
                    }
                    _ => tracing::warn!("Attempt {} returned no usable suggestions", attempt),
                },
                Err(e) => tracing::warn!("Attempt {} failed: {}", attempt, e),
            }

            if attempt < self.attempts {
                let backoff = self.backoff_base * 2u32.pow(attempt - 1);
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
                tokio::time::sleep(backoff + jitter).await;
            }
        }

        Err(AppError::GenerationFailed(self.attempts))
    }

    fn build_user_prompt(seed: &Track, count: usize) -> String {
        format!(
            "Seed Song: \"{}\"\nArtist: {}\nAlbum: {}\nSpotify Popularity: {}/100\n\n\
            Provide exactly {} recommendations.",
            seed.name,
            seed.artist_line(),
            seed.album,
            seed.popularity,
            count
        )
    }
}

/// Pull a `{"songs": [...]}` payload out of whatever the model sent back:
/// fenced code blocks first, then the raw text, then the largest
/// brace-balanced snippet mentioning "songs".
fn extract_suggestions(raw: &str) -> Option<Vec<Suggestion>> {
    let text = raw.trim();

    if text.contains("```") {
        let mut blocks: Vec<(String, String)> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut fence_lang: Option<String> = None;
        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                match fence_lang.take() {
                    None => {
                        fence_lang = Some(line.trim().trim_matches('`').to_lowercase());
                        current.clear();
                    }
                    Some(lang) => blocks.push((lang, current.join("\n"))),
                }
            } else if fence_lang.is_some() {
                current.push(line);
            }
        }
        for (_, content) in blocks.iter().filter(|(lang, _)| lang.contains("json")) {
            if let Some(songs) = parse_songs(content) {
                return Some(songs);
            }
        }
        for (_, content) in &blocks {
            if let Some(songs) = parse_songs(content) {
                return Some(songs);
            }
        }
    }

    if let Some(songs) = parse_songs(text) {
        return Some(songs);
    }

    let mut starts: Vec<usize> = Vec::new();
    let mut candidates: Vec<&str> = Vec::new();
    for (i, ch) in text.char_indices() {
        if ch == '{' {
            starts.push(i);
        } else if ch == '}' {
            if let Some(start) = starts.pop() {
                let snippet = &text[start..i + 1];
                if snippet.contains("\"songs\"") {
                    candidates.push(snippet);
                }
            }
        }
    }
    candidates.sort_by_key(|s| std::cmp::Reverse(s.len()));
    candidates.into_iter().find_map(parse_songs)
}

/// Parse and structurally validate one candidate payload. Malformed
/// entries are dropped, never fatal.
fn parse_songs(text: &str) -> Option<Vec<Suggestion>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let songs = value.get("songs")?.as_array()?;

    let mut out = Vec::with_capacity(songs.len());
    for item in songs {
        match serde_json::from_value::<Suggestion>(item.clone()) {
            Ok(s) if !s.title.trim().is_empty() && s.artists.iter().any(|a| !a.trim().is_empty()) => {
                out.push(s)
            }
            Ok(s) => tracing::warn!("Dropping malformed suggestion: '{}'", s.title),
            Err(e) => tracing::warn!("Dropping unparseable suggestion: {}", e),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let raw = r#"{"songs": [{"title": "Save Your Tears", "artists": ["The Weeknd"], "genre": "Synth-pop", "reason": "Same album energy"}]}"#;
        let songs = extract_suggestions(raw).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Save Your Tears");
    }

    #[test]
    fn parses_fenced_json_block() {
        let raw = "Here you go:\n```json\n{\"songs\": [{\"title\": \"In Your Eyes\", \"artists\": [\"The Weeknd\"]}]}\n```\nEnjoy!";
        let songs = extract_suggestions(raw).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "In Your Eyes");
        assert!(songs[0].genre.is_none());
    }

    #[test]
    fn recovers_embedded_object_via_brace_matching() {
        let raw = "Sure! {\"songs\": [{\"title\": \"After Hours\", \"artists\": [\"The Weeknd\"]}]} hope that helps";
        let songs = extract_suggestions(raw).unwrap();
        assert_eq!(songs[0].title, "After Hours");
    }

    #[test]
    fn drops_malformed_entries_keeps_valid_ones() {
        let raw = r#"{"songs": [
            {"title": "", "artists": ["Ghost"]},
            {"title": "No Artists", "artists": []},
            {"title": 42, "artists": ["Wat"]},
            {"title": "Valid Song", "artists": ["Real Artist"]}
        ]}"#;
        let songs = extract_suggestions(raw).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Valid Song");
    }

    #[test]
    fn rejects_text_without_payload() {
        assert!(extract_suggestions("I can't help with that").is_none());
        assert!(extract_suggestions("{\"other\": []}").is_none());
    }
}
