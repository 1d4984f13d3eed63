use crate::models::{Suggestion, Track, VerificationResult};
use crate::services::gemini::{GenerationParams, TextModel};
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "\
You are a music quality verifier. Decide how well a recommended track actually matches the \
seed track it was suggested for.\n\
\n\
Score each criterion independently, from 0.0 (no match) to 1.0 (perfect match):\n\
- artist_match: same artist, or a closely related artist in the same scene?\n\
- genre_match: same genre and cultural context? Do not let languages or regional traditions mix \
unless the seed does.\n\
- energy_match: similar energy, tempo, and mood?\n\
- popularity: a well-known, high-quality track?\n\
- sonic_coherence: would it flow well right after the seed in a playlist?\n\
\n\
Respond with JSON only:\n\
{\n\
  \"artist_match\": 0.0,\n\
  \"genre_match\": 0.0,\n\
  \"energy_match\": 0.0,\n\
  \"popularity\": 0.0,\n\
  \"sonic_coherence\": 0.0,\n\
  \"reason\": \"one sentence on why it passes or fails\"\n\
}";

const PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    top_p: 0.8,
    top_k: 20,
    json_response: true,
};

/// Criterion weights: artist 30%, genre 30%, energy 20%, popularity 10%,
/// sonic coherence 10%.
const WEIGHTS: [f64; 5] = [0.3, 0.3, 0.2, 0.1, 0.1];

pub const DEFAULT_PASS_THRESHOLD: f64 = 0.55;

#[derive(Debug, Deserialize)]
struct CriterionScores {
    artist_match: f64,
    genre_match: f64,
    energy_match: f64,
    popularity: f64,
    sonic_coherence: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// Second generative round: an independent similarity check per resolved
/// track. Never fatal - persistent failure degrades to an invalid verdict.
pub struct VerificationAgent {
    model: Arc<dyn TextModel>,
    pass_threshold: f64,
}

impl VerificationAgent {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self {
            model,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }

    pub async fn verify(
        &self,
        seed: &Track,
        track: &Track,
        suggestion: &Suggestion,
    ) -> VerificationResult {
        let prompt = Self::build_user_prompt(seed, track, suggestion);

        // One retry; verification is never worth failing a run over
        for attempt in 1..=2u32 {
            match self.model.generate(SYSTEM_PROMPT, &prompt, PARAMS).await {
                Ok(raw) => match self.score_verdict(&raw) {
                    Some(result) => return result,
                    None => tracing::warn!(
                        "Verifier returned unparseable verdict for '{}' (attempt {})",
                        track.name,
                        attempt
                    ),
                },
                Err(e) => tracing::warn!(
                    "Verification failed for '{}' (attempt {}): {}",
                    track.name,
                    attempt,
                    e
                ),
            }
        }

        VerificationResult {
            is_valid: false,
            confidence: 0.0,
            reason: format!("Verification unavailable for '{}'", track.name),
        }
    }

    fn score_verdict(&self, raw: &str) -> Option<VerificationResult> {
        let scores = extract_scores(raw)?;

        let clamped = [
            scores.artist_match,
            scores.genre_match,
            scores.energy_match,
            scores.popularity,
            scores.sonic_coherence,
        ]
        .map(|s| s.clamp(0.0, 1.0));

        let confidence: f64 = clamped
            .iter()
            .zip(WEIGHTS.iter())
            .map(|(score, weight)| score * weight)
            .sum();

        Some(VerificationResult {
            is_valid: confidence >= self.pass_threshold,
            confidence,
            reason: scores.reason.unwrap_or_else(|| "Verified".to_string()),
        })
    }

    fn build_user_prompt(seed: &Track, track: &Track, suggestion: &Suggestion) -> String {
        let mut prompt = format!(
            "**Seed Song:**\n- Title: {}\n- Artist: {}\n",
            seed.name,
            seed.artist_line()
        );

        prompt.push_str(&format!(
            "\n**Recommended Song:**\n- Title: {}\n- Artist: {}\n",
            track.name,
            track.artist_line()
        ));
        if let Some(genre) = &suggestion.genre {
            prompt.push_str(&format!("- Suggested Genre: {}\n", genre));
        }
        if let Some(reason) = &suggestion.reason {
            prompt.push_str(&format!("- AI Reason: {}\n", reason));
        }
        prompt.push_str(&format!("- Spotify Popularity: {}/100\n", track.popularity));
        prompt.push_str("\n**Question:** Score this recommendation against the seed song.");

        prompt
    }
}

/// Lenient parse: strip code fences, try the whole text, then the
/// outermost brace-balanced snippet.
fn extract_scores(raw: &str) -> Option<CriterionScores> {
    let mut cleaned = raw.trim().to_string();

    if cleaned.starts_with("```") {
        cleaned = cleaned
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n");
    }

    if let Ok(scores) = serde_json::from_str::<CriterionScores>(&cleaned) {
        return Some(scores);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<CriterionScores>(&cleaned[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::services::gemini::GenerationParams;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn generate(&self, _: &str, _: &str, _: GenerationParams) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(AppError::Ai("script exhausted".to_string()));
            }
            responses.remove(0)
        }
    }

    fn seed() -> Track {
        Track {
            id: "seed".to_string(),
            name: "Blinding Lights".to_string(),
            artists: vec!["The Weeknd".to_string()],
            album: "After Hours".to_string(),
            uri: "spotify:track:seed".to_string(),
            popularity: 95,
            preview_url: None,
            image_url: None,
        }
    }

    fn candidate() -> (Track, Suggestion) {
        let track = Track {
            id: "cand".to_string(),
            name: "Save Your Tears".to_string(),
            artists: vec!["The Weeknd".to_string()],
            album: "After Hours".to_string(),
            uri: "spotify:track:cand".to_string(),
            popularity: 90,
            preview_url: None,
            image_url: None,
        };
        let suggestion = Suggestion {
            title: "Save Your Tears".to_string(),
            artists: vec!["The Weeknd".to_string()],
            genre: Some("Synth-pop".to_string()),
            reason: Some("Same album".to_string()),
        };
        (track, suggestion)
    }

    #[tokio::test]
    async fn confidence_is_the_weighted_criterion_sum() {
        let verdict = r#"{"artist_match": 1.0, "genre_match": 1.0, "energy_match": 0.5,
            "popularity": 1.0, "sonic_coherence": 0.0, "reason": "Strong match"}"#;
        let agent = VerificationAgent::new(Arc::new(ScriptedModel::new(vec![Ok(
            verdict.to_string()
        )])));

        let (track, suggestion) = candidate();
        let result = agent.verify(&seed(), &track, &suggestion).await;

        // 0.3 + 0.3 + 0.1 + 0.1 + 0.0
        assert!((result.confidence - 0.8).abs() < 1e-9);
        assert!(result.is_valid);
        assert_eq!(result.reason, "Strong match");
    }

    #[tokio::test]
    async fn low_weighted_sum_fails_the_pass_threshold() {
        let verdict = r#"{"artist_match": 0.2, "genre_match": 0.3, "energy_match": 0.5,
            "popularity": 1.0, "sonic_coherence": 1.0, "reason": "Different scene"}"#;
        let agent = VerificationAgent::new(Arc::new(ScriptedModel::new(vec![Ok(
            verdict.to_string()
        )])));

        let (track, suggestion) = candidate();
        let result = agent.verify(&seed(), &track, &suggestion).await;

        // 0.06 + 0.09 + 0.10 + 0.10 + 0.10 = 0.45 < 0.55
        assert!(!result.is_valid);
        assert!((result.confidence - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clamped() {
        let verdict = r#"{"artist_match": 3.0, "genre_match": -1.0, "energy_match": 1.0,
            "popularity": 1.0, "sonic_coherence": 1.0}"#;
        let agent = VerificationAgent::new(Arc::new(ScriptedModel::new(vec![Ok(
            verdict.to_string()
        )])));

        let (track, suggestion) = candidate();
        let result = agent.verify(&seed(), &track, &suggestion).await;

        // 0.3 + 0.0 + 0.2 + 0.1 + 0.1
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn retries_once_then_degrades_to_invalid() {
        let agent = VerificationAgent::new(Arc::new(ScriptedModel::new(vec![
            Err(AppError::Ai("timeout".to_string())),
            Err(AppError::Ai("timeout".to_string())),
        ])));

        let (track, suggestion) = candidate();
        let result = agent.verify(&seed(), &track, &suggestion).await;

        assert!(!result.is_valid);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reason.contains("unavailable"));
    }

    #[tokio::test]
    async fn fenced_verdicts_still_parse() {
        let verdict = "```json\n{\"artist_match\": 1.0, \"genre_match\": 1.0, \"energy_match\": 1.0, \"popularity\": 1.0, \"sonic_coherence\": 1.0, \"reason\": \"perfect\"}\n```";
        let agent = VerificationAgent::new(Arc::new(ScriptedModel::new(vec![
            Ok(verdict.to_string()),
        ])));

        let (track, suggestion) = candidate();
        let result = agent.verify(&seed(), &track, &suggestion).await;

        assert!(result.is_valid);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }
}
