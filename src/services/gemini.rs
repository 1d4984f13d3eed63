use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Sampling knobs for one generative call. The suggestion round runs
/// warmer than the verification round.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    /// Ask the model to emit raw JSON instead of prose.
    pub json_response: bool,
}

/// The generative-model side of the pipeline, behind a trait so tests can
/// script responses without a network.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String>;
}

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        tracing::info!("Initialized Gemini client with model: {}", model);

        Self {
            api_key,
            base_url,
            model,
            client,
        }
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let mut generation_config = serde_json::json!({
            "temperature": params.temperature,
            "topP": params.top_p,
            "topK": params.top_k,
        });
        if params.json_response {
            generation_config["responseMimeType"] = "application/json".into();
        }

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "system_instruction": {
                    "parts": [{ "text": system }]
                },
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }],
                "generationConfig": generation_config,
            }))
            .send()
            .await
            .map_err(|e| AppError::Ai(format!("Failed to call Gemini API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API error: {} - {}", status, body);
            return Err(AppError::Ai(format!(
                "API returned status: {} - {}",
                status,
                &body[..body.len().min(200)]
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Ai(format!("Failed to parse Gemini response: {}", e)))?;

        // Concatenate the text parts of the first candidate
        let parts = response_json["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| AppError::Ai("Invalid response format from Gemini".to_string()))?;

        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AppError::Ai("Gemini returned an empty response".to_string()));
        }

        Ok(text)
    }
}
