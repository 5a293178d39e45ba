//! Google Gemini adapter (Generative Language REST API).

use super::http::{build_client, send_json, Hints};
use super::{ModelInfo, ProviderAdapter, RateLimiter};
use crate::config::GeminiSettings;
use crate::error::{ConverSqlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const ID: &str = "gemini";
const NAME: &str = "Google Gemini";
const LABEL: &str = "Gemini API";

const AUTH: &[&str] = &["api key", "api_key"];
const RATE: &[&str] = &["quota", "rate limit"];
const BLOCKED: &[&str] = &["safety", "blocked"];
const MODEL: &[&str] = &["model"];

pub struct GeminiAdapter {
    settings: GeminiSettings,
    client: Option<Client>,
    limiter: Option<RateLimiter>,
    hints: Hints,
}

impl GeminiAdapter {
    pub fn new(settings: GeminiSettings, timeout: Duration) -> Self {
        let client = match settings.api_key {
            Some(_) => build_client(ID, timeout),
            None => {
                debug!("GOOGLE_API_KEY/GEMINI_API_KEY not set, Gemini disabled");
                None
            }
        };
        Self {
            settings,
            client,
            limiter: None,
            hints: vec![
                (AUTH, "Check GOOGLE_API_KEY or GEMINI_API_KEY environment variable".to_string()),
                (RATE, "API quota exceeded or rate limited".to_string()),
                (BLOCKED, "Content was blocked by safety filters".to_string()),
                (MODEL, "Model may not be available or accessible".to_string()),
            ],
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }
}

fn candidate_text(response: &Value) -> String {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default()
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn identifier(&self) -> &str {
        ID
    }

    fn display_name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let (Some(client), Some(api_key)) = (&self.client, &self.settings.api_key) else {
            return Err(ConverSqlError::backend(
                ID,
                "Gemini not available. Check GOOGLE_API_KEY configuration.",
            ));
        };
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let body = json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": self.settings.max_output_tokens,
                "topP": 0.95,
                "topK": 40
            }
        });
        info!("🤖 Calling Gemini ({})", self.settings.model);

        let request = client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.settings.base_url.trim_end_matches('/'),
                self.settings.model
            ))
            .query(&[("key", api_key.expose())])
            .json(&body);
        let response = send_json(ID, LABEL, &self.hints, request).await?;

        let text = candidate_text(&response);
        if !text.trim().is_empty() {
            return Ok(text.trim().to_string());
        }
        match response["promptFeedback"]["blockReason"].as_str() {
            Some(reason) => Err(ConverSqlError::backend(ID, format!("Response blocked: {}", reason))),
            None => Err(ConverSqlError::backend(ID, "Gemini returned empty response")),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: NAME.to_string(),
            model: self.settings.model.clone(),
            max_tokens: Some(self.settings.max_output_tokens),
            temperature: Some(self.settings.temperature),
            capabilities: vec!["sql_generation".to_string(), "safety_filters".to_string()],
        }
    }
}
