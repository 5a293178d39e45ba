//! OpenAI-compatible Chat Completions adapter.

use super::http::{build_client, send_json, Hints};
use super::{ModelInfo, ProviderAdapter, RateLimiter};
use crate::config::OpenAiSettings;
use crate::error::{ConverSqlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

pub const ID: &str = "openai";
const NAME: &str = "OpenAI";
const LABEL: &str = "OpenAI API";

const AUTH: &[&str] = &["api key", "incorrect api key", "invalid_api_key"];
const RATE: &[&str] = &["rate limit", "quota"];
const MODEL: &[&str] = &["model"];

pub struct OpenAiAdapter {
    settings: OpenAiSettings,
    client: Option<Client>,
    limiter: Option<RateLimiter>,
    hints: Hints,
}

impl OpenAiAdapter {
    pub fn new(settings: OpenAiSettings, timeout: Duration) -> Self {
        let client = match settings.api_key {
            Some(_) => build_client(ID, timeout),
            None => {
                debug!("OPENAI_API_KEY not set, OpenAI disabled");
                None
            }
        };
        let hints = vec![
            (AUTH, "Check OPENAI_API_KEY environment variable".to_string()),
            (RATE, "API rate limit or quota exceeded".to_string()),
            (MODEL, format!("Model {} may not be available or accessible", settings.model)),
        ];
        Self {
            settings,
            client,
            limiter: None,
            hints,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
                "OpenAI not available. Check OPENAI_API_KEY configuration.",
            ));
        };
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let body = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
            "max_tokens": self.settings.max_tokens
        });
        info!("🤖 Calling OpenAI ({})", self.settings.model);

        let request = client
            .post(format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/')))
            .bearer_auth(api_key.expose())
            .json(&body);
        let response = send_json(ID, LABEL, &self.hints, request).await?;

        let choice = &response["choices"][0];
        if choice["finish_reason"].as_str() == Some("content_filter") {
            return Err(ConverSqlError::backend(
                ID,
                "Response blocked: content_filter",
            ));
        }
        match choice["message"]["content"].as_str().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ConverSqlError::backend(ID, "OpenAI returned empty response")),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: NAME.to_string(),
            model: self.settings.model.clone(),
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(0.0),
            capabilities: vec!["sql_generation".to_string()],
        }
    }
}
