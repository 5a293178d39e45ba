//! Local Ollama adapter. Availability comes from a single reachability probe at
//! construction.

use super::http::{build_client, send_json, Hints};
use super::{ModelInfo, ProviderAdapter, RateLimiter};
use crate::config::OllamaSettings;
use crate::error::{ConverSqlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ID: &str = "ollama";
const NAME: &str = "Ollama";
const LABEL: &str = "Ollama API";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const MODEL: &[&str] = &["model", "not found"];

pub struct OllamaAdapter {
    settings: OllamaSettings,
    client: Option<Client>,
    limiter: Option<RateLimiter>,
    hints: Hints,
}

impl OllamaAdapter {
    /// Build the adapter, probing `GET /api/tags` once when a host is configured.
    pub async fn connect(settings: OllamaSettings, timeout: Duration) -> Self {
        let client = match (&settings.host, build_client(ID, timeout)) {
            (Some(host), Some(client)) => {
                if probe(&client, host, timeout.min(PROBE_TIMEOUT)).await {
                    Some(client)
                } else {
                    None
                }
            }
            (None, _) => {
                debug!("OLLAMA_HOST not set, Ollama disabled");
                None
            }
            (Some(_), None) => None,
        };
        Self::with_client(settings, client)
    }

    fn with_client(settings: OllamaSettings, client: Option<Client>) -> Self {
        let hints = vec![(
            MODEL,
            format!("Model {} may not be pulled. Run: ollama pull {}", settings.model, settings.model),
        )];
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

    fn host(&self) -> &str {
        self.settings.host.as_deref().unwrap_or_default().trim_end_matches('/')
    }
}

async fn probe(client: &Client, host: &str, timeout: Duration) -> bool {
    let url = format!("{}/api/tags", host.trim_end_matches('/'));
    match client.get(&url).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            warn!("⚠️  Ollama at {} answered {}", host, response.status());
            false
        }
        Err(e) => {
            warn!("⚠️  Ollama at {} unreachable: {}", host, e);
            false
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
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
        let Some(client) = &self.client else {
            return Err(ConverSqlError::backend(
                ID,
                "Ollama not available. Check OLLAMA_HOST and that the server is running.",
            ));
        };
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let body = json!({
            "model": self.settings.model,
            "prompt": prompt,
            "stream": false,
            "options": {"temperature": 0.0}
        });
        info!("🤖 Calling Ollama ({} at {})", self.settings.model, self.host());

        let request = client.post(format!("{}/api/generate", self.host())).json(&body);
        let response = send_json(ID, LABEL, &self.hints, request).await?;

        match response["response"].as_str().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ConverSqlError::backend(ID, "Ollama returned empty response")),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: NAME.to_string(),
            model: self.settings.model.clone(),
            max_tokens: None,
            temperature: Some(0.0),
            capabilities: vec!["sql_generation".to_string(), "local".to_string()],
        }
    }
}
