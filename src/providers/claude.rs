//! Anthropic Messages API adapter.

use super::http::{build_client, send_json, Hints};
use super::{ModelInfo, ProviderAdapter, RateLimiter};
use crate::config::ClaudeSettings;
use crate::error::{ConverSqlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const ID: &str = "claude";
const NAME: &str = "Claude API";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const AUTH: &[&str] = &["api_key", "api key", "authentication"];
const RATE: &[&str] = &["rate limit", "rate_limit", "quota"];
const MODEL: &[&str] = &["model"];

pub struct ClaudeAdapter {
    settings: ClaudeSettings,
    client: Option<Client>,
    limiter: Option<RateLimiter>,
    hints: Hints,
}

impl ClaudeAdapter {
    pub fn new(settings: ClaudeSettings, timeout: Duration) -> Self {
        let client = match settings.api_key {
            Some(_) => build_client(ID, timeout),
            None => {
                debug!("CLAUDE_API_KEY not set, Claude disabled");
                None
            }
        };
        let hints = vec![
            (AUTH, "Check CLAUDE_API_KEY environment variable".to_string()),
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

/// Text of the first `text` content block.
fn extract_text(response: &Value) -> Option<&str> {
    response["content"]
        .as_array()?
        .iter()
        .filter_map(|block| block["text"].as_str())
        .next()
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
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
                "Claude API not available. Check CLAUDE_API_KEY configuration.",
            ));
        };
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": 0.0,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });
        info!("🤖 Calling Claude ({})", self.settings.model);

        let request = client
            .post(format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/')))
            .header("x-api-key", api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = send_json(ID, NAME, &self.hints, request).await?;

        match extract_text(&response).map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ConverSqlError::backend(ID, "Claude returned empty response")),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "Anthropic Claude".to_string(),
            model: self.settings.model.clone(),
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(0.0),
            capabilities: vec!["sql_generation".to_string(), "long_context".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::http::testing::{serve_once, serve_silence};
    use super::*;
    use crate::config::Secret;

    fn settings(base_url: &str, api_key: Option<&str>) -> ClaudeSettings {
        ClaudeSettings {
            api_key: api_key.map(Secret::new),
            model: "claude-test".to_string(),
            base_url: base_url.to_string(),
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn missing_key_means_unavailable() {
        let adapter = ClaudeAdapter::new(settings("http://127.0.0.1:9", None), Duration::from_secs(1));
        assert!(!adapter.is_available());
        let err = adapter.generate("q").await.unwrap_err();
        assert_eq!(err.to_string(), "Claude API not available. Check CLAUDE_API_KEY configuration.");
    }

    #[tokio::test]
    async fn sends_messages_request_and_reads_first_text_block() {
        let (url, server) = serve_once(
            200,
            r#"{"content":[{"type":"text","text":"SELECT 1"}],"stop_reason":"end_turn"}"#,
        )
        .await;
        let adapter = ClaudeAdapter::new(settings(&url, Some("sk-test")), Duration::from_secs(5));
        assert!(adapter.is_available());

        let text = adapter.generate("How many loans?").await.unwrap();
        assert_eq!(text, "SELECT 1");

        let request = server.await.unwrap();
        assert_eq!(request.request_line(), "POST /v1/messages HTTP/1.1");
        assert_eq!(request.header("x-api-key").as_deref(), Some("sk-test"));
        assert_eq!(request.header("anthropic-version").as_deref(), Some("2023-06-01"));
        let body = request.json();
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "How many loans?");
    }

    #[tokio::test]
    async fn authentication_failure_carries_key_hint() {
        let (url, server) = serve_once(
            401,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        )
        .await;
        let adapter = ClaudeAdapter::new(settings(&url, Some("bad")), Duration::from_secs(5));
        let err = adapter.generate("q").await.unwrap_err();
        server.await.unwrap();

        let message = err.to_string();
        assert!(message.starts_with("Claude API error: HTTP 401"));
        assert!(message.ends_with("Check CLAUDE_API_KEY environment variable"));
    }

    #[tokio::test]
    async fn silent_backend_times_out_with_message() {
        let (url, server) = serve_silence().await;
        let adapter = ClaudeAdapter::new(settings(&url, Some("k")), Duration::from_millis(300));

        let started = std::time::Instant::now();
        let err = adapter.generate("q").await.unwrap_err();
        server.abort();

        assert_eq!(err.to_string(), "Claude API error: request timed out");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn rate_hint_needs_a_rate_limit_error() {
        let (url, server) = serve_once(
            500,
            r#"{"type":"error","error":{"type":"api_error","message":"could not generate an accurate reply"}}"#,
        )
        .await;
        let adapter = ClaudeAdapter::new(settings(&url, Some("k")), Duration::from_secs(5));
        let message = adapter.generate("q").await.unwrap_err().to_string();
        server.await.unwrap();
        assert!(message.starts_with("Claude API error: HTTP 500"));
        assert!(!message.contains('\n'));

        let (url, server) = serve_once(
            429,
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"Number of requests exceeded"}}"#,
        )
        .await;
        let adapter = ClaudeAdapter::new(settings(&url, Some("k")), Duration::from_secs(5));
        let message = adapter.generate("q").await.unwrap_err().to_string();
        server.await.unwrap();
        assert!(message.ends_with("API rate limit or quota exceeded"));
    }

    #[tokio::test]
    async fn blank_text_is_an_error() {
        let (url, server) = serve_once(200, r#"{"content":[{"type":"text","text":"  "}]}"#).await;
        let adapter = ClaudeAdapter::new(settings(&url, Some("k")), Duration::from_secs(5));
        let err = adapter.generate("q").await.unwrap_err();
        server.await.unwrap();
        assert_eq!(err.to_string(), "Claude returned empty response");
    }
}
