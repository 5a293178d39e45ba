//! Provider Adapters
//!
//! Uniform wrapper around each AI backend. Everything backend specific (auth,
//! request shape, response envelope) stays inside the adapter module; the
//! orchestrator only sees `ProviderAdapter`.
//!
//! Adding a backend means one new module plus one `Backend` variant.

pub mod bedrock;
pub mod claude;
pub mod gemini;
mod http;
pub mod ollama;
pub mod openai;
pub mod rate_limit;
pub mod sigv4;

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub use bedrock::BedrockAdapter;
pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use rate_limit::RateLimiter;

#[cfg(test)]
pub(crate) use http::testing as http_testing;

/// Contract every backend satisfies.
///
/// `is_available` is decided during construction and must not do I/O afterwards.
/// `generate` returns either non-empty text or a `ConverSqlError::Backend` carrying a
/// user-facing message; backend failures never escape as anything else.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable lowercase identifier used for selection and reporting
    fn identifier(&self) -> &str;

    fn display_name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.display_name().to_string(),
            ..ModelInfo::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub id: String,
    pub name: String,
    pub available: bool,
    pub active: bool,
}

/// Closed set of built-in backends, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Claude,
    Bedrock,
    Gemini,
    OpenAi,
    Ollama,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Claude,
        Backend::Bedrock,
        Backend::Gemini,
        Backend::OpenAi,
        Backend::Ollama,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Backend::Claude => claude::ID,
            Backend::Bedrock => bedrock::ID,
            Backend::Gemini => gemini::ID,
            Backend::OpenAi => openai::ID,
            Backend::Ollama => ollama::ID,
        }
    }

    pub fn from_id(id: &str) -> Option<Backend> {
        Backend::ALL.into_iter().find(|b| b.id() == id)
    }

    async fn build(self, settings: &Settings) -> Arc<dyn ProviderAdapter> {
        let timeout = settings.request_timeout;
        let limiter = || {
            settings
                .rate_limit
                .map(|rl| RateLimiter::new(rl.max_calls, rl.window))
        };
        match self {
            Backend::Claude => Arc::new(
                ClaudeAdapter::new(settings.claude.clone(), timeout).with_rate_limiter(limiter()),
            ),
            Backend::Bedrock => Arc::new(
                BedrockAdapter::new(settings.bedrock.clone(), timeout).with_rate_limiter(limiter()),
            ),
            Backend::Gemini => Arc::new(
                GeminiAdapter::new(settings.gemini.clone(), timeout).with_rate_limiter(limiter()),
            ),
            Backend::OpenAi => Arc::new(
                OpenAiAdapter::new(settings.openai.clone(), timeout).with_rate_limiter(limiter()),
            ),
            Backend::Ollama => Arc::new(
                OllamaAdapter::connect(settings.ollama.clone(), timeout)
                    .await
                    .with_rate_limiter(limiter()),
            ),
        }
    }
}

/// Ordered adapters, instantiated once and shared for the life of the process.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Instantiate every built-in backend from settings.
    pub async fn from_settings(settings: &Settings) -> Self {
        let mut adapters = Vec::with_capacity(Backend::ALL.len());
        for backend in Backend::ALL {
            let adapter = backend.build(settings).await;
            info!(
                "Provider {} ({}): {}",
                adapter.identifier(),
                adapter.display_name(),
                if adapter.is_available() { "available" } else { "unavailable" }
            );
            adapters.push(adapter);
        }
        Self { adapters }
    }

    /// Registry over caller-supplied adapters, kept in the given order.
    pub fn with_adapters(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.identifier() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Preferred adapter if it is available, else the first available one.
    pub fn select(&self, preferred: Option<&str>) -> Option<Arc<dyn ProviderAdapter>> {
        preferred
            .and_then(|id| self.get(id))
            .filter(|a| a.is_available())
            .or_else(|| self.adapters.iter().find(|a| a.is_available()))
            .cloned()
    }

    pub fn status(&self, active: Option<&str>) -> Vec<ProviderStatus> {
        self.adapters
            .iter()
            .map(|a| ProviderStatus {
                id: a.identifier().to_string(),
                name: a.display_name().to_string(),
                available: a.is_available(),
                active: active == Some(a.identifier()),
            })
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.iter().map(|a| (a.identifier(), a.is_available())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConverSqlError;

    struct Fixed {
        id: &'static str,
        available: bool,
    }

    #[async_trait]
    impl ProviderAdapter for Fixed {
        fn identifier(&self) -> &str {
            self.id
        }
        fn display_name(&self) -> &str {
            self.id
        }
        fn is_available(&self) -> bool {
            self.available
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(ConverSqlError::backend(self.id, "unused"))
        }
    }

    fn registry(entries: &[(&'static str, bool)]) -> ProviderRegistry {
        ProviderRegistry::with_adapters(
            entries.iter()
                .map(|&(id, available)| Arc::new(Fixed { id, available }) as Arc<dyn ProviderAdapter>)
                .collect(),
        )
    }

    #[test]
    fn preferred_available_provider_wins() {
        let r = registry(&[("claude", true), ("gemini", true)]);
        assert_eq!(r.select(Some("gemini")).unwrap().identifier(), "gemini");
    }

    #[test]
    fn unavailable_preference_falls_back_in_registration_order() {
        let r = registry(&[("claude", false), ("bedrock", true), ("gemini", true)]);
        assert_eq!(r.select(Some("claude")).unwrap().identifier(), "bedrock");
        assert_eq!(r.select(Some("nonexistent")).unwrap().identifier(), "bedrock");
        assert_eq!(r.select(None).unwrap().identifier(), "bedrock");
    }

    #[test]
    fn nothing_available_selects_nothing() {
        assert!(registry(&[("claude", false)]).select(Some("claude")).is_none());
        assert!(ProviderRegistry::default().select(None).is_none());
    }

    #[test]
    fn status_marks_active_provider() {
        let r = registry(&[("claude", false), ("bedrock", true)]);
        let status = r.status(Some("bedrock"));
        assert_eq!(status.len(), 2);
        assert!(!status[0].active && !status[0].available);
        assert!(status[1].active && status[1].available);
    }

    #[test]
    fn backend_ids_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(Backend::from_id(backend.id()), Some(backend));
        }
        assert_eq!(Backend::from_id("watson"), None);
    }

    #[tokio::test]
    async fn unconfigured_settings_register_every_backend_unavailable() {
        let r = ProviderRegistry::from_settings(&Settings::empty()).await;
        let ids: Vec<&str> = r.iter().map(|a| a.identifier()).collect();
        assert_eq!(ids, vec!["claude", "bedrock", "gemini", "openai", "ollama"]);
        assert!(r.iter().all(|a| !a.is_available()));
    }
}
