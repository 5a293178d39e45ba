//! Generation Orchestrator
//!
//! Picks one provider at construction and turns (question, schema context) into
//! sanitized SQL. `generate_sql` never fails: every outcome, including "no provider",
//! comes back as a `GenerationResult` holding either SQL or an error message.

use crate::cache::ResponseCache;
use crate::config::Settings;
use crate::error::Result;
use crate::prompt::PromptBuilder;
use crate::providers::{ModelInfo, ProviderAdapter, ProviderRegistry, ProviderStatus};
use crate::query_log::{D1QueryLog, QueryLogEntry, QueryLogSink, SqliteQueryLog};
use crate::sanitizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Provider id reported when nothing could be selected.
pub const NO_PROVIDER_ID: &str = "none";

pub const NO_PROVIDER_MESSAGE: &str = "🚫 AI SQL generation unavailable

No AI providers are configured or reachable. Configure at least one of:
- CLAUDE_API_KEY (Claude API)
- AWS_BEARER_TOKEN_BEDROCK or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY (Amazon Bedrock)
- GOOGLE_API_KEY or GEMINI_API_KEY (Google Gemini)
- OPENAI_API_KEY (OpenAI)
- OLLAMA_HOST (local Ollama)

You can still write SQL manually against the schema.";

const EMPTY_SQL_MESSAGE: &str = "Provider returned no SQL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderSelection {
    Selected(String),
    NoProviderAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub question: String,
    pub schema_context: String,
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>, schema_context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            schema_context: schema_context.into(),
        }
    }
}

/// Outcome of one generation call. Exactly one of `sql` and `error` is non-empty,
/// and `provider` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    sql: String,
    error: String,
    provider: String,
    cached: bool,
    elapsed_ms: u64,
}

impl GenerationResult {
    fn success(sql: String, provider: &str, cached: bool, elapsed_ms: u64) -> Self {
        if sql.is_empty() {
            return Self::failure(EMPTY_SQL_MESSAGE, provider, elapsed_ms);
        }
        Self {
            sql,
            error: String::new(),
            provider: provider_or_unknown(provider),
            cached,
            elapsed_ms,
        }
    }

    fn failure(error: &str, provider: &str, elapsed_ms: u64) -> Self {
        let error = if error.trim().is_empty() {
            format!("{} failed without an error message", provider_or_unknown(provider))
        } else {
            error.to_string()
        };
        Self {
            sql: String::new(),
            error,
            provider: provider_or_unknown(provider),
            cached: false,
            elapsed_ms,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn cached(&self) -> bool {
        self.cached
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn is_success(&self) -> bool {
        !self.sql.is_empty()
    }

    /// `(sql, error, provider)`
    pub fn into_parts(self) -> (String, String, String) {
        (self.sql, self.error, self.provider)
    }
}

fn provider_or_unknown(provider: &str) -> String {
    if provider.is_empty() {
        "unknown".to_string()
    } else {
        provider.to_string()
    }
}

pub struct GenerationOrchestrator {
    registry: ProviderRegistry,
    selected: Option<Arc<dyn ProviderAdapter>>,
    prompt: PromptBuilder,
    cache: Option<Arc<ResponseCache>>,
    sinks: Vec<Arc<dyn QueryLogSink>>,
}

pub struct OrchestratorBuilder {
    registry: ProviderRegistry,
    preferred: Option<String>,
    prompt: PromptBuilder,
    cache: Option<Arc<ResponseCache>>,
    sinks: Vec<Arc<dyn QueryLogSink>>,
}

impl OrchestratorBuilder {
    pub fn preferred(mut self, provider: Option<impl Into<String>>) -> Self {
        self.preferred = provider.map(Into::into);
        self
    }

    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn QueryLogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> GenerationOrchestrator {
        let selected = self.registry.select(self.preferred.as_deref());
        match (&selected, &self.preferred) {
            (Some(adapter), Some(preferred)) if adapter.identifier() != preferred => warn!(
                "⚠️  Preferred provider '{}' unavailable, using {}",
                preferred,
                adapter.identifier()
            ),
            (Some(adapter), _) => info!("✅ Using AI provider: {}", adapter.display_name()),
            (None, _) => warn!("🚫 No AI provider available; SQL generation disabled"),
        }
        GenerationOrchestrator {
            registry: self.registry,
            selected,
            prompt: self.prompt,
            cache: self.cache,
            sinks: self.sinks,
        }
    }
}

impl GenerationOrchestrator {
    pub fn builder(registry: ProviderRegistry) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            preferred: None,
            prompt: PromptBuilder::default(),
            cache: None,
            sinks: Vec::new(),
        }
    }

    pub fn new(registry: ProviderRegistry, preferred: Option<&str>) -> Self {
        Self::builder(registry).preferred(preferred).build()
    }

    /// Full wiring from configuration: every built-in backend, prompt cache and
    /// query log sinks. Loan domain rules are added when the built-in ontology is used.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = ProviderRegistry::from_settings(settings).await;
        Self::from_settings_with_registry(settings, registry)
    }

    /// Same wiring as `from_settings`, over an existing registry. Clones of one
    /// registry share adapter instances, their probes and their rate limiters.
    pub fn from_settings_with_registry(settings: &Settings, registry: ProviderRegistry) -> Result<Self> {
        let mut prompt = PromptBuilder::new(settings.sql_dialect.clone());
        if settings.ontology_path.is_none() {
            prompt = prompt.with_domain_rules(PromptBuilder::loan_domain_rules());
        }

        let mut builder = Self::builder(registry)
            .preferred(settings.preferred_provider.clone())
            .prompt(prompt);
        if settings.prompt_cache_enabled {
            builder = builder.cache(Arc::new(ResponseCache::new(settings.prompt_cache_ttl)));
        }
        if let Some(path) = &settings.query_log_path {
            builder = builder.sink(Arc::new(SqliteQueryLog::open(path)?));
        }
        if let Some(d1) = &settings.d1 {
            builder = builder.sink(Arc::new(D1QueryLog::new(d1.clone(), settings.request_timeout)?));
        }
        Ok(builder.build())
    }

    pub fn state(&self) -> ProviderSelection {
        match &self.selected {
            Some(adapter) => ProviderSelection::Selected(adapter.identifier().to_string()),
            None => ProviderSelection::NoProviderAvailable,
        }
    }

    pub fn active_provider(&self) -> Option<&str> {
        self.selected.as_ref().map(|a| a.identifier())
    }

    pub fn is_available(&self) -> bool {
        self.selected.is_some()
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.registry.status(self.active_provider())
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.selected.as_ref().map(|a| a.model_info())
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompt
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_sql(&request.question, &request.schema_context).await
    }

    pub async fn generate_sql(&self, question: &str, schema_context: &str) -> GenerationResult {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let Some(adapter) = &self.selected else {
            return GenerationResult::failure(NO_PROVIDER_MESSAGE, NO_PROVIDER_ID, elapsed());
        };
        let provider = adapter.identifier();

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| ResponseCache::cache_key(question, schema_context, provider));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(sql) = cache.get(key) {
                info!("💾 Prompt cache hit for {}", provider);
                return GenerationResult::success(sql, provider, true, elapsed());
            }
        }

        let prompt = self.prompt.build(question, schema_context);
        let result = match adapter.generate(&prompt).await {
            Ok(text) => GenerationResult::success(sanitizer::clean(&text), provider, false, elapsed()),
            Err(e) => {
                warn!("❌ {} generation failed: {}", provider, e);
                GenerationResult::failure(&e.to_string(), provider, elapsed())
            }
        };

        if result.is_success() {
            if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                cache.insert(key, result.sql.clone());
            }
        }
        self.record(question, &result).await;
        result
    }

    async fn record(&self, question: &str, result: &GenerationResult) {
        if self.sinks.is_empty() {
            return;
        }
        let entry = QueryLogEntry::new(
            question,
            &result.sql,
            &result.error,
            &result.provider,
            result.elapsed_ms,
        );
        for sink in &self.sinks {
            if let Err(e) = sink.record(&entry).await {
                warn!("⚠️  Query log sink '{}' failed: {}", sink.name(), e);
            }
        }
    }
}
