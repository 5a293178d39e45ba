use async_trait::async_trait;
use conversql::{
    ConverSqlError, GenerationOrchestrator, GenerationRequest, OntologyRegistry, PromptBuilder,
    ProviderAdapter, ProviderRegistry, ProviderSelection, QueryAdvisor, SchemaContextBuilder,
    SqliteQueryLog, TableSchema, NO_SCHEMA_AVAILABLE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Adapter that replays a fixed reply and remembers every prompt.
struct ScriptedAdapter {
    id: &'static str,
    available: bool,
    reply: Result<&'static str, &'static str>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    fn new(id: &'static str, available: bool, reply: Result<&'static str, &'static str>) -> Arc<Self> {
        Arc::new(Self {
            id,
            available,
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn identifier(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        self.id
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, prompt: &str) -> conversql::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .map(str::to_string)
            .map_err(|e| ConverSqlError::backend(self.id, e))
    }
}

fn registry(adapters: &[Arc<ScriptedAdapter>]) -> ProviderRegistry {
    ProviderRegistry::with_adapters(
        adapters
            .iter()
            .map(|a| a.clone() as Arc<dyn ProviderAdapter>)
            .collect(),
    )
}

fn loan_schema() -> String {
    let ontology = Arc::new(OntologyRegistry::builtin().unwrap());
    SchemaContextBuilder::new(ontology).build(&[TableSchema::from_pairs(
        "data",
        [("LOAN_ID", "VARCHAR"), ("STATE", "VARCHAR"), ("CSCORE_B", "SMALLINT")],
    )])
}

#[tokio::test]
async fn question_to_sql_end_to_end() {
    let adapter = ScriptedAdapter::new(
        "claude",
        true,
        Ok("Here you go:\n```sql\nSELECT * FROM data WHERE STATE='CA' AND CSCORE_B<620;\n```"),
    );
    let prompt = PromptBuilder::new("DuckDB").with_domain_rules(PromptBuilder::loan_domain_rules());
    let orchestrator = GenerationOrchestrator::builder(registry(&[adapter.clone()]))
        .prompt(prompt.clone())
        .build();

    let schema = loan_schema();
    let result = orchestrator
        .generate_sql("loans in CA with score under 620", &schema)
        .await;

    assert_eq!(result.sql(), "SELECT * FROM data WHERE STATE='CA' AND CSCORE_B<620");
    assert_eq!(result.error(), "");
    assert_eq!(result.provider(), "claude");

    let prompts = adapter.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], prompt.build("loans in CA with score under 620", &schema));
    assert!(prompts[0].contains("    STATE VARCHAR -- "));

    let review = QueryAdvisor::new().review(result.sql());
    assert!(review.read_only);
}

#[tokio::test]
async fn fallback_uses_registration_order() {
    let claude = ScriptedAdapter::new("claude", false, Ok("SELECT 'claude'"));
    let bedrock = ScriptedAdapter::new("bedrock", true, Ok("SELECT 'bedrock'"));
    let gemini = ScriptedAdapter::new("gemini", true, Ok("SELECT 'gemini'"));
    let orchestrator = GenerationOrchestrator::new(
        registry(&[claude.clone(), bedrock.clone(), gemini.clone()]),
        Some("claude"),
    );

    assert_eq!(orchestrator.state(), ProviderSelection::Selected("bedrock".to_string()));
    let result = orchestrator.generate(&GenerationRequest::new("q", NO_SCHEMA_AVAILABLE)).await;
    assert_eq!(result.sql(), "SELECT 'bedrock'");
    assert_eq!(claude.calls.load(Ordering::SeqCst), 0);
    assert_eq!(gemini.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_retry_across_providers() {
    let first = ScriptedAdapter::new("claude", true, Err("Claude API error: HTTP 529 Overloaded"));
    let second = ScriptedAdapter::new("gemini", true, Ok("SELECT 1"));
    let orchestrator = GenerationOrchestrator::new(registry(&[first.clone(), second.clone()]), None);

    let (sql, error, provider) = orchestrator.generate_sql("q", "s").await.into_parts();
    assert!(sql.is_empty());
    assert_eq!(error, "Claude API error: HTTP 529 Overloaded");
    assert_eq!(provider, "claude");
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_provider_never_reaches_an_adapter() {
    let adapters = [
        ScriptedAdapter::new("claude", false, Ok("SELECT 1")),
        ScriptedAdapter::new("gemini", false, Ok("SELECT 1")),
    ];
    let orchestrator = GenerationOrchestrator::new(registry(&adapters), None);
    let result = orchestrator.generate_sql("any question", "any schema").await;

    assert!(result.sql().is_empty());
    assert!(!result.error().is_empty());
    assert_eq!(result.provider(), "none");
    assert!(adapters.iter().all(|a| a.calls.load(Ordering::SeqCst) == 0));
}

#[tokio::test]
async fn every_attempt_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(SqliteQueryLog::open(dir.path().join("queries.db")).unwrap());
    let adapter = ScriptedAdapter::new("ollama", true, Ok("SELECT COUNT(*) FROM data"));
    let orchestrator = GenerationOrchestrator::builder(registry(&[adapter]))
        .sink(log.clone())
        .build();

    orchestrator.generate_sql("how many loans", "s").await;
    orchestrator.generate_sql("how many loans in TX", "s").await;

    let entries = log.recent(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.success && e.provider == "ollama"));
}
