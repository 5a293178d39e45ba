pub mod advisor;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ontology;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod query_log;
pub mod sanitizer;
pub mod schema_context;

pub use advisor::{QueryAdvisor, QueryReview, StatementKind};
pub use cache::ResponseCache;
pub use catalog::ParquetCatalog;
pub use config::Settings;
pub use error::{ConverSqlError, Result};
pub use ontology::{BusinessDomain, FieldMetadata, OntologyDomain, OntologyRegistry};
pub use orchestrator::{
    GenerationOrchestrator, GenerationRequest, GenerationResult, ProviderSelection,
};
pub use prompt::PromptBuilder;
pub use providers::{ProviderAdapter, ProviderRegistry, ProviderStatus, RateLimiter};
pub use query_log::{QueryLogEntry, QueryLogSink, SqliteQueryLog};
pub use schema_context::{ColumnSchema, SchemaContextBuilder, TableSchema, NO_SCHEMA_AVAILABLE};
