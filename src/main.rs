use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conversql::{
    GenerationOrchestrator, OntologyRegistry, ParquetCatalog, QueryAdvisor, SchemaContextBuilder,
    Settings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA_DIR: &str = "data/processed";

#[derive(Parser)]
#[command(name = "conversql")]
#[command(about = "Ask questions about loan performance data in plain English and get SQL back")]
struct Cli {
    /// Preferred AI provider: claude, bedrock, gemini, openai or ollama (overrides AI_PROVIDER)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Ontology JSON file (overrides ONTOLOGY_PATH, default: built-in loan ontology)
    #[arg(long, global = true)]
    ontology: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the schema context sent to the AI provider
    Schema {
        /// Directory containing *.parquet tables
        #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Prefix the tables with the portfolio summary
        #[arg(long)]
        portfolio_header: bool,
    },

    /// Show every provider, its availability and the active one
    Providers,

    /// Generate SQL for a question
    Ask {
        question: String,

        #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Run the generated SQL against the parquet tables
        #[arg(long)]
        execute: bool,

        /// Print the generation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Review a SQL query for risky statements and analysis hints
    Review {
        sql: String,

        /// Question the query answers, for question-specific hints
        #[arg(long)]
        question: Option<String>,
    },

    /// Show a field's business metadata, or list the ontology domains
    Ontology { field: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(provider) = cli.provider {
        settings.preferred_provider = Some(provider.to_lowercase());
    }
    if let Some(path) = cli.ontology {
        settings.ontology_path = Some(path);
    }

    match cli.command {
        Command::Schema {
            data_dir,
            portfolio_header,
        } => {
            let (schema, _) = schema_context(&settings, &data_dir, portfolio_header)?;
            println!("{}", schema);
        }
        Command::Providers => {
            let orchestrator = GenerationOrchestrator::from_settings(&settings).await?;
            println!("{:<10} {:<16} {:<12}", "ID", "NAME", "STATUS");
            for status in orchestrator.provider_status() {
                println!(
                    "{:<10} {:<16} {:<12}{}",
                    status.id,
                    status.name,
                    if status.available { "available" } else { "unavailable" },
                    if status.active { " ← active" } else { "" }
                );
            }
            match orchestrator.model_info() {
                Some(model) => println!("\nActive model: {} ({})", model.model, model.provider),
                None => println!("\nNo provider available."),
            }
        }
        Command::Ask {
            question,
            data_dir,
            execute,
            json,
        } => {
            let (schema, catalog) = schema_context(&settings, &data_dir, false)?;
            let orchestrator = GenerationOrchestrator::from_settings(&settings).await?;
            let result = orchestrator.generate_sql(&question, &schema).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_success() {
                println!("{}", result.sql());
                info!(
                    "Generated by {} in {} ms{}",
                    result.provider(),
                    result.elapsed_ms(),
                    if result.cached() { " (cached)" } else { "" }
                );
            } else {
                eprintln!("{}", result.error());
            }

            if !result.is_success() {
                std::process::exit(1);
            }

            let review = QueryAdvisor::new().review(result.sql());
            for warning in &review.warnings {
                warn!("⚠️  {}", warning);
            }

            if execute {
                let catalog = catalog.context("--execute needs a data directory with parquet tables")?;
                let frame = catalog.execute(result.sql())?;
                println!("{}", frame);
            }
        }
        Command::Review { sql, question } => {
            let advisor = QueryAdvisor::new();
            let review = advisor.review(&sql);
            println!("Statement: {:?} (read-only: {})", review.statement, review.read_only);
            print_section("Warnings", &review.warnings);
            print_section("Suggestions", &review.suggestions);
            print_section("Enhancements", &review.enhancements);
            if let Some(question) = question {
                print_section("Approach", &advisor.suggest_for_question(&question));
            }
        }
        Command::Ontology { field } => {
            let ontology = load_ontology(&settings)?;
            match field {
                Some(name) => {
                    let metadata = ontology
                        .get_field(&name)
                        .with_context(|| format!("Field {} is not in ontology {}", name, ontology.name()))?;
                    println!("{}", serde_json::to_string_pretty(metadata)?);
                }
                None => {
                    println!("{} ({} fields)", ontology.name(), ontology.len());
                    for domain in ontology.all_domains() {
                        println!("  {:<28} {:>3} fields  {}", domain.name, domain.fields.len(), domain.description);
                    }
                }
            }
        }
    }

    Ok(())
}

fn load_ontology(settings: &Settings) -> Result<Arc<OntologyRegistry>> {
    let registry = match &settings.ontology_path {
        Some(path) => OntologyRegistry::load(path)
            .with_context(|| format!("Failed to load ontology from {}", path.display()))?,
        None => OntologyRegistry::builtin()?,
    };
    Ok(Arc::new(registry))
}

/// Schema context for the tables in `data_dir`, plus the catalog when the directory exists.
fn schema_context(
    settings: &Settings,
    data_dir: &Path,
    portfolio_header: bool,
) -> Result<(String, Option<ParquetCatalog>)> {
    let builder = SchemaContextBuilder::new(load_ontology(settings)?).with_portfolio_header(portfolio_header);
    if !data_dir.is_dir() {
        warn!("⚠️  Data directory {} not found", data_dir.display());
        return Ok((builder.build(&[]), None));
    }
    let catalog = ParquetCatalog::open(data_dir)?;
    let tables = catalog.table_schemas()?;
    Ok((builder.build(&tables), Some(catalog)))
}

fn print_section(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}
