//! Schema Context Builder
//!
//! Merges live table/column information with ontology entries into the text block
//! that is embedded into the generation prompt. Output is a pure function of the
//! input tables and the registry, so identical inputs give byte-identical context.

use crate::ontology::{FieldMetadata, OntologyRegistry, PortfolioContext};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Returned instead of an empty string when there are no tables to describe.
pub const NO_SCHEMA_AVAILABLE: &str = "-- No schema available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Type name as reported by the analytical engine
    pub engine_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, engine_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine_type: engine_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Columns in the source's native order
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Convenience for `("data", [("LOAN_ID", "VARCHAR"), ...])` style inputs.
    pub fn from_pairs<'a>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self::new(
            name,
            columns
                .into_iter()
                .map(|(column, ty)| ColumnSchema::new(column, ty))
                .collect(),
        )
    }
}

pub struct SchemaContextBuilder {
    ontology: Arc<OntologyRegistry>,
    portfolio_header: bool,
}

impl SchemaContextBuilder {
    pub fn new(ontology: Arc<OntologyRegistry>) -> Self {
        Self {
            ontology,
            portfolio_header: false,
        }
    }

    /// Prefix the tables with the dataset-level portfolio summary, when the ontology has one.
    pub fn with_portfolio_header(mut self, enabled: bool) -> Self {
        self.portfolio_header = enabled;
        self
    }

    pub fn build(&self, tables: &[TableSchema]) -> String {
        if tables.is_empty() {
            return NO_SCHEMA_AVAILABLE.to_string();
        }

        let body = tables.iter().map(|t| self.render_table(t)).join("\n\n");

        match self.ontology.portfolio().filter(|_| self.portfolio_header) {
            Some(portfolio) => format!("{}\n\n{}", render_portfolio(portfolio), body),
            None => body,
        }
    }

    fn render_table(&self, table: &TableSchema) -> String {
        let mut lines = Vec::with_capacity(table.columns.len() + 3);
        lines.push(format!("-- TABLE: {}", table.name.to_uppercase()));
        lines.push(format!("CREATE TABLE {} (", table.name));
        for column in &table.columns {
            lines.push(self.render_column(column));
        }
        lines.push(");".to_string());
        lines.join("\n")
    }

    fn render_column(&self, column: &ColumnSchema) -> String {
        match self.ontology.get_field(&column.name) {
            Some(meta) => format!(
                "    {} {} -- {}",
                column.name,
                column.engine_type,
                annotation(meta)
            ),
            None => format!("    {} {}", column.name, column.engine_type),
        }
    }
}

fn annotation(meta: &FieldMetadata) -> String {
    let mut parts = vec![meta.description.clone(), meta.business_context.clone()];
    if let Some(impact) = meta.risk_impact.as_deref().filter(|r| !r.is_empty()) {
        parts.push(format!("Risk: {}", impact));
    }
    parts.into_iter().filter(|p| !p.is_empty()).join(" | ")
}

fn render_portfolio(portfolio: &PortfolioContext) -> String {
    let tier = |name: &str| {
        portfolio
            .risk_framework
            .risk_tiers
            .get(name)
            .map(String::as_str)
            .unwrap_or("")
    };
    let summary = |key: &str| {
        portfolio
            .performance_summary
            .get(key)
            .map(String::as_str)
            .unwrap_or("")
    };

    [
        format!("-- Portfolio: {}", portfolio.overview.coverage),
        format!("-- Vintage: {}", portfolio.overview.vintage_range),
        format!("-- Geography: {}", portfolio.overview.geographic_scope),
        format!("-- Performance: {} lifetime loss rate", summary("lifetime_loss_rate")),
        format!("-- Credit Quality: {}", summary("credit_quality")),
        "--".to_string(),
        "-- RISK ASSESSMENT FRAMEWORK:".to_string(),
        format!("-- {}", portfolio.risk_framework.credit_triangle),
        format!("-- Super Prime: {}", tier("super_prime")),
        format!("-- Prime: {}", tier("prime")),
    ]
    .join("\n")
}
