//! Prompt construction for SQL generation.
//!
//! Layout is fixed: instruction preamble (with optional domain rules), then the
//! schema context, then the user's question. Identical inputs give identical prompts.

use crate::config::DEFAULT_SQL_DIALECT;

const LOAN_DOMAIN_RULES: &str = include_str!("../data/loan_domain_rules.md");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    dialect: String,
    domain_rules: Option<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SQL_DIALECT)
    }
}

impl PromptBuilder {
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            domain_rules: None,
        }
    }

    pub fn with_domain_rules(mut self, rules: impl Into<String>) -> Self {
        let rules = rules.into();
        self.domain_rules = if rules.trim().is_empty() {
            None
        } else {
            Some(rules.trim().to_string())
        };
        self
    }

    /// Built-in single-family loan performance guidance.
    pub fn loan_domain_rules() -> &'static str {
        LOAN_DOMAIN_RULES
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn build(&self, question: &str, schema_context: &str) -> String {
        let mut prompt = format!(
            "You are an expert data analyst. Write a single, clean {dialect}-compatible SQL query.\n\
             Rules:\n\
             - Return exactly one read-only statement (SELECT or WITH ... SELECT).\n\
             - Never use INSERT, UPDATE, DELETE, DROP, ALTER, TRUNCATE or CREATE.\n\
             - Use table names exactly as they appear in the schema context.\n\
             - Respond with the SQL only, no explanations.\n",
            dialect = self.dialect
        );
        if let Some(rules) = &self.domain_rules {
            prompt.push('\n');
            prompt.push_str(rules);
            prompt.push('\n');
        }
        prompt.push_str("\nDatabase Schema Context:\n");
        prompt.push_str(schema_context);
        prompt.push_str("\n\nUser Question: ");
        prompt.push_str(question);
        prompt
    }
}
