use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConverSqlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ontology error: {0}")]
    Ontology(String),

    /// Failure inside a provider adapter. The message is already user facing.
    #[error("{message}")]
    Backend { provider: String, message: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Query log error: {0}")]
    QueryLog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("SQLite error: {0}")]
    Sqlite(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl ConverSqlError {
    pub fn backend(provider: &str, message: impl Into<String>) -> Self {
        ConverSqlError::Backend {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<polars::error::PolarsError> for ConverSqlError {
    fn from(err: polars::error::PolarsError) -> Self {
        ConverSqlError::Polars(err.to_string())
    }
}

impl From<rusqlite::Error> for ConverSqlError {
    fn from(err: rusqlite::Error) -> Self {
        ConverSqlError::Sqlite(err.to_string())
    }
}

impl From<reqwest::Error> for ConverSqlError {
    fn from(err: reqwest::Error) -> Self {
        ConverSqlError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConverSqlError>;
