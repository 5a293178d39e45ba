//! Query log sinks
//!
//! Best-effort record of every generation attempt. Sinks report their own failures,
//! but the orchestrator only logs them; a broken sink never changes a result.
//!
//! - `SqliteQueryLog`: local SQLite file (`QUERY_LOG_PATH`)
//! - `D1QueryLog`: Cloudflare D1 over its REST API

use crate::config::D1Settings;
use crate::error::{ConverSqlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const D1_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const INSERT_SQL: &str = "INSERT INTO user_queries \
     (id, created_at, question, sql_query, ai_provider, execution_time_ms, success, error) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// One generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub sql: String,
    pub provider: String,
    pub elapsed_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl QueryLogEntry {
    pub fn new(question: &str, sql: &str, error: &str, provider: &str, elapsed_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            question: question.to_string(),
            sql: sql.to_string(),
            provider: provider.to_string(),
            elapsed_ms,
            success: error.is_empty(),
            error: (!error.is_empty()).then(|| error.to_string()),
        }
    }
}

#[async_trait]
pub trait QueryLogSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, entry: &QueryLogEntry) -> Result<()>;
}

pub struct SqliteQueryLog {
    db: Mutex<Connection>,
}

impl SqliteQueryLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)
            .map_err(|e| ConverSqlError::QueryLog(format!("Failed to open {}: {}", path.display(), e)))?;
        let log = Self::from_connection(db)?;
        info!("📝 Query log at {}", path.display());
        Ok(log)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_queries (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                question TEXT NOT NULL,
                sql_query TEXT NOT NULL,
                ai_provider TEXT NOT NULL,
                execution_time_ms INTEGER NOT NULL,
                success INTEGER NOT NULL,
                error TEXT
            )
            "#,
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_queries_created_at ON user_queries(created_at)",
            [],
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| ConverSqlError::QueryLog("query log connection poisoned".to_string()))
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<QueryLogEntry>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(
            "SELECT id, created_at, question, sql_query, ai_provider, execution_time_ms, success, error \
             FROM user_queries ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                QueryLogEntry {
                    id: Uuid::nil(),
                    timestamp: DateTime::<Utc>::MIN_UTC,
                    question: row.get(2)?,
                    sql: row.get(3)?,
                    provider: row.get(4)?,
                    elapsed_ms: row.get::<_, i64>(5)?.max(0) as u64,
                    success: row.get(6)?,
                    error: row.get(7)?,
                },
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, created_at, mut entry) = row?;
            entry.id = Uuid::parse_str(&id)
                .map_err(|e| ConverSqlError::QueryLog(format!("bad id {}: {}", id, e)))?;
            entry.timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| ConverSqlError::QueryLog(format!("bad timestamp {}: {}", created_at, e)))?
                .with_timezone(&Utc);
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize> {
        let db = self.lock()?;
        let n: i64 = db.query_row("SELECT COUNT(*) FROM user_queries", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

#[async_trait]
impl QueryLogSink for SqliteQueryLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record(&self, entry: &QueryLogEntry) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            INSERT_SQL,
            params![
                entry.id.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.question,
                entry.sql,
                entry.provider,
                entry.elapsed_ms as i64,
                entry.success,
                entry.error,
            ],
        )?;
        debug!("Logged query {} to sqlite", entry.id);
        Ok(())
    }
}

pub struct D1QueryLog {
    client: Client,
    settings: D1Settings,
    api_base: String,
}

impl D1QueryLog {
    pub fn new(settings: D1Settings, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            settings,
            api_base: D1_API_BASE.to_string(),
        })
    }

    /// Point at a different API root (e.g. a local stand-in).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn query_url(&self) -> String {
        format!(
            "{}/accounts/{}/d1/database/{}/query",
            self.api_base.trim_end_matches('/'),
            self.settings.account_id,
            self.settings.database_id
        )
    }
}

#[async_trait]
impl QueryLogSink for D1QueryLog {
    fn name(&self) -> &str {
        "d1"
    }

    async fn record(&self, entry: &QueryLogEntry) -> Result<()> {
        let payload = json!({
            "sql": INSERT_SQL,
            "params": [
                entry.id.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.question,
                entry.sql,
                entry.provider,
                entry.elapsed_ms,
                entry.success,
                entry.error,
            ]
        });
        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(self.settings.api_token.expose())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConverSqlError::QueryLog(format!("D1 returned {}: {}", status, body.trim())));
        }
        debug!("Logged query {} to D1", entry.id);
        Ok(())
    }
}
