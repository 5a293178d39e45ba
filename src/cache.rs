//! In-memory cache of generated SQL, keyed by question, schema context and provider.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedSql {
    sql: String,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<String, CachedSql>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Hex SHA-256 of `question|schema_context|provider`.
    pub fn cache_key(question: &str, schema_context: &str, provider: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(question.as_bytes());
        hasher.update(b"|");
        hasher.update(schema_context.as_bytes());
        hasher.update(b"|");
        hasher.update(provider.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Cached SQL if present and not older than the TTL. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<String> {
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.sql.clone(), entry.stored_at.elapsed() < self.ttl));
        match hit {
            Some((sql, true)) => Some(sql),
            Some((_, false)) => {
                debug!("Cache entry {} expired", key.get(..12).unwrap_or(key));
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `sql` under `key`, dropping every entry that has outlived the TTL.
    pub fn insert(&self, key: String, sql: String) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
        self.entries.insert(
            key,
            CachedSql {
                sql,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
