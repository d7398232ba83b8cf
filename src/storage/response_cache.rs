use anyhow::Result;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prompt/response store shared by every completion in a process.
#[derive(Clone)]
pub struct ResponseCache {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: i64,
    pub hits: i64,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS llm_responses (
        cache_key TEXT PRIMARY KEY,
        backend TEXT NOT NULL,
        params TEXT NOT NULL,
        response TEXT NOT NULL,
        hit_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        last_used TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_responses_last_used ON llm_responses(last_used DESC);
";

/// Hex SHA-256 over the backend label (provider and model), the sampling
/// parameters and the exact prompt text.
pub fn cache_key(backend: &str, params: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(backend.as_bytes());
    hasher.update([0u8]);
    hasher.update(params.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

impl ResponseCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.conn.lock().await;
        let result = db.query_row(
            "SELECT response FROM llm_responses WHERE cache_key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(response) => {
                db.execute(
                    "UPDATE llm_responses SET hit_count = hit_count + 1, last_used = datetime('now') WHERE cache_key = ?1",
                    [key],
                )?;
                Ok(Some(response))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn put(&self, key: &str, backend: &str, params: &str, response: &str) -> Result<()> {
        let db = self.conn.lock().await;
        db.execute(
            "INSERT INTO llm_responses (cache_key, backend, params, response) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cache_key) DO UPDATE SET response = ?4, last_used = datetime('now')",
            rusqlite::params![key, backend, params, response],
        )?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let db = self.conn.lock().await;
        let (entries, hits) = db.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM llm_responses",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CacheStats { entries, hits })
    }

    pub async fn clear(&self) -> Result<u64> {
        let db = self.conn.lock().await;
        let removed = db.execute("DELETE FROM llm_responses", [])?;
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keys_depend_on_every_component() {
        let base = cache_key("gemini/gemini-1.5-flash", "t=0.1", "prompt");
        assert_eq!(base.len(), 64);
        assert_eq!(base, cache_key("gemini/gemini-1.5-flash", "t=0.1", "prompt"));
        assert_ne!(base, cache_key("openai/gpt-4o", "t=0.1", "prompt"));
        assert_ne!(base, cache_key("gemini/gemini-1.5-flash", "t=0.7", "prompt"));
        assert_ne!(base, cache_key("gemini/gemini-1.5-flash", "t=0.1", "prompt "));
    }

    #[tokio::test]
    async fn stores_and_counts_hits() {
        let cache = ResponseCache::in_memory().unwrap();
        let key = cache_key("gemini", "m", "p");

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.put(&key, "gemini", "m", "{\"a\":1}").await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("{\"a\":1}"));
        cache.get(&key).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats, CacheStats { entries: 1, hits: 2 });
        assert_eq!(cache.clear().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("responses.db");
        {
            let cache = ResponseCache::open(&path).unwrap();
            cache.put("k", "gemini", "m", "answer").await.unwrap();
        }
        let reopened = ResponseCache::open(&path).unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("answer"));
    }
}
