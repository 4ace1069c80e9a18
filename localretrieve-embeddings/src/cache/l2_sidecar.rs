//! L2 persistent embedding cache.
//!
//! Backed by a sidecar SQLite file next to the durability snapshot, so
//! cached embeddings survive process restarts without bloating the main
//! image. Falls back to an in-process map when the store is volatile.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

use localretrieve_storage::adapter::{blob_to_vector, vector_to_blob};

/// L2 persistent embedding cache.
pub struct L2SidecarCache {
    conn: Option<Mutex<Connection>>,
    fallback: Mutex<HashMap<String, (Vec<u8>, i64)>>,
    ttl_ms: i64,
}

impl L2SidecarCache {
    /// In-memory-only cache (volatile databases, tests).
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            conn: None,
            fallback: Mutex::new(HashMap::new()),
            ttl_ms: ttl_ms as i64,
        }
    }

    /// Open (or create) the sidecar file. Open failures degrade to the
    /// in-memory fallback rather than surfacing an error.
    pub fn open(path: &Path, ttl_ms: u64) -> Self {
        match Connection::open(path) {
            Ok(conn) => {
                let created = conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS embedding_cache (
                        cache_key  TEXT PRIMARY KEY,
                        embedding  BLOB NOT NULL,
                        expires_at INTEGER NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_l2_expiry
                        ON embedding_cache(expires_at);
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;",
                );
                match created {
                    Ok(()) => {
                        debug!(path = %path.display(), "L2 sidecar cache opened");
                        Self {
                            conn: Some(Mutex::new(conn)),
                            fallback: Mutex::new(HashMap::new()),
                            ttl_ms: ttl_ms as i64,
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "L2 sidecar init failed, using in-memory fallback");
                        Self::new(ttl_ms)
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "L2 sidecar open failed, using in-memory fallback");
                Self::new(ttl_ms)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let now = Utc::now().timestamp_millis();
        if let Some(conn_mutex) = &self.conn {
            let conn = conn_mutex.lock().ok()?;
            let result: Result<Vec<u8>, _> = conn.query_row(
                "SELECT embedding FROM embedding_cache
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            );
            return result.ok().map(|bytes| blob_to_vector(&bytes));
        }
        let fallback = self.fallback.lock().ok()?;
        fallback.get(key).and_then(|(bytes, expires_at)| {
            (*expires_at > now).then(|| blob_to_vector(bytes))
        })
    }

    pub fn insert(&self, key: String, embedding: &[f32]) {
        let bytes = vector_to_blob(embedding);
        let expires_at = Utc::now().timestamp_millis() + self.ttl_ms;
        if let Some(conn_mutex) = &self.conn {
            if let Ok(conn) = conn_mutex.lock() {
                let _ = conn.execute(
                    "INSERT OR REPLACE INTO embedding_cache
                        (cache_key, embedding, expires_at)
                     VALUES (?1, ?2, ?3)",
                    params![key, bytes, expires_at],
                );
            }
            return;
        }
        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.insert(key, (bytes, expires_at));
        }
    }

    /// Remove every key with the given prefix (collection scope).
    pub fn invalidate_prefix(&self, prefix: &str) {
        if let Some(conn_mutex) = &self.conn {
            if let Ok(conn) = conn_mutex.lock() {
                let escaped = prefix
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                let _ = conn.execute(
                    "DELETE FROM embedding_cache WHERE cache_key LIKE ?1 ESCAPE '\\'",
                    params![format!("{escaped}%")],
                );
            }
            return;
        }
        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.retain(|key, _| !key.starts_with(prefix));
        }
    }

    pub fn clear(&self) {
        if let Some(conn_mutex) = &self.conn {
            if let Ok(conn) = conn_mutex.lock() {
                let _ = conn.execute("DELETE FROM embedding_cache", []);
            }
            return;
        }
        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_roundtrip() {
        let cache = L2SidecarCache::new(60_000);
        cache.insert("default:h1".to_string(), &[1.0, 2.5, -3.0]);
        assert_eq!(cache.get("default:h1"), Some(vec![1.0, 2.5, -3.0]));
        assert_eq!(cache.get("default:missing"), None);
    }

    #[test]
    fn expired_entries_are_invisible() {
        let cache = L2SidecarCache::new(0);
        cache.insert("default:h1".to_string(), &[1.0]);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(cache.get("default:h1"), None);
    }

    #[test]
    fn sidecar_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.embeddings.db");
        {
            let cache = L2SidecarCache::open(&path, 60_000);
            cache.insert("default:persist".to_string(), &[4.0, 5.0]);
        }
        {
            let cache = L2SidecarCache::open(&path, 60_000);
            assert_eq!(cache.get("default:persist"), Some(vec![4.0, 5.0]));
        }
    }

    #[test]
    fn prefix_invalidation() {
        let cache = L2SidecarCache::new(60_000);
        cache.insert("a:h1".to_string(), &[1.0]);
        cache.insert("b:h1".to_string(), &[2.0]);
        cache.invalidate_prefix("a:");
        assert_eq!(cache.get("a:h1"), None);
        assert_eq!(cache.get("b:h1"), Some(vec![2.0]));
    }
}
