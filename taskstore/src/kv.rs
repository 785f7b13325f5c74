//! Scalar/TTL namespace backing the metrics, token-accounting, and
//! tool-call-log keys that don't fit the typed `Record` shape.

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::record::now_ms;
use crate::store::Store;

impl Store {
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn_lock()?;
        let now = now_ms();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str, ttl_ms: Option<i64>) -> Result<()> {
        let conn = self.conn_lock()?;
        let expires_at = ttl_ms.map(|ttl| now_ms() + ttl);
        conn.execute(
            "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    /// Increment-only counter. Commutative under concurrent callers
    /// because SQLite serializes the statement; no external locking
    /// needed beyond the connection mutex already held.
    pub fn kv_incr(&self, key: &str, by: i64) -> Result<i64> {
        let conn = self.conn_lock()?;
        conn.execute(
            "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
             ON CONFLICT(key) DO UPDATE SET value = CAST(CAST(kv.value AS INTEGER) + ?2 AS TEXT)",
            params![key, by],
        )?;
        let value: String = conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(value.parse().unwrap_or(0))
    }

    pub fn kv_del(&self, key: &str) -> Result<()> {
        let conn = self.conn_lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn kv_expire(&self, key: &str, ttl_ms: i64) -> Result<()> {
        let conn = self.conn_lock()?;
        conn.execute(
            "UPDATE kv SET expires_at = ?2 WHERE key = ?1",
            params![key, now_ms() + ttl_ms],
        )?;
        Ok(())
    }

    pub fn kv_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn_lock()?;
        let now = now_ms();
        let mut stmt = conn.prepare(
            "SELECT key FROM kv WHERE key LIKE ?1 AND (expires_at IS NULL OR expires_at > ?2)",
        )?;
        let pattern = format!("{prefix}%");
        let rows = stmt.query_map(params![pattern, now], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn conn_lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.conn.lock().map_err(|_| crate::error::StoreError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_is_commutative_and_monotonic() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.kv_incr("metrics:total_executions", 1).unwrap(), 1);
        assert_eq!(store.kv_incr("metrics:total_executions", 1).unwrap(), 2);
        assert_eq!(store.kv_incr("metrics:total_executions", 3).unwrap(), 5);
    }

    #[test]
    fn expired_key_reads_as_absent() {
        let store = Store::open_in_memory().unwrap();
        store.kv_set("tool_call:abc", "{}", Some(-1)).unwrap();
        assert!(store.kv_get("tool_call:abc").unwrap().is_none());
    }

    #[test]
    fn keys_lists_by_prefix() {
        let store = Store::open_in_memory().unwrap();
        store.kv_set("token_usage:2026-07-28:prompt", "10", None).unwrap();
        store.kv_set("token_usage:2026-07-28:completion", "20", None).unwrap();
        store.kv_set("metrics:total_executions", "1", None).unwrap();
        let keys = store.kv_keys("token_usage:2026-07-28").unwrap();
        assert_eq!(keys.len(), 2);
    }
}
