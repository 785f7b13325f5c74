use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::filter::{Filter, FilterOp};
use crate::record::{IndexValue, Record};

/// Generic record store: a SQLite table for queryable state plus a
/// per-collection JSONL append log, so the on-disk directory stays
/// diffable and git-friendly while lookups stay indexed.
///
/// One `Store` is shared (via `Arc`) across every collection in a
/// process; the collection name distinguishes rows, so every domain
/// type can share one underlying database file.
pub struct Store {
    pub(crate) conn: Mutex<Connection>,
    log_dir: PathBuf,
}

impl Store {
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir)?;
        let conn = Connection::open(base_dir.join("store.sqlite3"))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
             );
             CREATE TABLE IF NOT EXISTS record_index (
                collection TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                id TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_record_index_lookup
                ON record_index (collection, field, value);
             CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            log_dir: base_dir.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE records (collection TEXT, id TEXT, data TEXT, updated_at INTEGER, PRIMARY KEY(collection, id));
             CREATE TABLE record_index (collection TEXT, field TEXT, value TEXT, id TEXT);
             CREATE INDEX idx_record_index_lookup ON record_index (collection, field, value);
             CREATE TABLE kv (key TEXT PRIMARY KEY, value TEXT NOT NULL, expires_at INTEGER);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            log_dir: PathBuf::new(),
        })
    }

    fn append_log(&self, collection: &str, line: &Value) -> Result<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Ok(());
        }
        let path = self.log_dir.join(format!("{collection}.jsonl"));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(line)?)?;
        Ok(())
    }

    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let collection = R::collection_name();
        let data = serde_json::to_string(record)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![collection, record.id(), data, record.updated_at()],
        )?;
        conn.execute(
            "DELETE FROM record_index WHERE collection = ?1 AND id = ?2",
            params![collection, record.id()],
        )?;
        for (field, value) in record.indexed_fields() {
            match value {
                IndexValue::Str(v) => {
                    conn.execute(
                        "INSERT INTO record_index (collection, field, value, id) VALUES (?1, ?2, ?3, ?4)",
                        params![collection, field, v, record.id()],
                    )?;
                }
                IndexValue::Tags(tags) => {
                    for tag in tags {
                        conn.execute(
                            "INSERT INTO record_index (collection, field, value, id) VALUES (?1, ?2, ?3, ?4)",
                            params![collection, field, tag, record.id()],
                        )?;
                    }
                }
            }
        }
        drop(conn);
        self.append_log(collection, &serde_json::json!({"op": "put", "record": record}))?;
        Ok(())
    }

    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let collection = R::collection_name();
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt =
            conn.prepare("SELECT data FROM records WHERE collection = ?1 AND id = ?2")?;
        let mut rows = stmt.query(params![collection, id])?;
        if let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&data)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete<R: Record>(&self, id: &str) -> Result<()> {
        let collection = R::collection_name();
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        conn.execute(
            "DELETE FROM record_index WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        drop(conn);
        self.append_log(collection, &serde_json::json!({"op": "delete", "id": id}))?;
        Ok(())
    }

    pub fn list<R: Record>(&self, filters: &[Filter]) -> Result<Vec<R>> {
        let collection = R::collection_name();
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let ids: Option<Vec<String>> = if filters.is_empty() {
            None
        } else {
            let mut candidate: Option<std::collections::HashSet<String>> = None;
            for filter in filters {
                let matched = Self::ids_for_filter(&conn, collection, filter)?;
                candidate = Some(match candidate {
                    None => matched,
                    Some(existing) => existing.intersection(&matched).cloned().collect(),
                });
            }
            Some(candidate.unwrap_or_default().into_iter().collect())
        };

        let mut out = Vec::new();
        match ids {
            Some(ids) => {
                let mut stmt = conn
                    .prepare("SELECT data FROM records WHERE collection = ?1 AND id = ?2")?;
                for id in ids {
                    let mut rows = stmt.query(params![collection, id])?;
                    if let Some(row) = rows.next()? {
                        let data: String = row.get(0)?;
                        out.push(serde_json::from_str(&data)?);
                    }
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT data FROM records WHERE collection = ?1 ORDER BY updated_at DESC",
                )?;
                let mut rows = stmt.query(params![collection])?;
                while let Some(row) = rows.next()? {
                    let data: String = row.get(0)?;
                    out.push(serde_json::from_str(&data)?);
                }
            }
        }
        Ok(out)
    }

    fn ids_for_filter(
        conn: &Connection,
        collection: &str,
        filter: &Filter,
    ) -> Result<std::collections::HashSet<String>> {
        let mut out = std::collections::HashSet::new();
        match &filter.op {
            FilterOp::Eq(value) | FilterOp::HasTag(value) => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM record_index WHERE collection = ?1 AND field = ?2 AND value = ?3",
                )?;
                let mut rows = stmt.query(params![collection, filter.field, value])?;
                while let Some(row) = rows.next()? {
                    out.insert(row.get(0)?);
                }
            }
            FilterOp::In(values) => {
                for value in values {
                    let mut stmt = conn.prepare(
                        "SELECT id FROM record_index WHERE collection = ?1 AND field = ?2 AND value = ?3",
                    )?;
                    let mut rows = stmt.query(params![collection, filter.field, value])?;
                    while let Some(row) = rows.next()? {
                        out.insert(row.get(0)?);
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn count<R: Record>(&self) -> Result<usize> {
        let collection = R::collection_name();
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Rebuilds the index table for a collection from its current rows.
    /// Used at startup, since multi-key writes aren't transactional and
    /// stale index rows are reconciled lazily rather than prevented.
    pub fn rebuild_indexes<R: Record>(&self) -> Result<usize> {
        let collection = R::collection_name();
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "DELETE FROM record_index WHERE collection = ?1",
            params![collection],
        )?;
        let mut stmt = conn.prepare("SELECT data FROM records WHERE collection = ?1")?;
        let mut rows = stmt.query(params![collection])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            let record: R = serde_json::from_str(&data)?;
            for (field, value) in record.indexed_fields() {
                match value {
                    IndexValue::Str(v) => {
                        conn.execute(
                            "INSERT INTO record_index (collection, field, value, id) VALUES (?1, ?2, ?3, ?4)",
                            params![collection, field, v, record.id()],
                        )?;
                    }
                    IndexValue::Tags(tags) => {
                        for tag in tags {
                            conn.execute(
                                "INSERT INTO record_index (collection, field, value, id) VALUES (?1, ?2, ?3, ?4)",
                                params![collection, field, tag, record.id()],
                            )?;
                        }
                    }
                }
            }
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        id: String,
        status: String,
        tags: Vec<String>,
        updated_at: i64,
    }

    impl Record for Widget {
        fn id(&self) -> &str {
            &self.id
        }
        fn updated_at(&self) -> i64 {
            self.updated_at
        }
        fn collection_name() -> &'static str {
            "widgets"
        }
        fn indexed_fields(&self) -> HashMap<String, IndexValue> {
            let mut m = HashMap::new();
            m.insert("status".to_string(), IndexValue::Str(self.status.clone()));
            m.insert("tags".to_string(), IndexValue::Tags(self.tags.clone()));
            m
        }
    }

    fn widget(id: &str, status: &str, tags: &[&str]) -> Widget {
        Widget {
            id: id.to_string(),
            status: status.to_string(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            updated_at: crate::record::now_ms(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let w = widget("w1", "pending", &["fast"]);
        store.put(&w).unwrap();
        let fetched: Widget = store.get("w1").unwrap().unwrap();
        assert_eq!(fetched, w);
    }

    #[test]
    fn put_is_idempotent_on_id() {
        let store = Store::open_in_memory().unwrap();
        store.put(&widget("w1", "pending", &[])).unwrap();
        store.put(&widget("w1", "running", &[])).unwrap();
        assert_eq!(store.count::<Widget>().unwrap(), 1);
        let fetched: Widget = store.get("w1").unwrap().unwrap();
        assert_eq!(fetched.status, "running");
    }

    #[test]
    fn list_filters_by_indexed_field() {
        let store = Store::open_in_memory().unwrap();
        store.put(&widget("w1", "pending", &["a"])).unwrap();
        store.put(&widget("w2", "running", &["a"])).unwrap();
        store.put(&widget("w3", "running", &["b"])).unwrap();

        let running: Vec<Widget> = store
            .list(&[Filter::eq("status", "running")])
            .unwrap();
        assert_eq!(running.len(), 2);

        let tagged_a: Vec<Widget> = store.list(&[Filter::has_tag("tags", "a")]).unwrap();
        assert_eq!(tagged_a.len(), 2);

        let both: Vec<Widget> = store
            .list(&[Filter::eq("status", "running"), Filter::has_tag("tags", "a")])
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, "w2");
    }

    #[test]
    fn delete_removes_record_and_index() {
        let store = Store::open_in_memory().unwrap();
        store.put(&widget("w1", "pending", &["a"])).unwrap();
        store.delete::<Widget>("w1").unwrap();
        assert!(store.get::<Widget>("w1").unwrap().is_none());
        assert!(store.list::<Widget>(&[Filter::eq("status", "pending")]).unwrap().is_empty());
    }

    #[test]
    fn rebuild_indexes_reconciles_stale_index() {
        let store = Store::open_in_memory().unwrap();
        store.put(&widget("w1", "pending", &["a"])).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute("DELETE FROM record_index", []).unwrap();
        }
        assert!(store.list::<Widget>(&[Filter::eq("status", "pending")]).unwrap().is_empty());
        let rebuilt = store.rebuild_indexes::<Widget>().unwrap();
        assert_eq!(rebuilt, 1);
        assert_eq!(store.list::<Widget>(&[Filter::eq("status", "pending")]).unwrap().len(), 1);
    }
}
