use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value that can be indexed for equality/containment lookups.
///
/// `Str` backs exact-match indexes (task name, domain, status); `Tags`
/// backs the per-tag index, one row per tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexValue {
    Str(String),
    Tags(Vec<String>),
}

/// Anything persisted through a [`crate::Store`] implements this. Mirrors
/// the shape every domain entity in this codebase already carries: a
/// stable id, an update timestamp, a fixed collection name, and whatever
/// fields the collection wants indexed.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn updated_at(&self) -> i64;
    fn collection_name() -> &'static str
    where
        Self: Sized;
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}

/// Unix-millisecond timestamp, the only clock every Record's
/// created_at/updated_at fields use.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}
