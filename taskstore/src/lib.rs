//! Generic persistent state management: typed records indexed by
//! arbitrary fields, backed by SQLite with a per-collection JSONL
//! append log, plus a scalar/TTL namespace for counters.

mod error;
mod filter;
mod kv;
mod record;
mod store;

pub use error::{Result, StoreError};
pub use filter::{Filter, FilterOp};
pub use record::{now_ms, IndexValue, Record};
pub use store::Store;
