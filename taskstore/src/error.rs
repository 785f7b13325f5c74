use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record {id} not found in collection {collection}")]
    NotFound { collection: &'static str, id: String },

    #[error("poisoned lock on store connection")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
