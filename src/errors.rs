use thiserror::Error;

/// Errors that can occur while querying and assembling the word graph.
#[derive(Error, Debug)]
pub enum ShabakaError {
    #[error("malformed record: {message} (id: {id})")]
    MalformedRecord { message: String, id: String },

    #[error("invalid record id: {id}")]
    InvalidRecordId { id: String },

    #[error("invalid fetch plan: {spec}")]
    InvalidFetchPlan { spec: String },

    #[error("store error: {message} (operation: {operation})")]
    Store { message: String, operation: String },

    #[error("'{label}' is not an Arabic string")]
    NotArabic { label: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `ShabakaError`.
pub type Result<T> = std::result::Result<T, ShabakaError>;
