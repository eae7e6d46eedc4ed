use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("precondition failed for document {id}: etag {etag} is stale")]
    Conflict { id: String, etag: String },

    #[error("Document not found: {0}")]
    NoSuchDocument(String),

    #[error("Document already exists: {0}")]
    DocumentAlreadyExists(String),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Database not found: {0}")]
    NoSuchDatabase(String),

    /// Network failures and throttling.
    #[error("transient store error: {0}")]
    Transient(String),

    #[error("store call timed out after {ms} ms")]
    Timeout { ms: u64 },

    #[error("gave up updating document {id} after {attempts} conflicting attempts")]
    ExhaustedRetries { id: String, attempts: u32 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// True for a failed `If-Match` precondition.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Network-ish failures a caller may choose to retry on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
