use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Client record has no identifying id")]
    MissingClientId,

    #[error("Client '{id}' not found")]
    ClientNotFound { id: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RetentionResult<T> = Result<T, RetentionError>;

/// Fatal for a single import record only. Never aborts a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has neither a name nor an email")]
    MissingIdentity,

    #[error("client id '{id}' already appears earlier in the batch")]
    DuplicateId { id: String },
}
