//! Typed error type for the db crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("bson serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("bson deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("document not found")]
    NotFound,

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl DbError {
    /// True if this error is a MongoDB duplicate-key error (E11000), the
    /// signal used throughout the state manager to detect benign races on
    /// a unique index (retry siblings, fan-in fingerprints).
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            DbError::Mongo(err) => err.to_string().contains("E11000"),
            _ => false,
        }
    }
}
