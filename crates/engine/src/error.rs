//! Engine-level error types.
//!
//! Maps onto the error-kind taxonomy the HTTP layer translates into status
//! codes: `NotFound` (404), `Precondition` (400), `Unexpected` (500). Benign
//! races are not an `EngineError` variant — callers detect them via
//! `db::DbError::is_duplicate_key` and swallow them before they ever reach
//! this layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("graph template '{namespace}/{name}' not found")]
    TemplateNotFound { namespace: String, name: String },

    #[error("state '{0}' not found")]
    StateNotFound(String),

    #[error("run '{0}' not found")]
    RunNotFound(String),

    #[error("graph template is not valid: {0:?}")]
    TemplateInvalid(Vec<String>),

    #[error("missing required store keys: {0:?}")]
    MissingStoreKeys(Vec<String>),

    #[error("state precondition failed: {0}")]
    Precondition(String),

    #[error("unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),

    #[error("malformed dependent string: {0}")]
    MalformedDependentString(String),

    #[error("secret envelope error: {0}")]
    Secret(String),

    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("node contract error: {0}")]
    Node(#[from] nodes::NodeError),
}
