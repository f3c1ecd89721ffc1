//! Errors raised while registering or validating node contracts.

use thiserror::Error;

/// Errors produced when registering a node or checking it against a
/// [`crate::RegisteredNode`]'s schemas.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// A schema document was not a JSON object, or had no `properties` map.
    #[error("invalid schema for node '{0}': expected an object schema with a 'properties' map")]
    InvalidSchema(String),

    /// The registration payload referenced an empty name or namespace.
    #[error("node name and namespace must be non-empty")]
    EmptyIdentity,
}
