//! Maps the typed errors from every lower layer onto HTTP status codes
//! (§7). Route handlers convert their `Result` into this type with `?` and
//! let `IntoResponse` do the rest.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<db::DbError> for ApiError {
    fn from(err: db::DbError) -> Self {
        match err {
            db::DbError::NotFound => Self::new(StatusCode::NOT_FOUND, "not found"),
            db::DbError::PreconditionFailed(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            other => {
                tracing::error!(error = %other, "database error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl From<engine::EngineError> for ApiError {
    fn from(err: engine::EngineError) -> Self {
        use engine::EngineError::*;
        match err {
            TemplateNotFound { .. } | StateNotFound(_) | RunNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            TemplateInvalid(_) | MissingStoreKeys(_) | Precondition(_) | UnresolvedPlaceholder(_)
            | MalformedDependentString(_) | Secret(_) => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            Node(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            Database(db_err) => db_err.into(),
        }
    }
}

impl From<nodes::NodeError> for ApiError {
    fn from(err: nodes::NodeError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<queue::QueueError> for ApiError {
    fn from(err: queue::QueueError) -> Self {
        use queue::QueueError::*;
        match err {
            InvalidStateId(_) | Precondition(_) | AlreadyExecuted => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            Database(db_err) => db_err.into(),
            Engine(engine_err) => engine_err.into(),
            Internal(msg) => {
                tracing::error!(error = %msg, "scheduler task failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, message)
}
