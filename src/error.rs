//! Error taxonomy for request handling.
//!
//! Every failure a request can hit maps to a stable machine-readable
//! discriminator and an HTTP status. Configuration load errors are not
//! represented here; they are fatal at startup.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// A single schema violation: which field and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dot-path of the offending field (e.g. `message.text`).
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Everything that can go wrong while serving one request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// No route template matches the request path.
    #[error("no route matches path {path}")]
    NoRouteMatch { path: String },

    /// A route matched but does not declare the request's verb.
    #[error("method {method} is not allowed for path {path}")]
    MethodNotAllowed { method: String, path: String },

    /// Declared content type does not match the request's.
    #[error("expected content type {expected}, got {actual}")]
    ContentTypeMismatch { expected: String, actual: String },

    /// The request body could not be parsed at all.
    #[error("malformed request body: {detail}")]
    MalformedBody { detail: String },

    /// Schema validation found one or more violations.
    #[error("request validation failed")]
    ValidationFailed { violations: Vec<Violation> },

    /// A template referenced a token that is neither synthetic nor present
    /// in the request. This is a configuration defect, not a client error.
    #[error("unresolved token {{{name}}} in template")]
    UnresolvedToken { name: String },

    /// A typed-value wrapper could not coerce its resolved value.
    #[error("template error: {detail}")]
    TemplateError { detail: String },
}

impl RequestError {
    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::NoRouteMatch { .. } => StatusCode::NOT_FOUND,
            RequestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::ContentTypeMismatch { .. }
            | RequestError::MalformedBody { .. }
            | RequestError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            RequestError::UnresolvedToken { .. } | RequestError::TemplateError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable discriminator for machine consumption.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::NoRouteMatch { .. } => "no_route_match",
            RequestError::MethodNotAllowed { .. } => "method_not_allowed",
            RequestError::ContentTypeMismatch { .. } => "content_type_mismatch",
            RequestError::MalformedBody { .. } => "malformed_body",
            RequestError::ValidationFailed { .. } => "validation_failed",
            RequestError::UnresolvedToken { .. } => "unresolved_token",
            RequestError::TemplateError { .. } => "template_error",
        }
    }

    /// JSON error body. Validation failures carry the full violation list.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let RequestError::ValidationFailed { violations } = self {
            body["violations"] = json!(violations);
        }
        body
    }
}
