//! HTTP surface.
//!
//! A fixed `/health` liveness route plus a fallback that feeds every other
//! request through the engine. `/health` is registered as an explicit axum
//! route, so a user route with the same path can never intercept it.

use crate::router::{MockRequest, Reply, RequestRouter};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::sync::Arc;

/// Upper bound on buffered request bodies. Mock payloads are small.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the axum application around the engine.
pub fn build_app(engine: Arc<RequestRouter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(handle_any)
        .with_state(engine)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn handle_any(
    State(engine): State<Arc<RequestRouter>>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "malformed_body",
                    "message": format!("failed to read request body: {error}"),
                })),
            )
                .into_response();
        }
    };

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let mock_request = MockRequest {
        method: parts.method.as_str(),
        path: parts.uri.path(),
        query: parts.uri.query(),
        content_type,
        body: if bytes.is_empty() { None } else { Some(&bytes) },
    };

    into_response(engine.handle(&mock_request))
}

fn into_response(reply: Reply) -> Response {
    match reply {
        Reply::Json { status, body } => (status, Json(body)).into_response(),
        Reply::Redirect { location } => {
            (StatusCode::FOUND, [(LOCATION, location)]).into_response()
        }
        Reply::NoContent => StatusCode::NO_CONTENT.into_response(),
    }
}
