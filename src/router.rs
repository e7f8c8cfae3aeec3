//! Per-request orchestration.
//!
//! Ties matching, validation, token resolution, response synthesis, and
//! webhook dispatch together. Each request flows one direction through the
//! pipeline and leaves no state behind; the route table is read-only, so
//! concurrent requests need no coordination.

use crate::config::{MethodDefinition, RedirectSpec, RouteSet};
use crate::error::RequestError;
use crate::matcher::RouteMatcher;
use crate::schema::SchemaValidator;
use crate::token::TokenContext;
use crate::webhook::WebhookDispatcher;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Standard browser noise, answered with an empty 204 before routing.
const BROWSER_PATHS: [&str; 4] = ["/favicon.ico", "/robots.txt", "/sitemap.xml", "/humans.txt"];

/// Transport-agnostic view of an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct MockRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub body: Option<&'a [u8]>,
}

/// Terminal outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json { status: StatusCode, body: Value },
    Redirect { location: String },
    NoContent,
}

/// The route resolution and response synthesis engine.
pub struct RequestRouter {
    routes: RouteSet,
    matcher: RouteMatcher,
    /// Compiled validators parallel to routes[i].methods[j].
    validators: Vec<Vec<Option<SchemaValidator>>>,
    dispatcher: WebhookDispatcher,
}

impl RequestRouter {
    pub fn new(routes: RouteSet) -> Self {
        let matcher = RouteMatcher::new(&routes.routes);
        let validators = routes
            .routes
            .iter()
            .map(|route| {
                route
                    .methods
                    .iter()
                    .map(|method| method.request_schema.as_ref().map(SchemaValidator::new))
                    .collect()
            })
            .collect();

        info!(routes = routes.routes.len(), "Request router initialized");

        Self {
            routes,
            matcher,
            validators,
            dispatcher: WebhookDispatcher::new(),
        }
    }

    /// Handle one request end to end. Errors are folded into their JSON
    /// reply form here; this never fails outward. Must be called within a
    /// Tokio runtime (webhook delivery spawns a task).
    pub fn handle(&self, request: &MockRequest<'_>) -> Reply {
        match self.process(request) {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    error = %error,
                    "Request failed"
                );
                Reply::Json {
                    status: error.status(),
                    body: error.to_body(),
                }
            }
        }
    }

    fn process(&self, request: &MockRequest<'_>) -> Result<Reply, RequestError> {
        if BROWSER_PATHS.contains(&request.path) {
            debug!(path = %request.path, "Skipping standard browser request");
            return Ok(Reply::NoContent);
        }

        info!(method = %request.method, path = %request.path, "Received request");

        let matched = self
            .matcher
            .find(&self.routes.routes, request.path)
            .ok_or_else(|| RequestError::NoRouteMatch {
                path: request.path.to_string(),
            })?;
        let route = matched.route;
        let path_params = matched.path_params;

        // First declared definition for the verb wins.
        let method_pos = route
            .methods
            .iter()
            .position(|m| m.method.eq_ignore_ascii_case(request.method))
            .ok_or_else(|| RequestError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path.to_string(),
            })?;
        let method = &route.methods[method_pos];

        self.check_content_type(request, method)?;

        let payload = parse_payload(request)?;

        if let Some(Some(validator)) = self
            .validators
            .get(matched.index)
            .and_then(|methods| methods.get(method_pos))
        {
            let violations = validator.validate(&payload);
            if !violations.is_empty() {
                return Err(RequestError::ValidationFailed { violations });
            }
        }

        let ctx = TokenContext::new(&payload, &path_params);

        if let Some(redirect) = &method.redirect {
            if redirect.enabled {
                let location = build_redirect_location(redirect, &ctx)?;
                info!(location = %location, "Redirecting");
                return Ok(Reply::Redirect { location });
            }
        }

        // Render before dispatching: a request that dies on a template
        // defect must produce no outbound side effect.
        let body = match &method.response {
            Some(template) => template.render(&ctx)?,
            None => json!({}),
        };

        if let Some(webhook) = &method.webhook {
            self.dispatcher.dispatch(webhook, &payload, &ctx)?;
        }
        let status = method
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);

        info!(method = %request.method, path = %request.path, status = %status, "Responding");
        Ok(Reply::Json { status, body })
    }

    /// Content-type constraint, checked before schema validation. Only
    /// body-carrying methods are constrained.
    fn check_content_type(
        &self,
        request: &MockRequest<'_>,
        method: &MethodDefinition,
    ) -> Result<(), RequestError> {
        let Some(expected) = &method.content_type else {
            return Ok(());
        };
        if !has_body(request.method) {
            return Ok(());
        }
        let actual = request.content_type.unwrap_or("");
        // Ignore parameters such as charset.
        if actual
            .to_ascii_lowercase()
            .starts_with(&expected.to_ascii_lowercase())
        {
            Ok(())
        } else {
            Err(RequestError::ContentTypeMismatch {
                expected: expected.clone(),
                actual: actual.to_string(),
            })
        }
    }
}

fn has_body(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH" | "DELETE"
    )
}

/// Parse the request into one payload object. GET uses query parameters;
/// body-carrying methods use JSON or form-encoded bodies depending on the
/// request's content type. Both shapes flow through the same validator.
fn parse_payload(request: &MockRequest<'_>) -> Result<Value, RequestError> {
    if !has_body(request.method) {
        return Ok(query_to_object(request.query.unwrap_or("")));
    }

    let body = request.body.unwrap_or(&[]);
    if body.is_empty() {
        return Ok(query_to_object(request.query.unwrap_or("")));
    }

    let content_type = request.content_type.unwrap_or("").to_ascii_lowercase();
    if content_type.contains("application/x-www-form-urlencoded") {
        let text = std::str::from_utf8(body).map_err(|_| RequestError::MalformedBody {
            detail: "body is not valid UTF-8".to_string(),
        })?;
        return Ok(query_to_object(text));
    }

    serde_json::from_slice(body).map_err(|e| RequestError::MalformedBody {
        detail: e.to_string(),
    })
}

/// Parse a query string or form body into a JSON object of strings.
fn query_to_object(query: &str) -> Value {
    let mut object = Map::new();
    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key, value),
            None => (part, ""),
        };
        object.insert(
            urlencoding_decode(key),
            Value::String(urlencoding_decode(value)),
        );
    }
    Value::Object(object)
}

/// Form-style URL decoding. Percent escapes are decoded at the byte level
/// and the result is interpreted as UTF-8, so multi-byte encodings such as
/// `%D0%9F` survive intact.
fn urlencoding_decode(s: &str) -> String {
    let raw = s.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'%' => {
                let escape = raw
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match escape {
                    Some(byte) => {
                        bytes.push(byte);
                        i += 3;
                    }
                    None => {
                        // Malformed escape, kept literally.
                        bytes.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                bytes.push(b' ');
                i += 1;
            }
            other => {
                bytes.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Form-style URL encoding, the inverse of the decoder above.
fn urlencoding_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char)
            }
            b' ' => result.push('+'),
            other => result.push_str(&format!("%{other:02X}")),
        }
    }
    result
}

/// Resolve the redirect URL and append its declared query parameters.
fn build_redirect_location(
    redirect: &RedirectSpec,
    ctx: &TokenContext,
) -> Result<String, RequestError> {
    let base = redirect.url.render_string(ctx)?;
    if redirect.parameters.is_empty() {
        return Ok(base);
    }

    let mut query = String::new();
    for parameter in &redirect.parameters {
        if !query.is_empty() {
            query.push('&');
        }
        let value = parameter.value.render_string(ctx)?;
        query.push_str(&urlencoding_encode(&parameter.name));
        query.push('=');
        query.push_str(&urlencoding_encode(&value));
    }

    Ok(format!("{base}?{query}"))
}
