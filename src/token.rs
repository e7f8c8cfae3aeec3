//! Per-request token resolution.
//!
//! Templates reference two namespaces: request-derived tokens (`{field}`,
//! copied from the validated payload and captured path parameters) and
//! synthetic tokens (`{$name}`, generated fresh for every request). All
//! values are fixed when the context is built, so resolving the same token
//! twice within one request yields the same value.

use crate::error::RequestError;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Token-value table for one request. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct TokenContext {
    values: HashMap<String, Value>,
}

impl TokenContext {
    /// Build the context from the validated payload and path-parameter
    /// bindings. Path parameters shadow same-named payload fields.
    pub fn new(payload: &Value, path_params: &HashMap<String, String>) -> Self {
        let mut values = HashMap::new();

        if let Value::Object(fields) = payload {
            for (name, value) in fields {
                values.insert(name.clone(), value.clone());
            }
        }

        for (name, value) in path_params {
            values.insert(name.clone(), Value::String(value.clone()));
        }

        let timestamp = Utc::now().timestamp();
        values.insert("$current_timestamp".to_string(), Value::from(timestamp));
        values.insert("$random_code".to_string(), Value::from(random_code()));
        values.insert("$hash".to_string(), Value::String(hex_hash()));
        values.insert(
            "$access_token".to_string(),
            Value::String(access_token(timestamp)),
        );
        values.insert(
            "$refresh_token".to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );

        Self { values }
    }

    /// Resolve a token by name (including the `$` prefix for synthetic
    /// tokens). An unknown name is an error so configuration typos surface
    /// instead of producing malformed mock data.
    pub fn resolve(&self, name: &str) -> Result<&Value, RequestError> {
        self.values.get(name).ok_or_else(|| RequestError::UnresolvedToken {
            name: name.to_string(),
        })
    }
}

/// Six-digit numeric code, mock-grade uniqueness only.
fn random_code() -> u32 {
    rand::thread_rng().gen_range(100_000..1_000_000)
}

/// Opaque 32-char lowercase hex identifier.
fn hex_hash() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}

/// Bearer-shaped mock access token: uuid plus issue time.
fn access_token(timestamp: i64) -> String {
    format!("{}-{}", Uuid::new_v4(), timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_fields_and_path_params() {
        let payload = json!({"grant_type": "authorization_code", "code": "abc"});
        let mut params = HashMap::new();
        params.insert("user_id".to_string(), "42".to_string());

        let ctx = TokenContext::new(&payload, &params);
        assert_eq!(ctx.resolve("grant_type").unwrap(), "authorization_code");
        assert_eq!(ctx.resolve("code").unwrap(), "abc");
        assert_eq!(ctx.resolve("user_id").unwrap(), "42");
    }

    #[test]
    fn test_path_params_shadow_payload_fields() {
        let payload = json!({"user_id": "from-body"});
        let mut params = HashMap::new();
        params.insert("user_id".to_string(), "from-path".to_string());

        let ctx = TokenContext::new(&payload, &params);
        assert_eq!(ctx.resolve("user_id").unwrap(), "from-path");
    }

    #[test]
    fn test_unknown_token_is_an_error() {
        let ctx = TokenContext::new(&json!({}), &HashMap::new());
        let err = ctx.resolve("no_such_field").unwrap_err();
        match err {
            RequestError::UnresolvedToken { name } => assert_eq!(name, "no_such_field"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_tokens_present() {
        let ctx = TokenContext::new(&json!({}), &HashMap::new());

        assert!(ctx.resolve("$current_timestamp").unwrap().is_i64());
        let code = ctx.resolve("$random_code").unwrap().as_u64().unwrap();
        assert!((100_000..1_000_000).contains(&code));

        let hash = ctx.resolve("$hash").unwrap().as_str().unwrap();
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(!ctx.resolve("$access_token").unwrap().as_str().unwrap().is_empty());
        assert!(!ctx.resolve("$refresh_token").unwrap().as_str().unwrap().is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent_within_a_request() {
        let ctx = TokenContext::new(&json!({}), &HashMap::new());
        let first = ctx.resolve("$current_timestamp").unwrap().clone();
        let second = ctx.resolve("$current_timestamp").unwrap().clone();
        assert_eq!(first, second);

        let first = ctx.resolve("$hash").unwrap().clone();
        let second = ctx.resolve("$hash").unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_contexts_differ_across_requests() {
        let a = TokenContext::new(&json!({}), &HashMap::new());
        let b = TokenContext::new(&json!({}), &HashMap::new());
        // 128-bit draws colliding would indicate a broken generator.
        assert_ne!(a.resolve("$hash").unwrap(), b.resolve("$hash").unwrap());
    }
}
