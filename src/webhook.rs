//! Fire-and-forget webhook dispatch.
//!
//! After a request validates, a method's webhook spec selects a payload
//! branch by a discriminator field in the request, renders the branch's URL
//! and body with the same token context as the response, and posts the
//! result on a background task. Delivery outcome never reaches the client
//! and is never retried.

use crate::config::WebhookSpec;
use crate::error::RequestError;
use crate::token::TokenContext;
use serde_json::Value;
use tracing::{debug, warn};

/// Dispatcher holding the shared outbound HTTP client.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Select a branch and fire it. Returns whether a webhook was emitted.
    ///
    /// A missing discriminator field or an unmapped discriminator value is a
    /// no-op. Rendering happens synchronously; a render failure is a
    /// configuration defect and is surfaced to the caller. Delivery itself
    /// runs on a spawned task, so this must be called within a Tokio
    /// runtime.
    pub fn dispatch(
        &self,
        spec: &WebhookSpec,
        payload: &Value,
        ctx: &TokenContext,
    ) -> Result<bool, RequestError> {
        if !spec.enabled {
            return Ok(false);
        }

        let discriminator = match payload.get(&spec.field).and_then(Value::as_str) {
            Some(value) => value,
            None => {
                debug!(field = %spec.field, "Webhook discriminator absent, not firing");
                return Ok(false);
            }
        };

        let branch = match spec.data_mapping.get(discriminator) {
            Some(branch) => branch,
            None => {
                warn!(
                    field = %spec.field,
                    value = %discriminator,
                    "No webhook branch for discriminator value"
                );
                return Ok(false);
            }
        };

        let url = branch.url.render_string(ctx)?;
        let body = branch.data.render(ctx)?;

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) => {
                    debug!(url = %url, status = %response.status(), "Webhook delivered")
                }
                Err(error) => warn!(url = %url, error = %error, "Webhook delivery failed"),
            }
        });

        Ok(true)
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteSet;
    use serde_json::json;
    use std::collections::HashMap;

    fn trigger_spec() -> WebhookSpec {
        let yaml = r#"
routes:
  - path: /api/webhooks/trigger
    methods:
      - method: GET
        response:
          status: success
        webhook:
          enabled: true
          data_mapping:
            user_created:
              url: "{webhook_url}"
              data:
                event: user.created
                timestamp: "{$current_timestamp}"
                user:
                  id: "{$random_code}"
                  name: Test User
            message_sent:
              url: "{webhook_url}"
              data:
                event: message.sent
"#;
        let set = RouteSet::from_yaml(yaml).unwrap();
        set.routes[0].methods[0].webhook.clone().unwrap()
    }

    #[tokio::test]
    async fn test_disabled_spec_is_a_noop() {
        let mut spec = trigger_spec();
        spec.enabled = false;
        let payload = json!({"type": "user_created", "webhook_url": "http://127.0.0.1:1/x"});
        let ctx = TokenContext::new(&payload, &HashMap::new());

        let fired = WebhookDispatcher::new().dispatch(&spec, &payload, &ctx).unwrap();
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_missing_discriminator_is_a_noop() {
        let spec = trigger_spec();
        let payload = json!({"webhook_url": "http://127.0.0.1:1/x"});
        let ctx = TokenContext::new(&payload, &HashMap::new());

        let fired = WebhookDispatcher::new().dispatch(&spec, &payload, &ctx).unwrap();
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_unmapped_discriminator_is_a_noop() {
        let spec = trigger_spec();
        let payload = json!({"type": "order_placed", "webhook_url": "http://127.0.0.1:1/x"});
        let ctx = TokenContext::new(&payload, &HashMap::new());

        let fired = WebhookDispatcher::new().dispatch(&spec, &payload, &ctx).unwrap();
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_unresolved_url_token_is_an_error() {
        let spec = trigger_spec();
        // No webhook_url in the payload, so the URL template cannot render.
        let payload = json!({"type": "user_created"});
        let ctx = TokenContext::new(&payload, &HashMap::new());

        let err = WebhookDispatcher::new()
            .dispatch(&spec, &payload, &ctx)
            .unwrap_err();
        match err {
            RequestError::UnresolvedToken { name } => assert_eq!(name, "webhook_url"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delivery_posts_rendered_branch_exactly_once() {
        use axum::{extract::State, routing::post, Json, Router};
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let app = Router::new().route(
            "/hook",
            post(|State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                let _ = tx.send(body);
                "ok"
            }),
        )
        .with_state(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let spec = trigger_spec();
        let payload = json!({
            "type": "user_created",
            "webhook_url": format!("http://{addr}/hook")
        });
        let ctx = TokenContext::new(&payload, &HashMap::new());

        let fired = WebhookDispatcher::new().dispatch(&spec, &payload, &ctx).unwrap();
        assert!(fired);

        let body = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("webhook not delivered")
            .unwrap();
        assert_eq!(body["event"], "user.created");
        assert!(body["timestamp"].is_i64());
        assert_eq!(body["user"]["name"], "Test User");

        // Exactly one call: nothing else arrives.
        let extra = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err());
    }
}
