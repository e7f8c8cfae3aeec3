//! Declarative route configuration.
//!
//! Routes, request schemas, response templates, webhook and redirect
//! behavior are all data, loaded from YAML documents at startup and
//! read-only afterwards.

use crate::template::{ResponseTemplate, TextTemplate};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The composed, ordered route table. Duplicate paths are retained in load
/// order; matching is first-wins, so declaration order is the contract.
#[derive(Debug, Clone, Default)]
pub struct RouteSet {
    pub routes: Vec<RouteDefinition>,
}

/// One configuration document: a `routes` list.
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigDocument {
    #[serde(default)]
    routes: Vec<RouteDefinition>,
}

/// A path template plus its ordered method definitions.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDefinition {
    pub path: String,
    pub methods: Vec<MethodDefinition>,
}

/// Behavior of one HTTP verb on a route.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodDefinition {
    /// HTTP verb
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional content-type constraint, checked before validation
    #[serde(default)]
    pub content_type: Option<String>,

    /// Success status override (default 200)
    #[serde(default)]
    pub status: Option<u16>,

    /// Optional request schema
    #[serde(default)]
    pub request_schema: Option<RequestSchema>,

    /// Response template
    #[serde(default)]
    pub response: Option<ResponseTemplate>,

    /// Redirect alternative to a response template
    #[serde(default)]
    pub redirect: Option<RedirectSpec>,

    /// Optional downstream webhook behavior
    #[serde(default)]
    pub webhook: Option<WebhookSpec>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Restricted JSON-Schema subset: `type`, `properties` (with `enum` and
/// nested `properties`), `required` (dot-paths allowed), and an
/// `allOf`/`if`/`then` conditional-required form. Nothing else is honored.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RequestSchema {
    #[serde(default, rename = "type")]
    pub schema_type: Option<String>,

    #[serde(default)]
    pub properties: HashMap<String, PropertySchema>,

    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default, rename = "allOf")]
    pub all_of: Vec<ConditionalRequirement>,
}

/// Constraints on one declared property.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PropertySchema {
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,

    /// Allowed literal values (exact, type-sensitive)
    #[serde(default, rename = "enum")]
    pub allowed: Option<Vec<Value>>,

    /// Advisory only, never enforced
    #[serde(default)]
    pub format: Option<String>,

    /// Nested object properties
    #[serde(default)]
    pub properties: Option<HashMap<String, PropertySchema>>,
}

/// `if {properties: {P: {const: L}}} then {required: [F...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalRequirement {
    #[serde(rename = "if")]
    pub condition: ConditionTrigger,
    pub then: ConsequentRequirement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionTrigger {
    pub properties: HashMap<String, ConstValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstValue {
    #[serde(rename = "const")]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsequentRequirement {
    #[serde(default)]
    pub required: Vec<String>,
}

/// Downstream webhook behavior for a method.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Discriminator field read from the request payload
    #[serde(default = "default_discriminator")]
    pub field: String,

    /// Discriminator value -> branch
    #[serde(default)]
    pub data_mapping: HashMap<String, WebhookBranch>,
}

fn default_discriminator() -> String {
    "type".to_string()
}

/// One webhook branch: target URL template and payload template.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBranch {
    pub url: TextTemplate,
    pub data: ResponseTemplate,
}

/// Redirect alternative to a response template.
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub url: TextTemplate,

    /// Query parameters appended to the target URL, in order
    #[serde(default)]
    pub parameters: Vec<RedirectParameter>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectParameter {
    pub name: String,
    pub value: TextTemplate,
}

impl RouteSet {
    /// Load and compose every YAML document under `dir` (recursively).
    /// Files are visited in sorted path order so the route table is
    /// deterministic. Any malformed document is fatal.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("configuration directory not found: {}", dir.display());
        }

        let mut files = Vec::new();
        collect_yaml_files(dir, &mut files)?;
        files.sort();

        let mut routes = Vec::new();
        for file in &files {
            tracing::info!(path = %file.display(), "Loading route definitions");
            let content = std::fs::read_to_string(file)?;
            let document: ConfigDocument = serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("{}: {}", file.display(), e))?;
            if document.routes.is_empty() {
                tracing::warn!(path = %file.display(), "Document declares no routes");
            }
            routes.extend(document.routes);
        }

        if routes.is_empty() {
            anyhow::bail!("no routes defined under {}", dir.display());
        }

        let set = Self { routes };
        set.validate()?;
        Ok(set)
    }

    /// Parse a single YAML document.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let document: ConfigDocument = serde_yaml::from_str(yaml)?;
        let set = Self {
            routes: document.routes,
        };
        set.validate()?;
        Ok(set)
    }

    /// Structural checks that must hold before serving anything.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, route) in self.routes.iter().enumerate() {
            route
                .validate()
                .map_err(|e| anyhow::anyhow!("route {} ({}): {}", i, route.path, e))?;
        }
        Ok(())
    }
}

impl RouteDefinition {
    fn validate(&self) -> anyhow::Result<()> {
        if !self.path.starts_with('/') {
            anyhow::bail!("path must start with '/'");
        }
        if self.methods.is_empty() {
            anyhow::bail!("route declares no methods");
        }
        for method in &self.methods {
            if method.method.is_empty() {
                anyhow::bail!("method verb cannot be empty");
            }
            if method.response.is_some() && method.redirect.is_some() {
                anyhow::bail!(
                    "method {} declares both a response and a redirect",
                    method.method
                );
            }
            if let Some(status) = method.status {
                if !(100..=599).contains(&status) {
                    anyhow::bail!("invalid status code: {}", status);
                }
            }
        }
        Ok(())
    }
}

fn collect_yaml_files(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_yaml_files(&path, files)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        ) {
            files.push(path);
        }
    }
    Ok(())
}
