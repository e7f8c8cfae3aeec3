//! Response and webhook templates.
//!
//! Configuration trees are classified once at load time into a tagged node
//! type, so no shape-sniffing happens per request. The token grammar is
//! closed: a token is `{name}` (request-derived) or `{$name}` (synthetic),
//! nothing else; configuration can never execute code.

use crate::error::RequestError;
use crate::token::TokenContext;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A string template split into literal runs and token references.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTemplate {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Token(String),
}

impl TextTemplate {
    /// Parse a string, splitting out `{...}` markers. An unterminated `{`
    /// is kept as literal text.
    pub fn parse(text: &str) -> Self {
        let mut parts = Vec::new();
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            match rest[open..].find('}') {
                Some(close_off) => {
                    if open > 0 {
                        parts.push(Part::Literal(rest[..open].to_string()));
                    }
                    let name = &rest[open + 1..open + close_off];
                    parts.push(Part::Token(name.to_string()));
                    rest = &rest[open + close_off + 1..];
                }
                None => break,
            }
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        Self { parts }
    }

    /// True if any part is a token reference.
    pub fn has_tokens(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Token(_)))
    }

    /// True if the template is exactly one token with no surrounding text.
    pub fn is_single_token(&self) -> bool {
        matches!(self.parts.as_slice(), [Part::Token(_)])
    }

    /// Render to a string, stringifying every token value.
    pub fn render_string(&self, ctx: &TokenContext) -> Result<String, RequestError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Token(name) => out.push_str(&value_to_string(ctx.resolve(name)?)),
            }
        }
        Ok(out)
    }

    /// Render to a JSON value. A single-token template keeps the token's
    /// native type; anything else interpolates into a string.
    pub fn render_value(&self, ctx: &TokenContext) -> Result<Value, RequestError> {
        if let [Part::Token(name)] = self.parts.as_slice() {
            return Ok(ctx.resolve(name)?.clone());
        }
        Ok(Value::String(self.render_string(ctx)?))
    }
}

impl<'de> Deserialize<'de> for TextTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(TextTemplate::parse(&text))
    }
}

/// Target type of a `{value, type}` wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceType {
    Int,
    Str,
}

impl CoerceType {
    /// The source configuration mixes `int` and `integer`; both coerce to
    /// an integer, everything else to a string.
    fn parse(name: &str) -> Self {
        match name {
            "int" | "integer" => CoerceType::Int,
            _ => CoerceType::Str,
        }
    }

    fn coerce(self, value: Value) -> Result<Value, RequestError> {
        match self {
            CoerceType::Int => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
                Value::String(s) => {
                    s.trim().parse::<i64>().map(Value::from).map_err(|_| {
                        RequestError::TemplateError {
                            detail: format!("cannot coerce {s:?} to int"),
                        }
                    })
                }
                other => Err(RequestError::TemplateError {
                    detail: format!("cannot coerce {other} to int"),
                }),
            },
            CoerceType::Str => Ok(Value::String(value_to_string(&value))),
        }
    }
}

/// One node of a classified template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Plain data, emitted as-is.
    Literal(Value),
    /// String containing token markers.
    Text(TextTemplate),
    /// `{value: <expr>, type: <target>}` wrapper.
    TypedToken { expr: TextTemplate, ty: CoerceType },
    Sequence(Vec<Node>),
    Mapping(Vec<(String, Node)>),
}

/// A response (or webhook payload) template, classified at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTemplate {
    root: Node,
}

impl ResponseTemplate {
    /// Classify a raw configuration tree.
    pub fn compile(value: &Value) -> Self {
        Self {
            root: classify(value),
        }
    }

    /// Substitute tokens, producing the literal response body.
    pub fn render(&self, ctx: &TokenContext) -> Result<Value, RequestError> {
        render_node(&self.root, ctx)
    }
}

impl<'de> Deserialize<'de> for ResponseTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ResponseTemplate::compile(&value))
    }
}

fn classify(value: &Value) -> Node {
    match value {
        Value::Object(map) => {
            if let Some(node) = classify_typed_wrapper(map) {
                return node;
            }
            Node::Mapping(
                map.iter()
                    .map(|(key, v)| (key.clone(), classify(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Node::Sequence(items.iter().map(classify).collect()),
        Value::String(text) => {
            let template = TextTemplate::parse(text);
            if template.has_tokens() {
                Node::Text(template)
            } else {
                Node::Literal(value.clone())
            }
        }
        other => Node::Literal(other.clone()),
    }
}

/// A mapping with exactly the keys `value` and `type` (type a string,
/// value a scalar) is a typed-value wrapper, not data.
fn classify_typed_wrapper(map: &Map<String, Value>) -> Option<Node> {
    if map.len() != 2 {
        return None;
    }
    let ty = map.get("type")?.as_str()?;
    let value = map.get("value")?;
    let expr = match value {
        Value::String(s) => TextTemplate::parse(s),
        Value::Number(_) | Value::Bool(_) => TextTemplate::parse(&value_to_string(value)),
        _ => return None,
    };
    Some(Node::TypedToken {
        expr,
        ty: CoerceType::parse(ty),
    })
}

fn render_node(node: &Node, ctx: &TokenContext) -> Result<Value, RequestError> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Text(template) => template.render_value(ctx),
        Node::TypedToken { expr, ty } => ty.coerce(expr.render_value(ctx)?),
        Node::Sequence(items) => {
            let rendered: Result<Vec<_>, _> =
                items.iter().map(|item| render_node(item, ctx)).collect();
            Ok(Value::Array(rendered?))
        }
        Node::Mapping(entries) => {
            let mut map = Map::new();
            for (key, child) in entries {
                map.insert(key.clone(), render_node(child, ctx)?);
            }
            Ok(Value::Object(map))
        }
    }
}

/// String form of a token value for interpolation. Strings stay bare;
/// everything else uses its compact JSON form.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
