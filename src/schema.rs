//! Request schema validation.
//!
//! The restricted schema subset compiles into a flat list of independent
//! constraints evaluated against the parsed payload. Every violated
//! constraint is reported, never just the first. Unknown payload
//! properties are accepted and ignored.

use crate::config::{PropertySchema, RequestSchema};
use crate::error::Violation;
use serde_json::Value;

/// A single constraint kind. Evaluated independently; results accumulate.
#[derive(Debug, Clone)]
enum Constraint {
    /// Field (dot-path allowed) must be present and non-null.
    Required { path: String },
    /// If present, the field's value must be one of the allowed literals.
    Enum { path: String, allowed: Vec<Value> },
    /// If present and non-null, the field must decode as the given shape.
    TypeShape { path: String, kind: ValueKind },
    /// If every trigger field equals its literal, the consequent fields
    /// become required.
    ConditionalRequired {
        triggers: Vec<(String, Value)>,
        required: Vec<String>,
    },
}

/// Presence-shape categories. `int` and `integer` are synonyms; unknown
/// type names produce no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ValueKind::String),
            "int" | "integer" => Some(ValueKind::Integer),
            "number" => Some(ValueKind::Number),
            "boolean" | "bool" => Some(ValueKind::Boolean),
            "array" => Some(ValueKind::Array),
            "object" => Some(ValueKind::Object),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// Compiled validator for one method's request schema.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    constraints: Vec<Constraint>,
}

impl SchemaValidator {
    /// Flatten a schema into its constraint list.
    pub fn new(schema: &RequestSchema) -> Self {
        let mut constraints = Vec::new();

        for path in &schema.required {
            constraints.push(Constraint::Required { path: path.clone() });
        }

        for (name, property) in &schema.properties {
            collect_property_constraints(name, property, &mut constraints);
        }

        for conditional in &schema.all_of {
            let triggers = conditional
                .condition
                .properties
                .iter()
                .map(|(field, literal)| (field.clone(), literal.value.clone()))
                .collect();
            constraints.push(Constraint::ConditionalRequired {
                triggers,
                required: conditional.then.required.clone(),
            });
        }

        Self { constraints }
    }

    /// Evaluate every constraint; an empty list means the payload is valid.
    pub fn validate(&self, payload: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();

        for constraint in &self.constraints {
            match constraint {
                Constraint::Required { path } => {
                    if !is_present(payload, path) {
                        violations.push(Violation::new(path, "required field is missing"));
                    }
                }
                Constraint::Enum { path, allowed } => {
                    if let Some(value) = lookup(payload, path) {
                        if !value.is_null() && !allowed.contains(value) {
                            violations.push(Violation::new(
                                path,
                                format!("value {value} is not allowed by enum"),
                            ));
                        }
                    }
                }
                Constraint::TypeShape { path, kind } => {
                    if let Some(value) = lookup(payload, path) {
                        if !value.is_null() && !kind.matches(value) {
                            violations.push(Violation::new(
                                path,
                                format!("expected {} value", kind.name()),
                            ));
                        }
                    }
                }
                Constraint::ConditionalRequired { triggers, required } => {
                    // A trigger with no properties never fires.
                    let triggered = !triggers.is_empty()
                        && triggers
                            .iter()
                            .all(|(field, literal)| lookup(payload, field) == Some(literal));
                    if let (true, Some((field, value))) = (triggered, triggers.first()) {
                        for path in required {
                            if !is_present(payload, path) {
                                violations.push(Violation::new(
                                    path,
                                    format!("required when {field} = {value}"),
                                ));
                            }
                        }
                    }
                }
            }
        }

        violations
    }
}

fn collect_property_constraints(
    path: &str,
    property: &PropertySchema,
    constraints: &mut Vec<Constraint>,
) {
    if let Some(allowed) = &property.allowed {
        constraints.push(Constraint::Enum {
            path: path.to_string(),
            allowed: allowed.clone(),
        });
    }
    if let Some(kind) = property.property_type.as_deref().and_then(ValueKind::parse) {
        constraints.push(Constraint::TypeShape {
            path: path.to_string(),
            kind,
        });
    }
    if let Some(nested) = &property.properties {
        for (name, child) in nested {
            collect_property_constraints(&format!("{path}.{name}"), child, constraints);
        }
    }
}

/// Descend nested mappings by dot-path.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn is_present(payload: &Value, path: &str) -> bool {
    matches!(lookup(payload, path), Some(value) if !value.is_null())
}
