//! Declarative input schemas for tools.
//!
//! A schema names a tool's parameters, tags each with a primitive type,
//! and lists which are required. Validation checks exactly that — required
//! presence and primitive type agreement. Nested structure, enums, and
//! ranges are out of scope here; tools that need stricter checks layer
//! them inside `execute`.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::tool::JsonMap;

/// Primitive type tag for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
}

impl FieldType {
    fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            // Integers are numbers too, matching JSON's numeric model.
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldSpec {
    field_type: FieldType,
    description: String,
}

/// A violation found while validating input against an [`InputSchema`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("Missing required field: '{field}'")]
    MissingField { field: String },

    #[error("Field '{field}' must be of type {expected}")]
    WrongType { field: String, expected: &'static str },
}

/// Required fields plus per-field primitive type tags.
///
/// Serializes to the JSON-schema-like object shape used by the `/tools`
/// endpoint and embedded in planner prompts:
///
/// ```json
/// {"type": "object", "properties": {"expression": {"type": "string",
///  "description": "..."}}, "required": ["expression"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSchema {
    properties: BTreeMap<String, FieldSpec>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.properties.insert(
            name.into(),
            FieldSpec {
                field_type,
                description: description.into(),
            },
        );
        self
    }

    /// Declare a required field.
    pub fn required_field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let mut schema = self.field(name.clone(), field_type, description);
        schema.required.push(name);
        schema
    }

    /// Validate required presence and primitive type agreement.
    ///
    /// Fields present in the input but absent from the schema pass
    /// untouched; tools own any stricter interpretation.
    pub fn validate(&self, input: &JsonMap) -> Result<(), SchemaViolation> {
        for field in &self.required {
            if !input.contains_key(field) {
                return Err(SchemaViolation::MissingField {
                    field: field.clone(),
                });
            }
        }

        for (field, value) in input {
            if let Some(spec) = self.properties.get(field) {
                if !spec.field_type.matches(value) {
                    return Err(SchemaViolation::WrongType {
                        field: field.clone(),
                        expected: spec.field_type.as_str(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Render the schema as its JSON wire shape.
    pub fn to_json(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "type": spec.field_type.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
