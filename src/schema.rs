//! Response-shape descriptors for schema-constrained generation
//!
//! A [`Schema`] is sent with every inference request so the service answers
//! with JSON of a known shape, and the same descriptor is used afterwards to
//! check the answer before it is deserialized into a typed value.

use serde_json::{Map, Value, json};
use thiserror::Error;

/// A response did not match the requested shape
#[derive(Error, Debug, Clone, PartialEq)]
#[error("schema violation at {path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

/// Node types understood by the generative service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
}

impl SchemaType {
    /// Upper-case spelling used by Gemini's `responseSchema`
    fn gemini_name(self) -> &'static str {
        match self {
            SchemaType::Object => "OBJECT",
            SchemaType::Array => "ARRAY",
            SchemaType::String => "STRING",
            SchemaType::Number => "NUMBER",
            SchemaType::Integer => "INTEGER",
            SchemaType::Boolean => "BOOLEAN",
        }
    }

    /// Lower-case spelling used by standard JSON Schema
    fn json_schema_name(self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
        }
    }
}

/// One node of a response-shape descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub kind: SchemaType,
    /// Object members, in the order they should be generated
    pub properties: Vec<(String, Schema)>,
    pub items: Option<Box<Schema>>,
    pub required: Vec<String>,
    /// Allowed values for a string node
    pub variants: Vec<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl Schema {
    fn node(kind: SchemaType) -> Self {
        Self {
            kind,
            properties: Vec::new(),
            items: None,
            required: Vec::new(),
            variants: Vec::new(),
            minimum: None,
            maximum: None,
        }
    }

    pub fn string() -> Self {
        Self::node(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::node(SchemaType::Number)
    }

    pub fn integer() -> Self {
        Self::node(SchemaType::Integer)
    }

    pub fn boolean() -> Self {
        Self::node(SchemaType::Boolean)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::node(SchemaType::Array)
        }
    }

    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
            ..Self::node(SchemaType::Object)
        }
    }

    /// Mark object members as required
    pub fn require(mut self, names: &[&str]) -> Self {
        self.required = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Restrict a string node to a closed set of values
    pub fn one_of<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    /// Bound a numeric node (inclusive)
    pub fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Render as a Gemini `responseSchema`
    pub fn to_gemini(&self) -> Value {
        self.render(SchemaType::gemini_name, true)
    }

    /// Render as standard JSON Schema
    pub fn to_json_schema(&self) -> Value {
        self.render(SchemaType::json_schema_name, false)
    }

    fn render(&self, type_name: fn(SchemaType) -> &'static str, ordered: bool) -> Value {
        let mut node = Map::new();
        node.insert("type".to_string(), json!(type_name(self.kind)));

        if !self.properties.is_empty() {
            let mut props = Map::new();
            for (name, schema) in &self.properties {
                props.insert(name.clone(), schema.render(type_name, ordered));
            }
            node.insert("properties".to_string(), Value::Object(props));
            if ordered {
                let order: Vec<&str> = self.properties.iter().map(|(n, _)| n.as_str()).collect();
                node.insert("propertyOrdering".to_string(), json!(order));
            }
        }
        if let Some(items) = &self.items {
            node.insert("items".to_string(), items.render(type_name, ordered));
        }
        if !self.required.is_empty() {
            node.insert("required".to_string(), json!(self.required));
        }
        if !self.variants.is_empty() {
            if ordered {
                node.insert("format".to_string(), json!("enum"));
            }
            node.insert("enum".to_string(), json!(self.variants));
        }
        if let Some(min) = self.minimum {
            node.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = self.maximum {
            node.insert("maximum".to_string(), json!(max));
        }
        Value::Object(node)
    }

    /// Check a response value against this descriptor
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        let violation = |reason: String| SchemaViolation {
            path: path.to_string(),
            reason,
        };

        match self.kind {
            SchemaType::Object => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| violation(format!("expected object, got {}", kind_of(value))))?;
                for name in &self.required {
                    match obj.get(name) {
                        None | Some(Value::Null) => {
                            return Err(violation(format!("missing required field '{name}'")));
                        }
                        Some(_) => {}
                    }
                }
                for (name, schema) in &self.properties {
                    if let Some(member) = obj.get(name)
                        && !member.is_null()
                    {
                        schema.validate_at(member, &format!("{path}.{name}"))?;
                    }
                }
            }
            SchemaType::Array => {
                let items = value
                    .as_array()
                    .ok_or_else(|| violation(format!("expected array, got {}", kind_of(value))))?;
                if let Some(item_schema) = &self.items {
                    for (i, item) in items.iter().enumerate() {
                        item_schema.validate_at(item, &format!("{path}[{i}]"))?;
                    }
                }
            }
            SchemaType::String => {
                let s = value
                    .as_str()
                    .ok_or_else(|| violation(format!("expected string, got {}", kind_of(value))))?;
                if !self.variants.is_empty() && !self.variants.iter().any(|v| v == s) {
                    return Err(violation(format!(
                        "'{s}' is not one of [{}]",
                        self.variants.join(", ")
                    )));
                }
            }
            SchemaType::Number | SchemaType::Integer => {
                if self.kind == SchemaType::Integer && !(value.is_i64() || value.is_u64()) {
                    return Err(violation(format!("expected integer, got {}", kind_of(value))));
                }
                let n = value
                    .as_f64()
                    .ok_or_else(|| violation(format!("expected number, got {}", kind_of(value))))?;

                if let Some(min) = self.minimum
                    && n < min
                {
                    return Err(violation(format!("{n} is below minimum {min}")));
                }
                if let Some(max) = self.maximum
                    && n > max
                {
                    return Err(violation(format!("{n} is above maximum {max}")));
                }
            }
            SchemaType::Boolean => {
                if !value.is_boolean() {
                    return Err(violation(format!("expected boolean, got {}", kind_of(value))));
                }
            }
        }
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injury_schema() -> Schema {
        Schema::object([
            ("label", Schema::string()),
            ("chance", Schema::number().range(Some(0.0), Some(100.0))),
            (
                "severity",
                Schema::string().one_of(["Low", "Moderate", "High", "Critical"]),
            ),
        ])
        .require(&["label", "chance", "severity"])
    }

    #[test]
    fn test_gemini_rendering() {
        let schema = Schema::array(injury_schema());
        let rendered = schema.to_gemini();
        assert_eq!(rendered["type"], "ARRAY");
        assert_eq!(rendered["items"]["type"], "OBJECT");
        assert_eq!(rendered["items"]["required"], json!(["label", "chance", "severity"]));
        assert_eq!(
            rendered["items"]["propertyOrdering"],
            json!(["label", "chance", "severity"])
        );
        assert_eq!(rendered["items"]["properties"]["severity"]["format"], "enum");
        assert_eq!(rendered["items"]["properties"]["chance"]["maximum"], 100.0);
    }

    #[test]
    fn test_json_schema_rendering() {
        let rendered = injury_schema().to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["label"]["type"], "string");
        assert!(rendered.get("propertyOrdering").is_none());
        assert!(rendered["properties"]["severity"].get("format").is_none());
    }

    #[test]
    fn test_validate_accepts_conforming_value() {
        let value = json!([
            {"label": "Concussion", "chance": 35, "severity": "Moderate"},
            {"label": "Bone Fractures", "chance": 12.5, "severity": "Low", "extra": true}
        ]);
        assert!(Schema::array(injury_schema()).validate(&value).is_ok());
    }

    #[test]
    fn test_validate_reports_path() {
        let value = json!([
            {"label": "Concussion", "chance": 35, "severity": "Moderate"},
            {"label": "Bone Fractures", "chance": 140, "severity": "Low"}
        ]);
        let err = Schema::array(injury_schema()).validate(&value).unwrap_err();
        assert_eq!(err.path, "$[1].chance");
        assert!(err.reason.contains("above maximum"));
    }

    #[test]
    fn test_validate_missing_and_null_required() {
        let schema = injury_schema();
        let err = schema
            .validate(&json!({"label": "x", "chance": 1}))
            .unwrap_err();
        assert!(err.reason.contains("severity"));

        let err = schema
            .validate(&json!({"label": null, "chance": 1, "severity": "Low"}))
            .unwrap_err();
        assert!(err.reason.contains("label"));
    }

    #[test]
    fn test_validate_enum_and_integer() {
        let err = injury_schema()
            .validate(&json!({"label": "x", "chance": 1, "severity": "Extreme"}))
            .unwrap_err();
        assert!(err.reason.contains("not one of"));

        assert!(Schema::integer().validate(&json!(2023)).is_ok());
        assert!(Schema::integer().validate(&json!(2023.5)).is_err());
        assert!(Schema::integer().validate(&json!("2023")).is_err());
    }
}
