//! Shallow field-type schema for structured output.

use crate::error::LoraixError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Expected JSON type of a top-level field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }

    /// Type/array-ness check only; nested shape is never inspected
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (FieldKind::String, Some(Value::String(_))) => true,
            (FieldKind::Number, Some(Value::Number(_))) => true,
            (FieldKind::Boolean, Some(Value::Bool(_))) => true,
            (FieldKind::Object, Some(Value::Object(_))) => true,
            (FieldKind::Array, Some(Value::Array(_))) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = LoraixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldKind::String),
            "number" | "integer" => Ok(FieldKind::Number),
            "boolean" => Ok(FieldKind::Boolean),
            "object" => Ok(FieldKind::Object),
            "array" => Ok(FieldKind::Array),
            other => Err(LoraixError::invalid_request(format!(
                "Unknown schema field type: {}",
                other
            ))),
        }
    }
}

/// Map of top-level field name to expected kind.
///
/// Validation is deliberately lax: only listed fields are checked, only
/// their top-level type, and extra fields are ignored. An empty schema
/// accepts any JSON value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ShallowSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl ShallowSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Iterate over fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether the schema lists no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check `json` against every listed field
    pub fn validate(&self, json: &Value) -> bool {
        self.fields
            .iter()
            .all(|(key, kind)| kind.matches(json.get(key)))
    }

    /// Derive a shallow schema from a JSON Schema document.
    ///
    /// Reads the top-level `properties` only. A `type` given as an array uses
    /// its first non-`null` entry; properties without a recognised type are
    /// skipped.
    pub fn from_json_schema(schema: &Value) -> Self {
        let mut fields = BTreeMap::new();

        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Self { fields };
        };

        for (name, property) in properties {
            let type_name = match property.get("type") {
                Some(Value::String(t)) => Some(t.as_str()),
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|t| *t != "null"),
                _ => None,
            };

            if let Some(kind) = type_name.and_then(|t| t.parse::<FieldKind>().ok()) {
                fields.insert(name.clone(), kind);
            }
        }

        Self { fields }
    }
}

impl<K: Into<String>> FromIterator<(K, FieldKind)> for ShallowSchema {
    fn from_iter<I: IntoIterator<Item = (K, FieldKind)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> ShallowSchema {
        ShallowSchema::new()
            .field("name", FieldKind::String)
            .field("age", FieldKind::Number)
    }

    #[test]
    fn test_validate_type_mismatch() {
        assert!(!person().validate(&json!({"name": "Ava", "age": "bad"})));
        assert!(person().validate(&json!({"name": "Ava", "age": 42})));
    }

    #[test]
    fn test_validate_is_lax() {
        // extra fields pass, nested shape is not inspected
        let schema = ShallowSchema::new()
            .field("tags", FieldKind::Array)
            .field("meta", FieldKind::Object);
        assert!(schema.validate(&json!({
            "tags": [1, "two", null],
            "meta": {"anything": [true]},
            "extra": 1
        })));
        assert!(ShallowSchema::new().validate(&json!("just a string")));
    }

    #[test]
    fn test_validate_rejects_missing_and_null() {
        let schema = ShallowSchema::new().field("meta", FieldKind::Object);
        assert!(!schema.validate(&json!({})));
        assert!(!schema.validate(&json!({"meta": null})));
        assert!(!schema.validate(&json!({"meta": []})));
        assert!(!person().validate(&json!([1, 2])));
    }

    #[test]
    fn test_deserialize_from_plain_map() {
        let schema: ShallowSchema =
            serde_json::from_value(json!({"name": "string", "age": "number"})).unwrap();
        assert_eq!(schema, person());
    }

    #[test]
    fn test_from_json_schema() {
        let schema = ShallowSchema::from_json_schema(&json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "nickname": {"type": ["null", "string"]},
                "ref": {"$ref": "#/definitions/Other"}
            }
        }));

        let fields: Vec<_> = schema.fields().collect();
        assert_eq!(
            fields,
            vec![
                ("age", FieldKind::Number),
                ("name", FieldKind::String),
                ("nickname", FieldKind::String),
            ]
        );
    }
}
