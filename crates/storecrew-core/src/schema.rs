//! Schema registry — declared field kinds per record kind
//!
//! Rules are declared up front and never inferred from incoming data, so a
//! validation failure is a function of the request and the rule alone.

use crate::error::{SchemaError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Expected kind of a declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    /// RFC 3339 timestamp carried as a JSON string.
    Timestamp,
}

impl FieldKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Timestamp => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
        }
    }

    /// Read a textual key (`target.key`) as a value of this kind.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let value = match self {
            Self::Text => Value::String(raw.to_string()),
            Self::Number => match raw.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::Number(serde_json::Number::from_f64(raw.parse::<f64>().ok()?)?),
            },
            Self::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return None,
            },
            Self::Timestamp => Value::String(raw.to_string()),
        };
        self.matches(&value).then_some(value)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Kind of a value as submitted, reported on a mismatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Text,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::String(_) => Self::Text,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

/// Declared shape of one record kind.
///
/// `key_field` names the natural unique key used by the upsert path; it is
/// always declared and required.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaRuleDef")]
pub struct SchemaRule {
    key_field: String,
    fields: BTreeMap<String, FieldRule>,
}

#[derive(Deserialize)]
struct SchemaRuleDef {
    key_field: String,
    fields: BTreeMap<String, FieldRule>,
}

impl TryFrom<SchemaRuleDef> for SchemaRule {
    type Error = SchemaError;

    fn try_from(def: SchemaRuleDef) -> Result<Self, Self::Error> {
        let rule = SchemaRule {
            key_field: def.key_field,
            fields: def.fields,
        };
        rule.check()?;
        Ok(rule)
    }
}

impl SchemaRule {
    pub fn builder(key_field: impl Into<String>) -> SchemaRuleBuilder {
        SchemaRuleBuilder {
            key_field: key_field.into(),
            fields: Vec::new(),
        }
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldRule> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    /// Required field names in sorted order.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, r)| r.required)
            .map(|(name, _)| name.as_str())
    }

    /// Required fields absent from `values`, sorted.
    pub fn missing_fields(&self, values: &Map<String, Value>) -> Vec<String> {
        self.required_fields()
            .filter(|name| !values.contains_key(*name))
            .map(String::from)
            .collect()
    }

    /// Check every present, declared field against its kind. Undeclared
    /// fields pass through.
    pub fn check_kinds(&self, values: &Map<String, Value>) -> Result<(), ValidationError> {
        for (name, value) in values {
            if let Some(rule) = self.fields.get(name) {
                if !rule.kind.matches(value) {
                    return Err(ValidationError::TypeMismatch {
                        field: name.clone(),
                        expected: rule.kind,
                        actual: ValueKind::of(value),
                    });
                }
            }
        }
        Ok(())
    }

    fn check(&self) -> Result<(), SchemaError> {
        if self.required_fields().next().is_none() {
            return Err(SchemaError::InvalidRule(
                "at least one field must be required".into(),
            ));
        }
        match self.fields.get(&self.key_field) {
            Some(rule) if rule.required => Ok(()),
            Some(_) => Err(SchemaError::InvalidRule(format!(
                "key field '{}' must be required",
                self.key_field
            ))),
            None => Err(SchemaError::InvalidRule(format!(
                "key field '{}' is not declared",
                self.key_field
            ))),
        }
    }
}

pub struct SchemaRuleBuilder {
    key_field: String,
    fields: Vec<(String, FieldRule)>,
}

impl SchemaRuleBuilder {
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), FieldRule { kind, required: true }));
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), FieldRule { kind, required: false }));
        self
    }

    pub fn build(self) -> Result<SchemaRule, SchemaError> {
        let mut fields = BTreeMap::new();
        for (name, rule) in self.fields {
            if fields.insert(name.clone(), rule).is_some() {
                return Err(SchemaError::InvalidRule(format!(
                    "field '{}' declared twice",
                    name
                )));
            }
        }
        let rule = SchemaRule {
            key_field: self.key_field,
            fields,
        };
        rule.check()?;
        Ok(rule)
    }
}

/// Append-only map from record kind to rule. Shared read-only once
/// configuration is done.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    rules: BTreeMap<String, SchemaRule>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, rule: SchemaRule) -> Result<(), SchemaError> {
        let kind = kind.into();
        if self.rules.contains_key(&kind) {
            return Err(SchemaError::DuplicateKind(kind));
        }
        self.rules.insert(kind, rule);
        Ok(())
    }

    pub fn get_rule(&self, kind: &str) -> Result<&SchemaRule, SchemaError> {
        self.rules
            .get(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.rules.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.rules.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamp_kind_requires_rfc3339() {
        assert!(FieldKind::Timestamp.matches(&json!("2024-05-01T10:00:00Z")));
        assert!(!FieldKind::Timestamp.matches(&json!("yesterday")));
        assert!(!FieldKind::Timestamp.matches(&json!(1714557600)));
    }

    #[test]
    fn builder_rejects_undeclared_key() {
        let err = SchemaRule::builder("id")
            .required("name", FieldKind::Text)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRule(_)));
    }
}
