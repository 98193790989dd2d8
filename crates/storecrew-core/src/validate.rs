//! Operation validator — the only way to obtain a `ValidatedRequest`
//!
//! Validation is pure: it reads the schema registry and the request, never
//! the store.

use crate::error::{SchemaError, ValidationError};
use crate::operation::{OperationKind, OperationRequest, Query, Target};
use crate::schema::{FieldKind, SchemaRegistry, SchemaRule, ValueKind};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A request that passed validation. Fields are private so the executor's
/// input type doubles as proof that validation happened.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidatedRequest {
    kind: OperationKind,
    target: Target,
    fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rename_to: Option<String>,
    query: Query,
}

impl ValidatedRequest {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn store(&self) -> &str {
        &self.target.store
    }

    /// Container name. Empty for store-level operations.
    pub fn container(&self) -> &str {
        self.target.container.as_deref().unwrap_or_default()
    }

    /// Fields to write, with the target key merged in under the key field.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn key_field(&self) -> Option<&str> {
        self.key_field.as_deref()
    }

    /// Value of the natural key for record writes and deletes.
    pub fn key_value(&self) -> Option<&Value> {
        self.key_field.as_ref().and_then(|k| self.fields.get(k))
    }

    pub fn rename_to(&self) -> Option<&str> {
        self.rename_to.as_deref()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

pub struct OperationValidator {
    schemas: Arc<SchemaRegistry>,
}

impl OperationValidator {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    pub fn validate(&self, request: &OperationRequest) -> Result<ValidatedRequest, ValidationError> {
        let kind = request.kind;
        let mut target = Target::default();

        if kind != OperationKind::ListStores {
            target.store = check_name("store", Some(&request.target.store))?;
        }
        if needs_container(kind) {
            target.container = Some(check_name("container", request.target.container.as_deref())?);
        }

        let rename_to = if kind.is_rename() {
            let source = match kind {
                OperationKind::RenameStore => target.store.as_str(),
                _ => target.container.as_deref().unwrap_or_default(),
            };
            let to = check_name("rename target", request.rename_to.as_deref())?;
            if to == source {
                return Err(ValidationError::InvalidName(format!(
                    "rename target '{}' is the same as the source",
                    to
                )));
            }
            Some(to)
        } else {
            None
        };

        let mut fields = Map::new();
        let mut key_field = None;

        match kind {
            OperationKind::CreateRecord | OperationKind::UpdateRecord => {
                let rule = self.rule_for(request)?;
                fields = request.fields.clone();
                if let Some(key) = &request.target.key {
                    let key = check_name("record key", Some(key))?;
                    merge_key(&mut fields, rule, &key)?;
                    target.key = Some(key);
                }
                let missing = rule.missing_fields(&fields);
                if !missing.is_empty() {
                    return Err(ValidationError::MissingFields(missing));
                }
                rule.check_kinds(&fields)?;
                key_field = Some(rule.key_field().to_string());
            }
            OperationKind::DeleteRecord => {
                let rule = self.rule_for(request)?;
                let key_name = rule.key_field();
                let key = match (&request.target.key, request.fields.get(key_name)) {
                    (Some(k), _) if !k.trim().is_empty() => typed_key(rule, k.trim())?,
                    (_, Some(v)) if !v.is_null() => v.clone(),
                    _ => return Err(ValidationError::MissingFields(vec![key_name.to_string()])),
                };
                target.key = request.target.key.as_ref().map(|k| k.trim().to_string());
                fields.insert(key_name.to_string(), key);
                key_field = Some(key_name.to_string());
            }
            _ => {}
        }

        let query = match kind {
            OperationKind::RetrieveRecords => request.query.clone().unwrap_or_default(),
            _ => Query::default(),
        };

        Ok(ValidatedRequest {
            kind,
            target,
            fields,
            key_field,
            rename_to,
            query,
        })
    }

    fn rule_for(&self, request: &OperationRequest) -> Result<&SchemaRule, ValidationError> {
        let kind = request
            .effective_record_kind()
            .ok_or_else(|| ValidationError::UnknownKind(String::new()))?;
        self.schemas.get_rule(kind).map_err(|e| match e {
            SchemaError::UnknownKind(k) => ValidationError::UnknownKind(k),
            other => ValidationError::UnknownKind(other.to_string()),
        })
    }
}

fn needs_container(kind: OperationKind) -> bool {
    !matches!(
        kind,
        OperationKind::CreateStore
            | OperationKind::ListStores
            | OperationKind::DeleteStore
            | OperationKind::RenameStore
            | OperationKind::ListContainers
    )
}

fn check_name(what: &str, name: Option<&str>) -> Result<String, ValidationError> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(ValidationError::InvalidName(format!(
            "{} must not be empty",
            what
        ))),
    }
}

/// Read `target.key` as the declared kind of the rule's key field.
fn typed_key(rule: &SchemaRule, key: &str) -> Result<Value, ValidationError> {
    let key_field = rule.key_field();
    let kind = rule.field(key_field).map(|f| f.kind).unwrap_or(FieldKind::Text);
    kind.coerce(key).ok_or_else(|| ValidationError::TypeMismatch {
        field: key_field.to_string(),
        expected: kind,
        actual: ValueKind::Text,
    })
}

fn merge_key(fields: &mut Map<String, Value>, rule: &SchemaRule, key: &str) -> Result<(), ValidationError> {
    let key_field = rule.key_field();
    let value = typed_key(rule, key)?;
    match fields.get(key_field) {
        Some(existing) if same_key(existing, &value) => Ok(()),
        Some(existing) => Err(ValidationError::InvalidName(format!(
            "record key '{}' conflicts with field '{}' = {}",
            key, key_field, existing
        ))),
        None => {
            fields.insert(key_field.to_string(), value);
            Ok(())
        }
    }
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
