//! Tests for storecrew-core: schemas, operation validation, payloads, and errors

use serde_json::json;
use std::sync::Arc;
use storecrew_core::*;

fn registry() -> Arc<SchemaRegistry> {
    let mut reg = SchemaRegistry::new();
    reg.register(
        "sports",
        SchemaRule::builder("name")
            .required("name", FieldKind::Text)
            .required("rule", FieldKind::Text)
            .optional("players", FieldKind::Number)
            .optional("olympic", FieldKind::Boolean)
            .optional("founded", FieldKind::Timestamp)
            .build()
            .unwrap(),
    )
    .unwrap();
    Arc::new(reg)
}

fn validator() -> OperationValidator {
    OperationValidator::new(registry())
}

fn record(kind: OperationKind) -> OperationRequest {
    OperationRequest::new(kind, Target::container("sports_db", "sports"))
}

// ===========================================================================
// SchemaRule / SchemaRegistry
// ===========================================================================

#[test]
fn schema_rule_requires_declared_required_key() {
    let undeclared = SchemaRule::builder("id").required("name", FieldKind::Text).build();
    assert!(matches!(undeclared, Err(SchemaError::InvalidRule(_))));

    let optional_key = SchemaRule::builder("name")
        .optional("name", FieldKind::Text)
        .required("rule", FieldKind::Text)
        .build();
    assert!(matches!(optional_key, Err(SchemaError::InvalidRule(_))));

    let twice = SchemaRule::builder("name")
        .required("name", FieldKind::Text)
        .optional("name", FieldKind::Number)
        .build();
    assert!(matches!(twice, Err(SchemaError::InvalidRule(_))));
}

#[test]
fn schema_rule_lists_required_fields_sorted() {
    let reg = registry();
    let rule = reg.get_rule("sports").unwrap();
    let required: Vec<&str> = rule.required_fields().collect();
    assert_eq!(required, vec!["name", "rule"]);
    assert_eq!(rule.key_field(), "name");
}

#[test]
fn registry_is_append_only() {
    let mut reg = SchemaRegistry::new();
    let rule = SchemaRule::builder("name")
        .required("name", FieldKind::Text)
        .build()
        .unwrap();
    reg.register("people", rule.clone()).unwrap();
    assert_eq!(
        reg.register("people", rule),
        Err(SchemaError::DuplicateKind("people".into()))
    );
    assert_eq!(
        reg.get_rule("ghosts").unwrap_err(),
        SchemaError::UnknownKind("ghosts".into())
    );
    assert_eq!(reg.len(), 1);
}

#[test]
fn schema_rule_deserializes_with_checks() {
    let ok: SchemaRule = serde_json::from_value(json!({
        "key_field": "name",
        "fields": { "name": { "kind": "text", "required": true } }
    }))
    .unwrap();
    assert_eq!(ok.key_field(), "name");

    let bad = serde_json::from_value::<SchemaRule>(json!({
        "key_field": "name",
        "fields": { "title": { "kind": "text", "required": true } }
    }));
    assert!(bad.is_err());
}

// ===========================================================================
// OperationValidator: record writes
// ===========================================================================

#[test]
fn create_record_merges_target_key() {
    let req = record(OperationKind::CreateRecord)
        .with_field("rule", "Best of three sets");
    let req = OperationRequest {
        target: req.target.clone().with_key("Tennis"),
        ..req
    };
    let v = validator().validate(&req).unwrap();
    assert_eq!(v.key_field(), Some("name"));
    assert_eq!(v.key_value(), Some(&json!("Tennis")));
    assert_eq!(v.fields()["rule"], json!("Best of three sets"));
}

#[test]
fn missing_fields_are_reported_sorted() {
    let req = record(OperationKind::CreateRecord).with_field("players", 2);
    assert_eq!(
        validator().validate(&req).unwrap_err(),
        ValidationError::MissingFields(vec!["name".into(), "rule".into()])
    );
}

#[test]
fn type_mismatch_names_field_and_kinds() {
    let req = record(OperationKind::UpdateRecord)
        .with_field("name", "Tennis")
        .with_field("rule", "x")
        .with_field("players", "two");
    assert_eq!(
        validator().validate(&req).unwrap_err(),
        ValidationError::TypeMismatch {
            field: "players".into(),
            expected: FieldKind::Number,
            actual: ValueKind::Text,
        }
    );
}

#[test]
fn timestamps_must_be_rfc3339() {
    let base = record(OperationKind::CreateRecord)
        .with_field("name", "Tennis")
        .with_field("rule", "x");
    let good = base.clone().with_field("founded", "1873-12-01T00:00:00Z");
    assert!(validator().validate(&good).is_ok());

    let bad = base.with_field("founded", "last tuesday");
    assert!(matches!(
        validator().validate(&bad),
        Err(ValidationError::TypeMismatch { expected: FieldKind::Timestamp, .. })
    ));
}

#[test]
fn undeclared_fields_pass_through() {
    let req = record(OperationKind::CreateRecord)
        .with_field("name", "Tennis")
        .with_field("rule", "x")
        .with_field("surface", "clay");
    let v = validator().validate(&req).unwrap();
    assert_eq!(v.fields()["surface"], json!("clay"));
}

#[test]
fn unknown_record_kind_is_rejected() {
    let req = OperationRequest::new(OperationKind::CreateRecord, Target::container("db", "chess"))
        .with_field("name", "Chess");
    assert_eq!(
        validator().validate(&req).unwrap_err(),
        ValidationError::UnknownKind("chess".into())
    );

    let explicit = req.with_record_kind("sports").with_field("rule", "x");
    assert!(validator().validate(&explicit).is_ok());
}

#[test]
fn conflicting_key_is_invalid() {
    let req = OperationRequest::new(
        OperationKind::CreateRecord,
        Target::container("sports_db", "sports").with_key("Tennis"),
    )
    .with_field("name", "Squash")
    .with_field("rule", "x");
    assert!(matches!(validator().validate(&req), Err(ValidationError::InvalidName(_))));
}

#[test]
fn delete_record_needs_key() {
    let without = record(OperationKind::DeleteRecord);
    assert_eq!(
        validator().validate(&without).unwrap_err(),
        ValidationError::MissingFields(vec!["name".into()])
    );

    let with_field = record(OperationKind::DeleteRecord).with_field("name", "Tennis");
    assert_eq!(validator().validate(&with_field).unwrap().key_value(), Some(&json!("Tennis")));
}

fn numbered() -> OperationValidator {
    let mut reg = SchemaRegistry::new();
    reg.register(
        "jerseys",
        SchemaRule::builder("number")
            .required("number", FieldKind::Number)
            .required("player", FieldKind::Text)
            .build()
            .unwrap(),
    )
    .unwrap();
    OperationValidator::new(Arc::new(reg))
}

fn jersey(kind: OperationKind, key: &str) -> OperationRequest {
    OperationRequest::new(kind, Target::container("club", "jerseys").with_key(key))
}

#[test]
fn numeric_key_is_read_as_number() {
    let req = jersey(OperationKind::CreateRecord, "7").with_field("player", "Ronaldo");
    let v = numbered().validate(&req).unwrap();
    assert_eq!(v.key_value(), Some(&json!(7)));

    let agreeing = req.with_field("number", 7);
    assert_eq!(numbered().validate(&agreeing).unwrap().key_value(), Some(&json!(7)));

    let delete = jersey(OperationKind::DeleteRecord, " 10 ");
    assert_eq!(numbered().validate(&delete).unwrap().key_value(), Some(&json!(10)));
}

#[test]
fn key_that_does_not_fit_its_kind_is_a_mismatch() {
    let req = jersey(OperationKind::UpdateRecord, "seven").with_field("player", "Ronaldo");
    assert_eq!(
        numbered().validate(&req).unwrap_err(),
        ValidationError::TypeMismatch {
            field: "number".into(),
            expected: FieldKind::Number,
            actual: ValueKind::Text,
        }
    );
}

#[test]
fn field_kind_coerces_textual_keys() {
    assert_eq!(FieldKind::Number.coerce("2.5"), Some(json!(2.5)));
    assert_eq!(FieldKind::Boolean.coerce("TRUE"), Some(json!(true)));
    assert_eq!(FieldKind::Boolean.coerce("yes"), None);
    assert_eq!(
        FieldKind::Timestamp.coerce("2024-05-01T10:00:00Z"),
        Some(json!("2024-05-01T10:00:00Z"))
    );
    assert_eq!(FieldKind::Timestamp.coerce("tomorrow"), None);
}

// ===========================================================================
// OperationValidator: structural operations
// ===========================================================================

#[test]
fn names_are_trimmed_and_must_be_non_empty() {
    let v = validator()
        .validate(&OperationRequest::new(
            OperationKind::CreateContainer,
            Target::container("  sports_db ", " sports"),
        ))
        .unwrap();
    assert_eq!(v.store(), "sports_db");
    assert_eq!(v.container(), "sports");

    let blank = OperationRequest::new(OperationKind::CreateContainer, Target::container("db", "   "));
    assert!(matches!(validator().validate(&blank), Err(ValidationError::InvalidName(_))));

    let no_container = OperationRequest::new(OperationKind::DeleteContainer, Target::store("db"));
    assert!(matches!(validator().validate(&no_container), Err(ValidationError::InvalidName(_))));
}

#[test]
fn rename_needs_a_different_target() {
    let base = OperationRequest::new(OperationKind::RenameContainer, Target::container("db", "a"));
    assert!(matches!(validator().validate(&base), Err(ValidationError::InvalidName(_))));
    assert!(matches!(
        validator().validate(&base.clone().with_rename_to(" a ")),
        Err(ValidationError::InvalidName(_))
    ));
    let ok = validator().validate(&base.with_rename_to("b")).unwrap();
    assert_eq!(ok.rename_to(), Some("b"));
}

#[test]
fn list_stores_needs_no_names() {
    let req = OperationRequest::new(OperationKind::ListStores, Target::default());
    assert!(validator().validate(&req).is_ok());
}

#[test]
fn structural_operations_skip_schema() {
    let req = OperationRequest::new(OperationKind::CreateContainer, Target::container("db", "unregistered"));
    assert!(validator().validate(&req).is_ok());
}

// ===========================================================================
// Wire format
// ===========================================================================

#[test]
fn operation_request_wire_format() {
    let req: OperationRequest = serde_json::from_value(json!({
        "operation": "retrieve_records",
        "target": { "store": "hr", "container": "people" },
        "query": { "filter": { "gender": "Male" }, "sort": [{ "field": "age", "order": "desc" }], "limit": 5 }
    }))
    .unwrap();
    assert_eq!(req.kind, OperationKind::RetrieveRecords);
    let query = req.query.unwrap();
    assert_eq!(query.filter["gender"], json!("Male"));
    assert_eq!(query.sort[0].order, SortOrder::Descending);
    assert_eq!(query.limit, Some(5));
}

#[test]
fn operation_result_is_tagged() {
    let ok = OperationResult::success(ResultData::updated(1, 1));
    assert_eq!(
        serde_json::to_value(&ok).unwrap(),
        json!({ "status": "success", "data": { "matched_count": 1, "modified_count": 1 } })
    );

    let err: OperationResult = ValidationError::MissingFields(vec!["rule".into()]).into();
    assert_eq!(err.error_kind(), Some(ErrorKind::MissingFields));
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({ "status": "error", "kind": "missing_fields", "message": "missing required fields: rule" })
    );
}

#[test]
fn execution_errors_map_to_kinds() {
    let cases = [
        (ExecutionError::NotFound("x".into()), ErrorKind::NotFound),
        (ExecutionError::StorageFault("x".into()), ErrorKind::StorageFault),
        (ExecutionError::Timeout("x".into()), ErrorKind::Timeout),
        (ExecutionError::Conflict("x".into()), ErrorKind::Conflict),
        (ExecutionError::ReasoningFault("x".into()), ErrorKind::ReasoningFault),
    ];
    for (err, kind) in cases {
        let result: OperationResult = err.into();
        assert_eq!(result.error_kind(), Some(kind));
        assert!(!kind.is_validation());
    }
}

#[test]
fn operation_kind_scopes() {
    assert_eq!(OperationKind::ALL.len(), 12);
    assert!(OperationKind::RetrieveRecords.is_read_only());
    assert!(!OperationKind::UpdateRecord.is_read_only());
    assert_eq!(OperationKind::ListContainers.scope(), Scope::Store);
    assert_eq!(OperationKind::DeleteRecord.scope(), Scope::Record);
    assert_eq!(OperationKind::RenameStore.to_string(), "rename_store");
}

// ===========================================================================
// Payload / termination word
// ===========================================================================

#[test]
fn termination_signal_is_whole_word_case_insensitive() {
    assert!(Payload::text("Done. TERMINATE").contains_signal("TERMINATE"));
    assert!(Payload::text("ok, terminate!").contains_signal("TERMINATE"));
    assert!(!Payload::text("process terminated").contains_signal("TERMINATE"));
    assert!(!Payload::text("TERMINATE_NOW").contains_signal("TERMINATE"));
    assert!(!Payload::Result(OperationResult::error(ErrorKind::Timeout, "TERMINATE"))
        .contains_signal("TERMINATE"));
}

#[test]
fn payload_labels() {
    assert_eq!(Payload::text("x").label(), "text");
    assert_eq!(
        Payload::Result(OperationResult::success(ResultData::skipped())).label(),
        "result:success"
    );
}

#[test]
fn conversation_ids_are_unique() {
    let a = ConversationId::generate();
    let b = ConversationId::generate();
    assert_ne!(a, b);
    assert_eq!(serde_json::to_value(&a).unwrap(), json!(a.as_str()));
}

#[test]
fn worker_spec_deserializes_from_config_shape() {
    let spec: WorkerSpec = serde_json::from_value(json!({
        "name": "runner",
        "role": "executor",
        "capabilities": ["mutation_call"],
        "requires_confirmation": true
    }))
    .unwrap();
    assert!(spec.can(Capability::MutationCall));
    assert!(!spec.role.uses_reasoning());
    assert!(spec.requires_confirmation);
}
