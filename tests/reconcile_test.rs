//! End-to-end reconciliation rounds against an in-memory server.

use std::cell::RefCell;
use std::collections::BTreeMap;

use dsconfig_reconcile::reconcile::{self, Context, Mode, Transport};
use dsconfig_reconcile::{
    apply_operations, build_operations, normalize, validate, CollapsePolicy, ConfigRecord,
    FieldValue, NormalizeOptions, OpKind, PatchOperation, ReconcileError, RecordError, Scalar,
    ScalarKind, SubtypeSchema, ValidateError, VariantResponse, Violation,
};
use serde_json::{json, Map, Value};

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("no such object: {0}")]
    NotFound(String),
    #[error("object already exists: {0}")]
    Exists(String),
}

/// Stores records by id and answers with variant responses, the way the
/// configuration API does. Unset strings are echoed back as `""` so the
/// collapse rules get exercised.
struct FakeServer {
    schema: SubtypeSchema,
    objects: RefCell<BTreeMap<String, ConfigRecord>>,
    requests: RefCell<Vec<(&'static str, String)>>,
    patches: RefCell<Vec<Vec<PatchOperation>>>,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            schema: SubtypeSchema::virtual_attribute(),
            objects: RefCell::default(),
            requests: RefCell::default(),
            patches: RefCell::default(),
        }
    }

    fn with_object(self, record: ConfigRecord) -> Self {
        let id = record.id.clone().unwrap();
        self.objects.borrow_mut().insert(id, record);
        self
    }

    fn requests(&self) -> Vec<&'static str> {
        self.requests.borrow().iter().map(|(verb, _)| *verb).collect()
    }

    fn respond(&self, record: &ConfigRecord) -> VariantResponse {
        let subtype = self.schema.decode_type(&record.subtype).unwrap();
        let mut payload = Map::new();
        payload.insert("id".into(), json!(record.id));
        for spec in self.schema.fields_for(&subtype.tag) {
            let value = match record.get(&spec.name) {
                FieldValue::Absent | FieldValue::Null if spec.is_collection() => json!([]),
                FieldValue::Absent | FieldValue::Null => match spec.scalar {
                    ScalarKind::String | ScalarKind::Choice { .. } => json!(""),
                    ScalarKind::Bool | ScalarKind::Int => Value::Null,
                },
                other => other.to_json().unwrap(),
            };
            payload.insert(spec.wire_name().into_owned(), value);
        }
        VariantResponse::new().with_member(subtype.payload_member(), Value::Object(payload))
    }
}

impl Transport for FakeServer {
    type Error = ServerError;

    fn create(&self, body: &Map<String, Value>) -> Result<VariantResponse, ServerError> {
        let id = body["id"].as_str().unwrap().to_string();
        self.requests.borrow_mut().push(("create", id.clone()));
        if self.objects.borrow().contains_key(&id) {
            return Err(ServerError::Exists(id));
        }

        let mut record = ConfigRecord::new(body["type"].as_str().unwrap()).with_id(&id);
        for spec in &self.schema.fields {
            if let Some(raw) = body.get(spec.wire_name().as_ref()) {
                let value = if spec.is_collection() {
                    FieldValue::Values(spec.decode_members(raw).unwrap())
                } else {
                    FieldValue::Scalar(spec.decode_scalar(raw).unwrap())
                };
                record.set(&spec.name, value);
            }
        }
        let response = self.respond(&record);
        self.objects.borrow_mut().insert(id, record);
        Ok(response)
    }

    fn get(&self, id: &str) -> Result<VariantResponse, ServerError> {
        self.requests.borrow_mut().push(("get", id.to_string()));
        let objects = self.objects.borrow();
        let record = objects
            .get(id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))?;
        Ok(self.respond(record))
    }

    fn update(
        &self,
        id: &str,
        operations: &[PatchOperation],
    ) -> Result<VariantResponse, ServerError> {
        self.requests.borrow_mut().push(("update", id.to_string()));
        self.patches.borrow_mut().push(operations.to_vec());
        let mut objects = self.objects.borrow_mut();
        let record = objects
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))?;
        apply_operations(record, operations);
        Ok(self.respond(record))
    }

    fn delete(&self, id: &str) -> Result<(), ServerError> {
        self.requests.borrow_mut().push(("delete", id.to_string()));
        self.objects
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServerError::NotFound(id.to_string()))
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn set_member_added() {
        let schema = SubtypeSchema::virtual_attribute();
        let plan = ConfigRecord::new("user-defined").with("value", FieldValue::strings(["a", "b"]));
        let state = ConfigRecord::new("user-defined").with("value", FieldValue::strings(["a"]));

        assert_eq!(
            build_operations(&plan, &state, &schema),
            vec![PatchOperation::add_members("value", vec![Scalar::from("b")])]
        );
    }

    #[test]
    fn empty_string_removes_field() {
        let schema = SubtypeSchema::virtual_attribute();
        let plan = ConfigRecord::new("mirror").with("description", "");
        let state = ConfigRecord::new("mirror").with("description", "old");

        assert_eq!(
            build_operations(&plan, &state, &schema),
            vec![PatchOperation::remove("description")]
        );
    }

    #[test]
    fn equal_choice_needs_nothing() {
        let schema = SubtypeSchema::virtual_attribute();
        let plan = ConfigRecord::new("dn-join").with("join_scope", "base-object");
        let state = plan.clone();

        assert!(build_operations(&plan, &state, &schema).is_empty());
    }

    #[test]
    fn illegal_field_for_type() {
        let schema = SubtypeSchema::virtual_attribute();
        let record = ConfigRecord::new("mirror").with("join_match_all", true);

        let Err(ValidateError::Invalid { errors }) = validate(&record, &schema) else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "join_match_all not supported for type 'mirror'; allowed types: [equality-join]"
        );
    }

    #[test]
    fn two_populated_payloads() {
        let schema = SubtypeSchema::virtual_attribute();
        let response = VariantResponse::new()
            .with_member("MirrorPayload", json!({ "id": "va1" }))
            .with_member("ConstructedPayload", json!({ "id": "va1" }));

        let err = normalize(&response, &ConfigRecord::new("mirror"), &schema).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MalformedVariantResponse { ref populated } if populated.len() == 2
        ));
    }
}

mod editable {
    use super::*;

    fn plan() -> ConfigRecord {
        ConfigRecord::new("constructed")
            .with_id("full-name")
            .with("value_pattern", FieldValue::strings(["{givenName} {sn}"]))
            .with("base_dn", FieldValue::strings(["ou=people,dc=example,dc=com"]))
            .with("enabled", true)
    }

    #[test]
    fn full_lifecycle() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let state = reconcile::create(&ctx, &plan()).unwrap();
        assert_eq!(state.get("enabled"), &FieldValue::bool(true));
        // Server echoed "" for unset descriptions; the plan left it unset.
        assert!(state.get("description").is_absent());
        assert_eq!(state.get("filter"), &FieldValue::Values(vec![]));

        let state = reconcile::read(&ctx, &state).unwrap();

        let next = plan()
            .with("enabled", false)
            .with("base_dn", FieldValue::strings(["ou=staff,dc=example,dc=com"]));
        let state = reconcile::update(&ctx, &next, &state).unwrap();
        assert_eq!(state.get("enabled"), &FieldValue::bool(false));
        assert_eq!(
            state.get("base_dn"),
            &FieldValue::strings(["ou=staff,dc=example,dc=com"])
        );

        let patch = server.patches.borrow()[0].clone();
        let kinds: Vec<(OpKind, &str)> = patch.iter().map(|op| (op.op, op.path.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (OpKind::Replace, "enabled"),
                (OpKind::Add, "base_dn"),
                (OpKind::Remove, "base_dn"),
            ]
        );

        reconcile::delete(&ctx, &state).unwrap();
        assert!(server.objects.borrow().is_empty());
        assert_eq!(
            server.requests(),
            vec!["create", "get", "update", "delete"]
        );
    }

    #[test]
    fn create_sends_only_populated_fields() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let plan = plan().with("description", "").with("filter", FieldValue::Null);
        reconcile::create(&ctx, &plan).unwrap();

        let stored = server.objects.borrow()["full-name"].clone();
        assert!(stored.get("description").is_absent());
        assert!(stored.get("filter").is_absent());
        assert_eq!(stored.get("valuePattern"), &FieldValue::Absent);
        assert_eq!(
            stored.get("value_pattern"),
            &FieldValue::strings(["{givenName} {sn}"])
        );
    }

    #[test]
    fn invalid_plan_sends_nothing() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let plan = plan().with("script_class", "com.example.Script");
        let err = reconcile::create(&ctx, &plan).unwrap_err();

        assert!(matches!(err, ReconcileError::Validate(ValidateError::Invalid { .. })));
        assert!(server.requests().is_empty());
    }

    #[test]
    fn type_change_requires_replacement() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let state = reconcile::create(&ctx, &plan()).unwrap();
        let next = ConfigRecord::new("mirror").with_id("full-name");
        let err = reconcile::update(&ctx, &next, &state).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ReplacementRequired { field: "type", ref from, ref to }
                if from == "constructed" && to == "mirror"
        ));
        assert_eq!(server.requests(), vec!["create"]);
    }

    #[test]
    fn id_change_requires_replacement() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let state = reconcile::create(&ctx, &plan()).unwrap();
        let err = reconcile::update(&ctx, &plan().with_id("other"), &state).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ReplacementRequired { field: "id", ref from, ref to }
                if from == "full-name" && to == "other"
        ));
        assert_eq!(server.requests(), vec!["create"]);
        assert!(server.objects.borrow().contains_key("full-name"));
    }

    #[test]
    fn unknown_choice_sends_nothing() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let plan = plan().with("conflict_behavior", "galaxy");
        let err = reconcile::create(&ctx, &plan).unwrap_err();

        let ReconcileError::Validate(ValidateError::Invalid { errors }) = &err else {
            panic!("expected a validation error, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "conflict_behavior");
        assert!(matches!(
            errors[0].violation,
            Violation::UnknownEnumValue { ref value, .. } if value == "galaxy"
        ));
        assert!(server.requests().is_empty());
    }

    #[test]
    fn scalar_on_set_field_never_clears_it() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let state = reconcile::create(&ctx, &plan()).unwrap();
        let next = plan().with("base_dn", "ou=people,dc=example,dc=com");
        let err = reconcile::update(&ctx, &next, &state).unwrap_err();

        assert!(matches!(err, ReconcileError::Validate(ValidateError::Invalid { .. })));
        assert_eq!(server.requests(), vec!["create"]);
        assert!(build_operations(&next, &state, &server.schema).is_empty());
        assert_eq!(
            server.objects.borrow()["full-name"].get("base_dn"),
            &FieldValue::strings(["ou=people,dc=example,dc=com"])
        );
    }

    #[test]
    fn missing_id_is_reported() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        let err = reconcile::read(&ctx, &ConfigRecord::new("mirror")).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingId));
    }

    #[test]
    fn duplicate_create_surfaces_transport_error() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options);

        reconcile::create(&ctx, &plan()).unwrap();
        let err = reconcile::create(&ctx, &plan()).unwrap_err();
        assert!(matches!(err, ReconcileError::Transport(ServerError::Exists(_))));
        assert!(err.to_string().contains("already exists"));
    }
}

mod adopted {
    use super::*;

    fn existing() -> ConfigRecord {
        ConfigRecord::new("entry-dn")
            .with_id("entryDN")
            .with("enabled", true)
            .with("conflict_behavior", "virtual-overrides-real")
    }

    #[test]
    fn create_patches_existing_object() {
        let server = FakeServer::new().with_object(existing());
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options).mode(Mode::Adopted);

        let plan = ConfigRecord::new("entry-dn")
            .with_id("entryDN")
            .with("conflict_behavior", "real-overrides-virtual");
        let state = reconcile::create(&ctx, &plan).unwrap();

        assert_eq!(
            state.get("conflict_behavior"),
            &FieldValue::string("real-overrides-virtual")
        );
        assert_eq!(server.requests(), vec!["get", "update"]);
        assert_eq!(
            server.patches.borrow()[0],
            vec![PatchOperation::replace(
                "conflict_behavior",
                dsconfig_reconcile::PatchValue::One(Scalar::from("real-overrides-virtual"))
            )]
        );
    }

    #[test]
    fn create_without_changes_only_reads() {
        let server = FakeServer::new().with_object(existing());
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options).mode(Mode::Adopted);

        let plan = ConfigRecord::new("entry-dn").with_id("entryDN").with("enabled", true);
        reconcile::create(&ctx, &plan).unwrap();

        assert_eq!(server.requests(), vec!["get"]);
    }

    #[test]
    fn create_requires_id() {
        let server = FakeServer::new();
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options).mode(Mode::Adopted);

        let err = reconcile::create(&ctx, &ConfigRecord::new("entry-dn")).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingId));
    }

    #[test]
    fn delete_leaves_object_in_place() {
        let server = FakeServer::new().with_object(existing());
        let options = NormalizeOptions::new();
        let ctx = Context::new(&server, &server.schema, &options).mode(Mode::Adopted);

        reconcile::delete(&ctx, &existing()).unwrap();

        assert!(server.objects.borrow().contains_key("entryDN"));
        assert!(server.requests().is_empty());
    }

    #[test]
    fn read_without_collapse_keeps_server_zero_values() {
        let server = FakeServer::new().with_object(existing());
        let options = NormalizeOptions::new().collapse(CollapsePolicy::Never);
        let ctx = Context::new(&server, &server.schema, &options);

        let state = reconcile::read(&ctx, &existing()).unwrap();
        assert_eq!(state.get("description"), &FieldValue::string(""));
    }
}
