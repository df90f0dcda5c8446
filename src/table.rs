//! Subtype schema tables.
//!
//! A [`SubtypeSchema`] lists the subtype tags of one kind of configuration
//! object and, in a fixed order, every field with its value kind and the
//! tags for which it is legal. The field order is the order in which patch
//! operations are built.

use std::borrow::Cow;
use std::collections::HashSet;

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::enums::{
    decode_choice, Choice, ConflictBehavior, JoinBaseDnType, JoinScope, MergeBehavior,
    VirtualAttributeType,
};
use crate::error::{RecordError, TableError, Violation};
use crate::value::{json_type_name, FieldValue, Scalar};

/// Record keys that are not fields.
pub const RESERVED_FIELDS: &[&str] = &["id", "type"];

/// Kind of the scalars a field holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Bool,
    Int,
    /// A string restricted to a fixed set of values.
    Choice { values: Vec<String> },
}

impl ScalarKind {
    /// Choice kind built from a Rust enum.
    pub fn choice<C: Choice>() -> Self {
        ScalarKind::Choice {
            values: C::names().into_iter().map(String::from).collect(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ScalarKind::String | ScalarKind::Choice { .. } => "string",
            ScalarKind::Bool => "boolean",
            ScalarKind::Int => "integer",
        }
    }
}

/// Whether a field holds one scalar or a collection of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Single,
    /// Unordered, duplicates are not meaningful. Diffed member by member.
    Set,
    /// Ordered. Replaced as a whole.
    List,
}

/// One field of a subtype schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub scalar: ScalarKind,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Subtype tags for which the field is legal.
    pub types: Vec<String>,
    /// Key used in wire payloads; camelCase of `name` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_name: Option<String>,
}

impl FieldSpec {
    pub fn new(name: &str, scalar: ScalarKind, cardinality: Cardinality, types: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            scalar,
            cardinality,
            types: types.iter().map(|t| t.to_string()).collect(),
            wire_name: None,
        }
    }

    pub fn allows(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t == tag)
    }

    pub fn is_collection(&self) -> bool {
        self.cardinality != Cardinality::Single
    }

    pub fn wire_name(&self) -> Cow<'_, str> {
        match &self.wire_name {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(self.name.to_case(Case::Camel)),
        }
    }

    /// Human-readable kind, e.g. "string" or "set of string".
    pub fn kind_name(&self) -> String {
        match self.cardinality {
            Cardinality::Single => self.scalar.name().to_string(),
            Cardinality::Set => format!("set of {}", self.scalar.name()),
            Cardinality::List => format!("list of {}", self.scalar.name()),
        }
    }

    /// Decode one JSON scalar for this field.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::KindMismatch` when the JSON type is wrong, or
    /// `RecordError::UnknownEnumValue` for a choice outside its value set.
    pub fn decode_scalar(&self, value: &Value) -> Result<Scalar, RecordError> {
        match (&self.scalar, value) {
            (ScalarKind::String, Value::String(s)) => Ok(Scalar::String(s.clone())),
            // An empty choice means "not set" and is left for the caller to collapse.
            (ScalarKind::Choice { .. }, Value::String(s)) if s.is_empty() => {
                Ok(Scalar::String(String::new()))
            }
            (ScalarKind::Choice { values }, Value::String(s)) => {
                decode_choice(&self.name, s, values).map(|_| Scalar::String(s.clone()))
            }
            (ScalarKind::Bool, Value::Bool(b)) => Ok(Scalar::Bool(*b)),
            (ScalarKind::Int, Value::Number(n)) if n.is_i64() => n
                .as_i64()
                .map(Scalar::Int)
                .ok_or_else(|| self.mismatch(value)),
            _ => Err(self.mismatch(value)),
        }
    }

    /// Decode the members of a JSON array for this collection field.
    /// Set members are deduplicated.
    pub fn decode_members(&self, value: &Value) -> Result<Vec<Scalar>, RecordError> {
        let Value::Array(items) = value else {
            return Err(self.mismatch(value));
        };
        let members = items
            .iter()
            .map(|item| self.decode_scalar(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match self.cardinality {
            Cardinality::Set => crate::value::dedup(&members),
            _ => members,
        })
    }

    /// Check a value built in code against this field's kind.
    ///
    /// Null is accepted for every field. Single-valued fields need a scalar
    /// and collection fields need members, each of the field's scalar kind;
    /// choice values must come from the field's value set.
    ///
    /// # Errors
    ///
    /// Returns the first problem found with the value.
    pub fn check_value(&self, value: &FieldValue) -> Result<(), Violation> {
        let Some(json) = value.to_json().filter(|json| !json.is_null()) else {
            return Ok(());
        };
        let decoded = if self.is_collection() {
            self.decode_members(&json).map(drop)
        } else {
            self.decode_scalar(&json).map(drop)
        };
        decoded.map_err(|e| match e {
            RecordError::UnknownEnumValue { value, allowed, .. } => {
                Violation::UnknownEnumValue { value, allowed }
            }
            RecordError::KindMismatch {
                expected, actual, ..
            } => Violation::KindMismatch { expected, actual },
            other => Violation::KindMismatch {
                expected: self.kind_name(),
                actual: other.to_string(),
            },
        })
    }

    fn mismatch(&self, value: &Value) -> RecordError {
        RecordError::KindMismatch {
            field: self.name.clone(),
            expected: self.kind_name(),
            actual: json_type_name(value).to_string(),
        }
    }

    fn json_schema(&self) -> Value {
        let scalar = self.scalar.name();
        match self.cardinality {
            Cardinality::Single => json!({ "type": [scalar, "null"] }),
            Cardinality::Set | Cardinality::List => json!({
                "type": ["array", "null"],
                "items": { "type": scalar }
            }),
        }
    }
}

/// One subtype tag and the payload member that carries it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeSpec {
    pub tag: String,
    /// Variant response member name; PascalCase of the tag plus "Payload" when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl SubtypeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            payload: None,
        }
    }

    pub fn payload_member(&self) -> Cow<'_, str> {
        match &self.payload {
            Some(member) => Cow::Borrowed(member),
            None => Cow::Owned(format!("{}Payload", self.tag.to_case(Case::Pascal))),
        }
    }
}

/// Static description of one discriminated configuration object kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeSchema {
    pub name: String,
    pub subtypes: Vec<SubtypeSpec>,
    /// Fields in the order patch operations are emitted.
    pub fields: Vec<FieldSpec>,
}

impl SubtypeSchema {
    /// Build a table and check it for consistency.
    ///
    /// # Errors
    ///
    /// Returns `TableError` describing the first inconsistency found.
    pub fn new(
        name: impl Into<String>,
        subtypes: Vec<SubtypeSpec>,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, TableError> {
        let schema = Self {
            name: name.into(),
            subtypes,
            fields,
        };
        schema.check()?;
        Ok(schema)
    }

    /// Parse a table from its JSON document form (as produced by serializing one).
    ///
    /// # Errors
    ///
    /// Returns `TableError::InvalidDocument` if the shape is wrong, or any
    /// consistency error from [`SubtypeSchema::check`].
    pub fn from_document(doc: &Value) -> Result<Self, TableError> {
        let schema: SubtypeSchema = serde_json::from_value(doc.clone())
            .map_err(|source| TableError::InvalidDocument { source })?;
        schema.check()?;
        Ok(schema)
    }

    /// Verify that the table is internally consistent.
    pub fn check(&self) -> Result<(), TableError> {
        if self.subtypes.is_empty() {
            return Err(TableError::NoTypes);
        }

        let mut tags = HashSet::new();
        let mut members = HashSet::new();
        for subtype in &self.subtypes {
            if !tags.insert(subtype.tag.as_str()) {
                return Err(TableError::DuplicateType {
                    tag: subtype.tag.clone(),
                });
            }
            let member = subtype.payload_member().into_owned();
            if !members.insert(member.clone()) {
                return Err(TableError::DuplicatePayload { member });
            }
        }

        let mut names = HashSet::new();
        let mut wire_names = HashSet::new();
        for field in &self.fields {
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(TableError::ReservedField {
                    field: field.name.clone(),
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(TableError::DuplicateField {
                    field: field.name.clone(),
                });
            }
            let wire_name = field.wire_name().into_owned();
            if RESERVED_FIELDS.contains(&wire_name.as_str()) {
                return Err(TableError::ReservedWireName {
                    field: field.name.clone(),
                    wire_name,
                });
            }
            if !wire_names.insert(wire_name.clone()) {
                return Err(TableError::DuplicateWireName {
                    field: field.name.clone(),
                    wire_name,
                });
            }
            if field.types.is_empty() {
                return Err(TableError::NoAllowedTypes {
                    field: field.name.clone(),
                });
            }
            if let Some(tag) = field.types.iter().find(|t| !tags.contains(t.as_str())) {
                return Err(TableError::UnknownType {
                    field: field.name.clone(),
                    tag: tag.clone(),
                });
            }
            if matches!(&field.scalar, ScalarKind::Choice { values } if values.is_empty()) {
                return Err(TableError::EmptyChoice {
                    field: field.name.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn subtype_tags(&self) -> Vec<&str> {
        self.subtypes.iter().map(|s| s.tag.as_str()).collect()
    }

    /// Look up the subtype for a record's `type` value.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::UnknownEnumValue` for tags not in the table.
    pub fn decode_type(&self, tag: &str) -> Result<&SubtypeSpec, RecordError> {
        decode_choice("type", tag, &self.subtype_tags()).map(|index| &self.subtypes[index])
    }

    /// Look up the subtype carried by a variant response member.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::UnknownEnumValue` for members not in the table.
    pub fn decode_payload_member(&self, member: &str) -> Result<&SubtypeSpec, RecordError> {
        let members: Vec<Cow<'_, str>> =
            self.subtypes.iter().map(SubtypeSpec::payload_member).collect();
        decode_choice("payload", member, &members).map(|index| &self.subtypes[index])
    }

    /// Fields legal for `tag`, in table order.
    pub fn fields_for<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a FieldSpec> + 'a {
        self.fields.iter().filter(move |f| f.allows(tag))
    }

    /// JSON Schema describing the document form of a record of this kind.
    ///
    /// Only shapes are described; type tags and choice values are checked
    /// by the enum decoder so they surface as `UnknownEnumValue`.
    pub fn document_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert("id".to_string(), json!({ "type": "string" }));
        properties.insert("type".to_string(), json!({ "type": "string" }));
        for field in &self.fields {
            properties.insert(field.name.clone(), field.json_schema());
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["type"],
            "additionalProperties": false
        })
    }

    /// The built-in table for virtual attributes.
    pub fn virtual_attribute() -> Self {
        use Cardinality::{List, Set, Single};
        use ScalarKind::{Bool, Int, String as Str};
        use VirtualAttributeType as T;

        let all: Vec<&str> = T::names();
        let joins = &[
            T::DnJoin.as_str(),
            T::ReverseDnJoin.as_str(),
            T::EqualityJoin.as_str(),
        ];
        let dn_joins = &[T::DnJoin.as_str(), T::ReverseDnJoin.as_str()];
        let equality = &[T::EqualityJoin.as_str()];
        let mirror = &[T::Mirror.as_str()];
        let indexable = &[
            T::Constructed.as_str(),
            T::Mirror.as_str(),
            T::UserDefined.as_str(),
            T::EqualityJoin.as_str(),
            T::DnJoin.as_str(),
            T::ReverseDnJoin.as_str(),
        ];

        let fields = vec![
            FieldSpec::new("description", Str, Single, &all),
            FieldSpec::new("enabled", Bool, Single, &all),
            FieldSpec::new("attribute_type", Str, Single, &all),
            FieldSpec::new("value", Str, Set, &[T::UserDefined.as_str()]),
            FieldSpec::new("source_attribute", Str, Single, mirror),
            FieldSpec::new("source_entry_dn_attribute", Str, Single, mirror),
            FieldSpec::new("source_entry_dn_map", Str, Single, mirror),
            FieldSpec::new("bypass_access_control", Bool, Single, mirror),
            FieldSpec::new("value_pattern", Str, Set, &[T::Constructed.as_str()]),
            FieldSpec::new("join_dn_attribute", Str, Single, dn_joins),
            FieldSpec::new("join_source_attribute", Str, Single, equality),
            FieldSpec::new("join_target_attribute", Str, Single, equality),
            FieldSpec::new("join_match_all", Bool, Single, equality),
            FieldSpec::new(
                "join_base_dn_type",
                ScalarKind::choice::<JoinBaseDnType>(),
                Single,
                joins,
            ),
            FieldSpec::new("join_custom_base_dn", Str, Single, joins),
            FieldSpec::new(
                "join_scope",
                ScalarKind::choice::<JoinScope>(),
                Single,
                joins,
            ),
            FieldSpec::new("join_size_limit", Int, Single, joins),
            FieldSpec::new("join_filter", Str, Single, joins),
            FieldSpec::new("join_attribute", Str, Set, joins),
            FieldSpec::new(
                "direct_memberships_only",
                Bool,
                Single,
                &[T::IsMemberOf.as_str()],
            ),
            FieldSpec::new(
                "included_group_filter",
                Str,
                Single,
                &[T::IsMemberOf.as_str()],
            ),
            FieldSpec::new(
                "referenced_by_attribute",
                Str,
                Set,
                &[T::IdentifyReferences.as_str()],
            ),
            FieldSpec::new(
                "reference_search_base_dn",
                Str,
                Set,
                &[T::IdentifyReferences.as_str()],
            ),
            FieldSpec::new(
                "script_class",
                Str,
                Single,
                &[T::GroovyScripted.as_str()],
            ),
            FieldSpec::new(
                "script_argument",
                Str,
                List,
                &[T::GroovyScripted.as_str()],
            ),
            FieldSpec::new(
                "extension_class",
                Str,
                Single,
                &[T::ThirdParty.as_str()],
            ),
            FieldSpec::new(
                "extension_argument",
                Str,
                Set,
                &[T::ThirdParty.as_str()],
            ),
            FieldSpec::new(
                "excluded_attribute",
                Str,
                Set,
                &[T::EntryChecksum.as_str()],
            ),
            FieldSpec::new("allow_index_conflicts", Bool, Single, indexable),
            FieldSpec::new("base_dn", Str, Set, &all),
            FieldSpec::new("group_dn", Str, Set, &all),
            FieldSpec::new("filter", Str, Set, &all),
            FieldSpec::new("client_connection_policy", Str, Set, &all),
            FieldSpec::new(
                "conflict_behavior",
                ScalarKind::choice::<ConflictBehavior>(),
                Single,
                &all,
            ),
            FieldSpec::new("require_explicit_request_by_name", Bool, Single, &all),
            FieldSpec::new(
                "multiple_virtual_attribute_evaluation_order_index",
                Int,
                Single,
                &all,
            ),
            FieldSpec::new(
                "multiple_virtual_attribute_merge_behavior",
                ScalarKind::choice::<MergeBehavior>(),
                Single,
                &all,
            ),
        ];

        Self {
            name: "virtual-attribute".to_string(),
            subtypes: all.iter().map(|tag| SubtypeSpec::new(tag)).collect(),
            fields,
        }
    }
}
