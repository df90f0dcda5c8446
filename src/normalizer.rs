//! Turning one-of-many wire responses back into records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::record::ConfigRecord;
use crate::table::SubtypeSchema;
use crate::value::{json_type_name, FieldValue};

/// Envelope returned by create, read and update calls.
///
/// Maps payload member names (e.g. `MirrorPayload`) to payload objects.
/// Exactly one member is expected to be populated; `null` members are not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantResponse {
    members: Map<String, Value>,
}

impl VariantResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, member: impl Into<String>, payload: Value) -> Self {
        self.members.insert(member.into(), payload);
        self
    }

    /// Names of the members that carry a payload.
    pub fn populated(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|(_, payload)| !payload.is_null())
            .map(|(member, _)| member.as_str())
            .collect()
    }

    pub fn member(&self, member: &str) -> Option<&Value> {
        self.members.get(member)
    }

    /// The response a server would send back for `record`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::UnknownEnumValue` if the record's type is not in the table.
    pub fn from_record(record: &ConfigRecord, schema: &SubtypeSchema) -> Result<Self, RecordError> {
        let subtype = schema.decode_type(&record.subtype)?;

        let mut payload = Map::new();
        if let Some(id) = &record.id {
            payload.insert("id".to_string(), Value::String(id.clone()));
        }
        for spec in schema.fields_for(&subtype.tag) {
            if let Some(json) = record.get(&spec.name).to_json() {
                payload.insert(spec.wire_name().into_owned(), json);
            }
        }

        Ok(Self::new().with_member(subtype.payload_member(), Value::Object(payload)))
    }
}

/// When a zero value from the server is read back as an absent field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollapsePolicy {
    /// Collapse only when the expected record had the field empty or absent.
    #[default]
    ExpectedHint,
    /// Keep whatever the server returned. Used by read-only lookups, which
    /// have no expected record worth trusting.
    Never,
}

/// Options for [`normalize_with`].
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub collapse: CollapsePolicy,
}

impl NormalizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collapse policy.
    pub fn collapse(mut self, collapse: CollapsePolicy) -> Self {
        self.collapse = collapse;
        self
    }
}

/// Normalize a response using the default options.
///
/// # Errors
///
/// See [`normalize_with`].
pub fn normalize(
    response: &VariantResponse,
    expected: &ConfigRecord,
    schema: &SubtypeSchema,
) -> Result<ConfigRecord, RecordError> {
    normalize_with(response, expected, schema, &NormalizeOptions::default())
}

/// Copy the single populated payload of `response` into a unified record.
///
/// The record's type comes from the payload member. Only fields legal for
/// that type are read. For single-valued fields the server's zero value
/// (missing, `null` or `""`) becomes an absent field when the collapse
/// policy allows it and `expected` had the field empty too; otherwise it is
/// kept literally. Collection fields are always materialized.
///
/// # Errors
///
/// Returns `RecordError::MalformedVariantResponse` unless exactly one member
/// is populated, `RecordError::UnknownEnumValue` for unknown members or
/// choice values, and `RecordError::KindMismatch` for mistyped payload values.
pub fn normalize_with(
    response: &VariantResponse,
    expected: &ConfigRecord,
    schema: &SubtypeSchema,
    options: &NormalizeOptions,
) -> Result<ConfigRecord, RecordError> {
    let populated = response.populated();
    let [member] = populated.as_slice() else {
        return Err(RecordError::MalformedVariantResponse {
            populated: populated.iter().map(|m| m.to_string()).collect(),
        });
    };

    let subtype = schema.decode_payload_member(member)?;
    tracing::trace!(member = *member, subtype = %subtype.tag, "normalizing variant response");

    let payload = match response.member(member) {
        Some(Value::Object(payload)) => payload,
        other => {
            return Err(RecordError::KindMismatch {
                field: member.to_string(),
                expected: "object".to_string(),
                actual: other.map_or("nothing", json_type_name).to_string(),
            })
        }
    };

    let mut record = ConfigRecord::new(subtype.tag.clone());
    record.id = match payload.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        _ => expected.id.clone(),
    };

    for spec in schema.fields_for(&subtype.tag) {
        let wire_name = spec.wire_name();
        let raw = payload.get(wire_name.as_ref()).filter(|v| !v.is_null());

        let value = if spec.is_collection() {
            let members = match raw {
                Some(raw) => spec.decode_members(raw)?,
                None => Vec::new(),
            };
            FieldValue::Values(members)
        } else {
            let literal = match raw {
                Some(raw) => FieldValue::Scalar(spec.decode_scalar(raw)?),
                None => FieldValue::Null,
            };
            collapse(literal, expected.get(&spec.name), options.collapse)
        };
        record.set(&spec.name, value);
    }

    Ok(record)
}

fn collapse(literal: FieldValue, expected: &FieldValue, policy: CollapsePolicy) -> FieldValue {
    let zero = match &literal {
        FieldValue::Null => true,
        FieldValue::Scalar(s) => s.is_empty_string(),
        _ => false,
    };
    match policy {
        CollapsePolicy::ExpectedHint if zero && expected.is_empty() => FieldValue::Absent,
        _ => literal,
    }
}
