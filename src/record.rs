//! Configuration records and their JSON document form.
//!
//! In a record document a missing key is an absent field, `null` is an
//! explicit null, and a scalar or array is a value:
//!
//! ```json
//! { "id": "va1", "type": "user-defined", "description": null, "value": ["a", "b"] }
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::table::SubtypeSchema;
use crate::validator::check_document;
use crate::value::FieldValue;

static ABSENT: FieldValue = FieldValue::Absent;

/// One configuration object, desired (plan) or observed (state).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigRecord {
    /// Identity; immutable once the object exists.
    pub id: Option<String>,
    /// The `type` discriminator.
    pub subtype: String,
    fields: BTreeMap<String, FieldValue>,
}

impl ConfigRecord {
    pub fn new(subtype: impl Into<String>) -> Self {
        Self {
            id: None,
            subtype: subtype.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder form of [`ConfigRecord::set`].
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.set(field, value.into());
        self
    }

    /// Value of `field`, [`FieldValue::Absent`] when unset.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&ABSENT)
    }

    /// Set `field`; setting `Absent` removes it.
    pub fn set(&mut self, field: &str, value: FieldValue) {
        if value.is_absent() {
            self.fields.remove(field);
        } else {
            self.fields.insert(field.to_string(), value);
        }
    }

    /// Fields that are not absent, by name.
    pub fn present_fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Layer a freshly-read record over this one.
    ///
    /// Identity, type and every field present in `read` replace what is here;
    /// fields `read` doesn't mention are kept.
    pub fn overlay(&mut self, read: &ConfigRecord) {
        if read.id.is_some() {
            self.id.clone_from(&read.id);
        }
        self.subtype.clone_from(&read.subtype);
        for (name, value) in read.present_fields() {
            self.set(name, value.clone());
        }
    }

    /// Decode a record document.
    ///
    /// The document is first checked against the table's document schema,
    /// collecting every structural error; the type tag and choice values are
    /// then decoded.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidDocument` for shape errors,
    /// `RecordError::UnknownEnumValue` for bad tags or choice values.
    pub fn from_document(doc: &Value, schema: &SubtypeSchema) -> Result<Self, RecordError> {
        check_document(doc, schema)?;

        let obj = doc.as_object().ok_or(RecordError::MissingType)?;
        let tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingType)?;
        let subtype = schema.decode_type(tag)?;

        let mut record = ConfigRecord::new(subtype.tag.clone());
        record.id = obj.get("id").and_then(Value::as_str).map(String::from);

        for spec in &schema.fields {
            let Some(raw) = obj.get(&spec.name) else {
                continue;
            };
            let value = match raw {
                Value::Null => FieldValue::Null,
                raw if spec.is_collection() => FieldValue::Values(spec.decode_members(raw)?),
                raw => FieldValue::Scalar(spec.decode_scalar(raw)?),
            };
            record.set(&spec.name, value);
        }

        Ok(record)
    }

    /// Encode as a record document. Absent fields are omitted.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::new();
        if let Some(id) = &self.id {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        obj.insert("type".to_string(), Value::String(self.subtype.clone()));
        for (name, value) in self.present_fields() {
            if let Some(json) = value.to_json() {
                obj.insert(name.to_string(), json);
            }
        }
        Value::Object(obj)
    }
}
