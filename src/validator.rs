//! Pre-flight validation of records against a subtype schema table.

use serde_json::Value;

use crate::error::{RecordError, SchemaError, ValidateError, ValidationError, Violation};
use crate::record::ConfigRecord;
use crate::table::SubtypeSchema;

/// Validate a record against its subtype schema.
///
/// Every populated field must be legal for the record's declared type and
/// hold a value of the field's kind; choice values must come from the
/// field's value set. All violations are collected and returned together.
///
/// # Errors
///
/// Returns `ValidateError::Record` if the record's type is not in the table,
/// or `ValidateError::Invalid` listing every rejected field.
pub fn validate(record: &ConfigRecord, schema: &SubtypeSchema) -> Result<(), ValidateError> {
    schema.decode_type(&record.subtype)?;

    let errors = collect_violations(record, schema);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

/// Every field of `record` that is populated but not legal for its type, or
/// whose value doesn't fit the field.
pub fn collect_violations(record: &ConfigRecord, schema: &SubtypeSchema) -> Vec<ValidationError> {
    record
        .present_fields()
        .filter_map(|(name, value)| {
            let violation = match schema.field(name) {
                Some(spec) if spec.allows(&record.subtype) => spec.check_value(value).err()?,
                Some(spec) => Violation::NotSupported {
                    allowed_types: spec.types.clone(),
                },
                None => Violation::NotSupported {
                    allowed_types: Vec::new(),
                },
            };
            Some(ValidationError {
                field: name.to_string(),
                declared_type: record.subtype.clone(),
                violation,
            })
        })
        .collect()
}

/// Check the shape of a record document against the table's document schema.
///
/// Use this when you only need the structural check; decoding with
/// [`ConfigRecord::from_document`] runs it too.
pub fn check_document(doc: &Value, schema: &SubtypeSchema) -> Result<(), RecordError> {
    let document_schema = schema.document_schema();
    let validator = jsonschema::validator_for(&document_schema).map_err(|e| {
        RecordError::InvalidDocument {
            errors: vec![SchemaError {
                path: String::new(),
                message: e.to_string(),
            }],
        }
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(doc)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RecordError::InvalidDocument { errors })
    }
}
