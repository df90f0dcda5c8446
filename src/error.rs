//! Error types for record decoding, validation, normalization and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning documents or wire responses into records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unknown value \"{value}\" for {field}: expected one of [{}]", allowed.join(", "))]
    UnknownEnumValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error(
        "malformed variant response: expected exactly one populated payload, found {} [{}]",
        populated.len(),
        populated.join(", ")
    )]
    MalformedVariantResponse { populated: Vec<String> },

    #[error("invalid value for {field}: expected {expected}, got {actual}")]
    KindMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("record has no type")]
    MissingType,

    #[error("invalid record document with {} error(s)", errors.len())]
    InvalidDocument { errors: Vec<SchemaError> },
}

impl RecordError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RecordError::MalformedVariantResponse { .. } => 2, // Protocol violation
            _ => 1,                                             // Bad input record
        }
    }
}

/// Structural problem in a record document, with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A populated field the record's type cannot accept.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationError {
    pub field: String,
    /// The record's declared type.
    pub declared_type: String,
    #[serde(flatten)]
    pub violation: Violation,
}

/// What is wrong with a populated field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Violation {
    /// The field is not legal for the declared type. Empty when the table
    /// has no such field at all.
    NotSupported { allowed_types: Vec<String> },
    /// The value's shape or scalar kind doesn't match the field.
    KindMismatch { expected: String, actual: String },
    /// A choice value outside the field's value set.
    UnknownEnumValue { value: String, allowed: Vec<String> },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.violation {
            Violation::NotSupported { allowed_types } if allowed_types.is_empty() => {
                write!(f, "{} is not defined for any type", self.field)
            }
            Violation::NotSupported { allowed_types } => write!(
                f,
                "{} not supported for type '{}'; allowed types: [{}]",
                self.field,
                self.declared_type,
                allowed_types.join(", ")
            ),
            Violation::KindMismatch { expected, actual } => write!(
                f,
                "invalid value for {}: expected {}, got {}",
                self.field, expected, actual
            ),
            Violation::UnknownEnumValue { value, allowed } => write!(
                f,
                "unknown value \"{}\" for {}: expected one of [{}]",
                value,
                self.field,
                allowed.join(", ")
            ),
        }
    }
}

/// Errors during subtype validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Record(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Inconsistencies in a subtype schema table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid table document: {source}")]
    InvalidDocument {
        #[source]
        source: serde_json::Error,
    },

    #[error("table declares no types")]
    NoTypes,

    #[error("type '{tag}' is declared more than once")]
    DuplicateType { tag: String },

    #[error("payload member '{member}' is used by more than one type")]
    DuplicatePayload { member: String },

    #[error("field '{field}' is declared more than once")]
    DuplicateField { field: String },

    #[error("field name '{field}' is reserved")]
    ReservedField { field: String },

    #[error("field '{field}' is not legal for any type")]
    NoAllowedTypes { field: String },

    #[error("field '{field}' references unknown type '{tag}'")]
    UnknownType { field: String, tag: String },

    #[error("choice field '{field}' declares no values")]
    EmptyChoice { field: String },

    #[error("field '{field}' uses reserved wire name '{wire_name}'")]
    ReservedWireName { field: String, wire_name: String },

    #[error("field '{field}' reuses wire name '{wire_name}'")]
    DuplicateWireName { field: String, wire_name: String },
}

/// Errors loading documents from files or URLs.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors from a create/read/update/delete round against a transport.
#[derive(Debug, Error)]
pub enum ReconcileError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("transport error: {0}")]
    Transport(#[source] E),

    #[error("changing {field} from '{from}' to '{to}' requires replacing the object")]
    ReplacementRequired {
        field: &'static str,
        from: String,
        to: String,
    },

    #[error("record has no id")]
    MissingId,
}
