//! Directory-server configuration reconciliation
//!
//! Compares a desired configuration record (the plan) against the last-known
//! live record (the state) and produces the patch operations needed to bring
//! the live object in line. Records are discriminated by a `type` tag; a
//! static [`SubtypeSchema`] table says which fields are legal for which tag.
//!
//! # Example
//!
//! ```
//! use dsconfig_reconcile::{
//!     build_operations, validate, ConfigRecord, FieldValue, PatchOperation, Scalar,
//!     SubtypeSchema,
//! };
//!
//! let schema = SubtypeSchema::virtual_attribute();
//!
//! let plan = ConfigRecord::new("user-defined").with("value", FieldValue::strings(["a", "b"]));
//! let state = ConfigRecord::new("user-defined").with("value", FieldValue::strings(["a"]));
//!
//! validate(&plan, &schema).unwrap();
//! let operations = build_operations(&plan, &state, &schema);
//!
//! assert_eq!(
//!     operations,
//!     vec![PatchOperation::add_members("value", vec![Scalar::from("b")])]
//! );
//! ```
//!
//! # Diff Rules
//!
//! | Plan value | Single / list field | Set field |
//! |------------|---------------------|-----------|
//! | absent | nothing | nothing |
//! | null, `""`, or empty | `remove` if state has a value | `remove` every state member |
//! | equal to state | nothing | nothing (order ignored) |
//! | different | `replace` with plan value | `add` missing, then `remove` extra |
//!
//! # Entry Points
//!
//! - [`validate`] rejects fields that are not legal for a record's type,
//!   listing every violation and the types each field is legal for.
//! - [`build_operations`] produces the ordered patch.
//! - [`normalize`] reads a one-of-many [`VariantResponse`] back into a record.

mod diff;
mod enums;
mod error;
mod loader;
mod normalizer;
mod patch;
pub mod reconcile;
mod record;
mod table;
mod validator;
mod value;

pub use diff::{
    build_operations, create_body, diff_field, diff_set, replacement, requires_replacement,
    Replacement,
};
pub use enums::{
    decode_choice, Choice, ConflictBehavior, JoinBaseDnType, JoinScope, MergeBehavior,
    VirtualAttributeType,
};
pub use error::{
    LoadError, ReconcileError, RecordError, SchemaError, TableError, ValidateError,
    ValidationError, Violation,
};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, load_table};
pub use normalizer::{normalize, normalize_with, CollapsePolicy, NormalizeOptions, VariantResponse};
pub use patch::{apply_operations, OpKind, PatchOperation, PatchValue};
pub use record::ConfigRecord;
pub use table::{Cardinality, FieldSpec, ScalarKind, SubtypeSchema, SubtypeSpec, RESERVED_FIELDS};
pub use validator::{check_document, collect_violations, validate};
pub use value::{json_type_name, FieldValue, Scalar};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
