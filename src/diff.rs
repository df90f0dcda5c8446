//! Plan/state comparison.
//!
//! [`build_operations`] walks the table's fields in order and asks
//! [`diff_field`] or [`diff_set`] for the operations each field needs.
//! Fields the plan doesn't mention are left alone.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::patch::{PatchOperation, PatchValue};
use crate::record::ConfigRecord;
use crate::table::{Cardinality, SubtypeSchema};
use crate::value::{dedup, FieldValue, Scalar};

/// Operation needed to bring one single-valued or list field in line with the plan.
///
/// An empty plan value (null, empty string, empty list) against a non-empty
/// state removes the field; any other difference replaces it.
pub fn diff_field(field: &str, plan: &FieldValue, state: &FieldValue) -> Option<PatchOperation> {
    if plan.is_absent() {
        return None;
    }
    if plan.is_empty() {
        return (!state.is_empty()).then(|| PatchOperation::remove(field));
    }
    if plan == state {
        return None;
    }

    match plan {
        FieldValue::Scalar(s) => Some(PatchOperation::replace(field, PatchValue::One(s.clone()))),
        FieldValue::Values(v) => Some(PatchOperation::replace(field, PatchValue::Many(v.clone()))),
        FieldValue::Absent | FieldValue::Null => None,
    }
}

/// Operations needed to bring a set field in line with the plan.
///
/// Emits an `Add` with the missing members followed by a `Remove` with the
/// extra ones, skipping whichever is empty. Additions go first so a set that
/// must stay non-empty never passes through empty.
///
/// A single scalar is not a member list and yields no operations.
pub fn diff_set(field: &str, plan: &FieldValue, state: &FieldValue) -> Vec<PatchOperation> {
    if matches!(plan, FieldValue::Absent | FieldValue::Scalar(_)) {
        return Vec::new();
    }

    let planned = dedup(plan.values());
    let current = dedup(state.values());
    let planned_set: HashSet<&Scalar> = planned.iter().collect();
    let current_set: HashSet<&Scalar> = current.iter().collect();

    let to_add: Vec<Scalar> = planned
        .iter()
        .filter(|m| !current_set.contains(m))
        .cloned()
        .collect();
    let to_remove: Vec<Scalar> = current
        .iter()
        .filter(|m| !planned_set.contains(m))
        .cloned()
        .collect();

    let mut operations = Vec::new();
    if !to_add.is_empty() {
        operations.push(PatchOperation::add_members(field, to_add));
    }
    if !to_remove.is_empty() {
        operations.push(PatchOperation::remove_members(field, to_remove));
    }
    operations
}

/// Build the ordered operation list that turns `state` into `plan`.
///
/// Fields are visited in table order and results concatenated without
/// reordering, so identical inputs always yield identical output. An empty
/// result means no update is needed. Plan values shaped wrong for their field
/// (a scalar on a collection, members on a single-valued field) are skipped;
/// [`validate`](crate::validate) reports them.
pub fn build_operations(
    plan: &ConfigRecord,
    state: &ConfigRecord,
    schema: &SubtypeSchema,
) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    for spec in &schema.fields {
        let planned = plan.get(&spec.name);
        let current = state.get(&spec.name);
        let fits = match planned {
            FieldValue::Scalar(_) => !spec.is_collection(),
            FieldValue::Values(_) => spec.is_collection(),
            FieldValue::Absent | FieldValue::Null => true,
        };
        if !fits {
            tracing::debug!(field = %spec.name, "skipping plan value of the wrong shape");
            continue;
        }
        match spec.cardinality {
            Cardinality::Set => operations.extend(diff_set(&spec.name, planned, current)),
            Cardinality::Single | Cardinality::List => {
                operations.extend(diff_field(&spec.name, planned, current))
            }
        }
    }

    tracing::debug!(
        subtype = %plan.subtype,
        operations = operations.len(),
        "built patch operations"
    );
    operations
}

/// An identity change that only recreating the object can apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// `"type"` or `"id"`.
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

/// The identity change between `state` and `plan`, if any: a different type,
/// or two ids that disagree. A plan without an id keeps the state's.
pub fn replacement(plan: &ConfigRecord, state: &ConfigRecord) -> Option<Replacement> {
    if plan.subtype != state.subtype {
        return Some(Replacement {
            field: "type",
            from: state.subtype.clone(),
            to: plan.subtype.clone(),
        });
    }
    match (&state.id, &plan.id) {
        (Some(from), Some(to)) if from != to => Some(Replacement {
            field: "id",
            from: from.clone(),
            to: to.clone(),
        }),
        _ => None,
    }
}

/// True when moving from `state` to `plan` changes the type or the id,
/// which can only be done by recreating the object.
pub fn requires_replacement(plan: &ConfigRecord, state: &ConfigRecord) -> bool {
    replacement(plan, state).is_some()
}

/// Request body for creating `record`.
///
/// Only fields with a value are sent; absent and null fields, empty strings
/// and empty collections are left out. Keys are wire names.
pub fn create_body(record: &ConfigRecord, schema: &SubtypeSchema) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(id) = &record.id {
        body.insert("id".to_string(), Value::String(id.clone()));
    }
    body.insert("type".to_string(), Value::String(record.subtype.clone()));

    for spec in &schema.fields {
        let value = record.get(&spec.name);
        if value.is_empty() {
            continue;
        }
        if let Some(json) = value.to_json() {
            body.insert(spec.wire_name().into_owned(), json);
        }
    }
    body
}
