//! Patch operations sent to the server.

use serde::{Deserialize, Serialize};

use crate::record::ConfigRecord;
use crate::value::{FieldValue, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Add,
    Replace,
    Remove,
}

/// Payload of an operation: one scalar or a list of collection members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
    One(Scalar),
    Many(Vec<Scalar>),
}

/// A single Add/Replace/Remove instruction targeting one field.
///
/// `Add` and `Remove` on a set field carry the members they touch;
/// `Remove` without a value clears the whole field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: OpKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PatchValue>,
}

impl PatchOperation {
    pub fn replace(path: &str, value: PatchValue) -> Self {
        Self {
            op: OpKind::Replace,
            path: path.to_string(),
            value: Some(value),
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: OpKind::Remove,
            path: path.to_string(),
            value: None,
        }
    }

    pub fn add_members(path: &str, members: Vec<Scalar>) -> Self {
        Self {
            op: OpKind::Add,
            path: path.to_string(),
            value: Some(PatchValue::Many(members)),
        }
    }

    pub fn remove_members(path: &str, members: Vec<Scalar>) -> Self {
        Self {
            op: OpKind::Remove,
            path: path.to_string(),
            value: Some(PatchValue::Many(members)),
        }
    }

    /// Apply this operation to `record` the way the server would.
    pub fn apply(&self, record: &mut ConfigRecord) {
        let current = record.get(&self.path).clone();
        let next = match (self.op, &self.value) {
            (OpKind::Replace, Some(PatchValue::One(s))) => FieldValue::Scalar(s.clone()),
            (OpKind::Replace, Some(PatchValue::Many(v))) => FieldValue::Values(v.clone()),
            (OpKind::Remove, None) | (OpKind::Replace, None) => FieldValue::Absent,
            (OpKind::Add, Some(PatchValue::Many(members))) => {
                let mut values = current.values().to_vec();
                for member in members {
                    if !values.contains(member) {
                        values.push(member.clone());
                    }
                }
                FieldValue::Values(values)
            }
            (OpKind::Add, Some(PatchValue::One(member))) => {
                let mut values = current.values().to_vec();
                if !values.contains(member) {
                    values.push(member.clone());
                }
                FieldValue::Values(values)
            }
            (OpKind::Remove, Some(value)) => {
                let drop: &[Scalar] = match value {
                    PatchValue::One(member) => std::slice::from_ref(member),
                    PatchValue::Many(members) => members,
                };
                let values: Vec<Scalar> = current
                    .values()
                    .iter()
                    .filter(|m| !drop.contains(m))
                    .cloned()
                    .collect();
                if values.is_empty() {
                    FieldValue::Absent
                } else {
                    FieldValue::Values(values)
                }
            }
            (OpKind::Add, None) => current,
        };
        record.set(&self.path, next);
    }
}

/// Apply operations in order.
pub fn apply_operations(record: &mut ConfigRecord, operations: &[PatchOperation]) {
    for operation in operations {
        operation.apply(record);
    }
}
