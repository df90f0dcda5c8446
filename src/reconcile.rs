//! Create/read/update/delete rounds against a server.
//!
//! The server is reached through a [`Transport`] passed in with every call;
//! nothing here keeps a client or any other state between calls. The caller
//! persists the record each round returns and hands it back as the next
//! round's state.

use serde_json::{Map, Value};

use crate::diff::{build_operations, create_body, replacement, Replacement};
use crate::error::ReconcileError;
use crate::normalizer::{normalize_with, NormalizeOptions, VariantResponse};
use crate::patch::PatchOperation;
use crate::record::ConfigRecord;
use crate::table::SubtypeSchema;
use crate::validator::validate;

/// Capability to talk to the directory server's configuration API.
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn create(&self, body: &Map<String, Value>) -> Result<VariantResponse, Self::Error>;
    fn get(&self, id: &str) -> Result<VariantResponse, Self::Error>;
    fn update(
        &self,
        id: &str,
        operations: &[PatchOperation],
    ) -> Result<VariantResponse, Self::Error>;
    fn delete(&self, id: &str) -> Result<(), Self::Error>;
}

/// How an object comes under management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Created and deleted by us.
    #[default]
    Editable,
    /// Already exists on the server: "create" reads it and patches it to
    /// match the plan, and "delete" leaves it in place.
    Adopted,
}

/// Everything one call needs, passed explicitly.
pub struct Context<'a, T> {
    pub transport: &'a T,
    pub schema: &'a SubtypeSchema,
    pub mode: Mode,
    pub normalize: &'a NormalizeOptions,
}

impl<'a, T: Transport> Context<'a, T> {
    pub fn new(
        transport: &'a T,
        schema: &'a SubtypeSchema,
        normalize: &'a NormalizeOptions,
    ) -> Self {
        Self {
            transport,
            schema,
            mode: Mode::Editable,
            normalize,
        }
    }

    /// Set the management mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    fn read_back(
        &self,
        response: &VariantResponse,
        expected: &ConfigRecord,
    ) -> Result<ConfigRecord, ReconcileError<T::Error>> {
        Ok(normalize_with(response, expected, self.schema, self.normalize)?)
    }
}

/// Bring `plan` into existence and return the observed record.
///
/// # Errors
///
/// Validation errors are returned before any request is sent.
pub fn create<T: Transport>(
    ctx: &Context<'_, T>,
    plan: &ConfigRecord,
) -> Result<ConfigRecord, ReconcileError<T::Error>> {
    validate(plan, ctx.schema)?;

    match ctx.mode {
        Mode::Editable => {
            tracing::debug!(subtype = %plan.subtype, "creating object");
            let response = ctx
                .transport
                .create(&create_body(plan, ctx.schema))
                .map_err(ReconcileError::Transport)?;
            ctx.read_back(&response, plan)
        }
        Mode::Adopted => {
            let id = plan.id.as_deref().ok_or(ReconcileError::MissingId)?;
            tracing::debug!(id, "adopting existing object");
            let response = ctx.transport.get(id).map_err(ReconcileError::Transport)?;
            let state = ctx.read_back(&response, plan)?;
            apply_plan(ctx, id, plan, state)
        }
    }
}

/// Refresh `state` from the server.
pub fn read<T: Transport>(
    ctx: &Context<'_, T>,
    state: &ConfigRecord,
) -> Result<ConfigRecord, ReconcileError<T::Error>> {
    let id = state.id.as_deref().ok_or(ReconcileError::MissingId)?;
    let response = ctx.transport.get(id).map_err(ReconcileError::Transport)?;
    ctx.read_back(&response, state)
}

/// Patch the object so it matches `plan`.
///
/// No request is sent when nothing changed.
///
/// # Errors
///
/// Returns `ReconcileError::ReplacementRequired` when the plan changes the
/// type or the id; the caller must delete and recreate instead.
pub fn update<T: Transport>(
    ctx: &Context<'_, T>,
    plan: &ConfigRecord,
    state: &ConfigRecord,
) -> Result<ConfigRecord, ReconcileError<T::Error>> {
    if let Some(Replacement { field, from, to }) = replacement(plan, state) {
        return Err(ReconcileError::ReplacementRequired { field, from, to });
    }
    validate(plan, ctx.schema)?;

    let id = state
        .id
        .as_deref()
        .or(plan.id.as_deref())
        .ok_or(ReconcileError::MissingId)?;
    apply_plan(ctx, id, plan, state.clone())
}

/// Remove the object. Adopted objects are left on the server.
pub fn delete<T: Transport>(
    ctx: &Context<'_, T>,
    state: &ConfigRecord,
) -> Result<(), ReconcileError<T::Error>> {
    if ctx.mode == Mode::Adopted {
        tracing::debug!(id = ?state.id, "leaving adopted object in place");
        return Ok(());
    }
    let id = state.id.as_deref().ok_or(ReconcileError::MissingId)?;
    ctx.transport.delete(id).map_err(ReconcileError::Transport)
}

fn apply_plan<T: Transport>(
    ctx: &Context<'_, T>,
    id: &str,
    plan: &ConfigRecord,
    state: ConfigRecord,
) -> Result<ConfigRecord, ReconcileError<T::Error>> {
    let operations = build_operations(plan, &state, ctx.schema);
    if operations.is_empty() {
        return Ok(state);
    }

    tracing::debug!(id, operations = operations.len(), "updating object");
    let response = ctx
        .transport
        .update(id, &operations)
        .map_err(ReconcileError::Transport)?;
    ctx.read_back(&response, plan)
}
