//! Typed persistence operations and their results.
//!
//! Every CRUD call the application makes against a tenant-owned entity is one
//! of the [`Operation`] variants below. Tenant values travel in the typed
//! slots of [`Payload`] and [`Filter`], never only inside an untyped map.

use std::future::Future;
use std::pin::Pin;

use tenantscope_core::{Filter, Payload};

use crate::scope::IsolationError;
use crate::storage::Row;

/// Boxed future returned by every layer of the operation pipeline.
pub type OperationFuture =
    Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

/// Shape of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    First,
    Many { limit: Option<usize> },
    Count,
}

/// Shape of a modification.
#[derive(Debug, Clone, PartialEq)]
pub enum ModifyKind {
    Update { changes: Payload },
    Delete,
}

/// A persistence call, before or after tenant scoping.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        entity: String,
        payload: Payload,
    },
    CreateMany {
        entity: String,
        payloads: Vec<Payload>,
    },
    /// Update the first row matching `filter` with `update`, else insert `create`.
    Upsert {
        entity: String,
        filter: Filter,
        create: Payload,
        update: Payload,
    },
    Read {
        entity: String,
        filter: Filter,
        kind: ReadKind,
    },
    Modify {
        entity: String,
        filter: Filter,
        kind: ModifyKind,
    },
}

impl Operation {
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            Self::Create { entity, .. }
            | Self::CreateMany { entity, .. }
            | Self::Upsert { entity, .. }
            | Self::Read { entity, .. }
            | Self::Modify { entity, .. } => entity,
        }
    }

    /// Stable label used in spans and metrics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::CreateMany { .. } => "create_many",
            Self::Upsert { .. } => "upsert",
            Self::Read { kind, .. } => match kind {
                ReadKind::First => "find_first",
                ReadKind::Many { .. } => "find_many",
                ReadKind::Count => "count",
            },
            Self::Modify { kind, .. } => match kind {
                ModifyKind::Update { .. } => "update",
                ModifyKind::Delete => "delete",
            },
        }
    }
}

/// Successful result of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResponse {
    Created(Vec<Row>),
    Row(Option<Row>),
    Rows(Vec<Row>),
    Count(u64),
    Affected(u64),
}

/// Errors returned by the operation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Isolation(#[from] IsolationError),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OperationError {
    /// Outcome label for spans and metrics.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Isolation(_) => "rejected",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "error",
        }
    }
}
