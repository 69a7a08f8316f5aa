//! Typed facade over the scoped operation pipeline.
//!
//! Domain code talks to storage only through [`ScopedClient`]; it never sees
//! the store or the tenant rules directly.

use std::sync::Arc;

use tenantscope_core::{Filter, Payload, ScopedEntityRegistry};
use tower::util::BoxCloneSyncService;
use tower::ServiceExt;

use crate::service::config::ScopeConfig;
use crate::service::middleware::build_scoped_pipeline;
use crate::service::operation::{
    ModifyKind, Operation, OperationError, OperationResponse, ReadKind,
};
use crate::storage::{Row, RowStore};

type Pipeline = BoxCloneSyncService<Operation, OperationResponse, OperationError>;

/// Tenant-scoped CRUD surface. Cheap to clone.
///
/// Every call reads the tenant from the calling task's context; outside a
/// scope every call fails with `MissingTenantContext`.
#[derive(Clone)]
pub struct ScopedClient {
    pipeline: Pipeline,
}

impl ScopedClient {
    #[must_use]
    pub fn new(
        store: Arc<dyn RowStore>,
        registry: Arc<ScopedEntityRegistry>,
        config: &ScopeConfig,
    ) -> Self {
        Self {
            pipeline: BoxCloneSyncService::new(build_scoped_pipeline(store, registry, config)),
        }
    }

    /// Sends a raw operation through the pipeline.
    ///
    /// # Errors
    ///
    /// Any rejection, timeout, or storage failure.
    pub async fn execute(&self, op: Operation) -> Result<OperationResponse, OperationError> {
        self.pipeline.clone().oneshot(op).await
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn create(&self, entity: &str, payload: Payload) -> Result<Row, OperationError> {
        let op = Operation::Create {
            entity: entity.to_string(),
            payload,
        };
        match self.execute(op).await? {
            OperationResponse::Created(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| unexpected("create")),
            _ => Err(unexpected("create")),
        }
    }

    /// Creates all rows or none.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn create_many(
        &self,
        entity: &str,
        payloads: Vec<Payload>,
    ) -> Result<Vec<Row>, OperationError> {
        let op = Operation::CreateMany {
            entity: entity.to_string(),
            payloads,
        };
        match self.execute(op).await? {
            OperationResponse::Created(rows) => Ok(rows),
            _ => Err(unexpected("create_many")),
        }
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn upsert(
        &self,
        entity: &str,
        filter: Filter,
        create: Payload,
        update: Payload,
    ) -> Result<Row, OperationError> {
        let op = Operation::Upsert {
            entity: entity.to_string(),
            filter,
            create,
            update,
        };
        match self.execute(op).await? {
            OperationResponse::Row(Some(row)) => Ok(row),
            _ => Err(unexpected("upsert")),
        }
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn find_first(
        &self,
        entity: &str,
        filter: Filter,
    ) -> Result<Option<Row>, OperationError> {
        match self.read(entity, filter, ReadKind::First).await? {
            OperationResponse::Row(row) => Ok(row),
            _ => Err(unexpected("find_first")),
        }
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn find_many(
        &self,
        entity: &str,
        filter: Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, OperationError> {
        match self.read(entity, filter, ReadKind::Many { limit }).await? {
            OperationResponse::Rows(rows) => Ok(rows),
            _ => Err(unexpected("find_many")),
        }
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn count(&self, entity: &str, filter: Filter) -> Result<u64, OperationError> {
        match self.read(entity, filter, ReadKind::Count).await? {
            OperationResponse::Count(n) => Ok(n),
            _ => Err(unexpected("count")),
        }
    }

    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn update(
        &self,
        entity: &str,
        filter: Filter,
        changes: Payload,
    ) -> Result<u64, OperationError> {
        self.modify(entity, filter, ModifyKind::Update { changes })
            .await
    }

    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn delete(&self, entity: &str, filter: Filter) -> Result<u64, OperationError> {
        self.modify(entity, filter, ModifyKind::Delete).await
    }

    async fn read(
        &self,
        entity: &str,
        filter: Filter,
        kind: ReadKind,
    ) -> Result<OperationResponse, OperationError> {
        self.execute(Operation::Read {
            entity: entity.to_string(),
            filter,
            kind,
        })
        .await
    }

    async fn modify(
        &self,
        entity: &str,
        filter: Filter,
        kind: ModifyKind,
    ) -> Result<u64, OperationError> {
        let op = Operation::Modify {
            entity: entity.to_string(),
            filter,
            kind,
        };
        match self.execute(op).await? {
            OperationResponse::Affected(n) => Ok(n),
            _ => Err(unexpected("modify")),
        }
    }
}

fn unexpected(kind: &str) -> OperationError {
    OperationError::Internal(anyhow::anyhow!("unexpected response shape for {kind}"))
}
