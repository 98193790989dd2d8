//! Mutation executor — applies validated operations to a document store
//!
//! The executor never returns `Err` and never retries: every outcome,
//! including store faults and timeouts, is folded into an `OperationResult`
//! for the conversation to observe.

use crate::store::{DocumentStore, UpsertOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use storecrew_core::{
    ExecutionError, OperationKind, OperationResult, ResultData, ToolDefinition, ValidatedRequest,
};
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TOOL_NAME: &str = "store_operation";

pub struct MutationExecutor {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl MutationExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tool definition describing the `OperationRequest` shape.
    pub fn definition() -> ToolDefinition {
        let kinds: Vec<&str> = OperationKind::ALL.iter().map(|k| k.as_str()).collect();
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Create, list, rename or delete stores and containers; create, \
                          retrieve, update or delete records. Record writes upsert on the \
                          record kind's key field."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": kinds,
                    },
                    "target": {
                        "type": "object",
                        "properties": {
                            "store": { "type": "string" },
                            "container": { "type": "string" },
                            "key": { "type": "string", "description": "Natural key of the record" }
                        },
                        "required": ["store"]
                    },
                    "fields": {
                        "type": "object",
                        "description": "Field values for record writes"
                    },
                    "record_kind": {
                        "type": "string",
                        "description": "Schema to validate against (default: container name)"
                    },
                    "rename_to": { "type": "string" },
                    "query": {
                        "type": "object",
                        "properties": {
                            "filter": { "type": "object", "description": "Equality clauses, all must match" },
                            "sort": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "field": { "type": "string" },
                                        "order": { "type": "string", "enum": ["ascending", "descending"] }
                                    },
                                    "required": ["field"]
                                }
                            },
                            "limit": { "type": "integer", "minimum": 0 },
                            "projection": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                },
                "required": ["operation", "target"]
            }),
        }
    }

    /// Apply one validated operation, bounded by the executor timeout.
    pub async fn apply(&self, request: &ValidatedRequest) -> OperationResult {
        debug!(operation = %request.kind(), target = %request.target(), "applying operation");

        let outcome = match tokio::time::timeout(self.timeout, self.dispatch(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExecutionError::Timeout(format!(
                "{} on {} exceeded {:?}",
                request.kind(),
                request.target(),
                self.timeout
            ))),
        };

        match outcome {
            Ok(data) => {
                info!(operation = %request.kind(), target = %request.target(), skipped = data.skipped, "operation applied");
                OperationResult::success(data)
            }
            Err(e) => {
                warn!(operation = %request.kind(), target = %request.target(), "operation failed: {}", e);
                e.into()
            }
        }
    }

    async fn dispatch(&self, request: &ValidatedRequest) -> Result<ResultData, ExecutionError> {
        let store = request.store();
        let container = request.container();

        match request.kind() {
            OperationKind::CreateStore => {
                if self.store.store_exists(store).await? || !self.store.create_store(store).await? {
                    return Ok(ResultData::skipped());
                }
                Ok(ResultData::created(store))
            }
            OperationKind::ListStores => Ok(ResultData::names(self.store.list_stores().await?)),
            OperationKind::DeleteStore => {
                if !self.store.drop_store(store).await? {
                    return Err(ExecutionError::NotFound(format!("store '{}'", store)));
                }
                Ok(ResultData::deleted(1))
            }
            OperationKind::RenameStore => {
                let to = rename_target(request)?;
                if !self.store.rename_store(store, to).await? {
                    return Err(ExecutionError::NotFound(format!("store '{}'", store)));
                }
                Ok(ResultData::renamed(to))
            }
            OperationKind::CreateContainer => {
                if self.store.container_exists(store, container).await?
                    || !self.store.create_container(store, container).await?
                {
                    return Ok(ResultData::skipped());
                }
                Ok(ResultData::created(container))
            }
            OperationKind::ListContainers => {
                Ok(ResultData::names(self.store.list_containers(store).await?))
            }
            OperationKind::DeleteContainer => {
                if !self.store.drop_container(store, container).await? {
                    return Err(ExecutionError::NotFound(format!(
                        "container '{}.{}'",
                        store, container
                    )));
                }
                Ok(ResultData::deleted(1))
            }
            OperationKind::RenameContainer => {
                let to = rename_target(request)?;
                if !self.store.rename_container(store, container, to).await? {
                    return Err(ExecutionError::NotFound(format!(
                        "container '{}.{}'",
                        store, container
                    )));
                }
                Ok(ResultData::renamed(to))
            }
            OperationKind::CreateRecord | OperationKind::UpdateRecord => {
                let (key_field, key) = record_key(request)?;
                let outcome = self
                    .store
                    .upsert(store, container, key_field, key, request.fields())
                    .await?;
                Ok(match outcome {
                    UpsertOutcome::Inserted { id } => ResultData::inserted(id),
                    UpsertOutcome::Updated { .. } => ResultData::updated(1, 1),
                })
            }
            OperationKind::RetrieveRecords => {
                let records = self.store.find(store, container, request.query()).await?;
                Ok(ResultData::records(records))
            }
            OperationKind::DeleteRecord => {
                let (key_field, key) = record_key(request)?;
                if !self.store.delete_one(store, container, key_field, key).await? {
                    return Err(ExecutionError::NotFound(format!(
                        "record {} = {} in '{}.{}'",
                        key_field, key, store, container
                    )));
                }
                Ok(ResultData::deleted(1))
            }
        }
    }
}

fn rename_target(request: &ValidatedRequest) -> Result<&str, ExecutionError> {
    request
        .rename_to()
        .ok_or_else(|| ExecutionError::StorageFault("rename without a target name".into()))
}

fn record_key(request: &ValidatedRequest) -> Result<(&str, &Value), ExecutionError> {
    match (request.key_field(), request.key_value()) {
        (Some(field), Some(value)) => Ok((field, value)),
        _ => Err(ExecutionError::StorageFault(format!(
            "{} without a record key",
            request.kind()
        ))),
    }
}
