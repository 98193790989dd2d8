//! Operation requests and results exchanged between workers and the executor

use crate::error::{ExecutionError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A stored record: field name -> JSON value.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateStore,
    ListStores,
    DeleteStore,
    RenameStore,
    CreateContainer,
    ListContainers,
    DeleteContainer,
    RenameContainer,
    CreateRecord,
    RetrieveRecords,
    UpdateRecord,
    DeleteRecord,
}

/// Level of the store hierarchy an operation addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Store,
    Container,
    Record,
}

impl OperationKind {
    pub const ALL: [OperationKind; 12] = [
        Self::CreateStore,
        Self::ListStores,
        Self::DeleteStore,
        Self::RenameStore,
        Self::CreateContainer,
        Self::ListContainers,
        Self::DeleteContainer,
        Self::RenameContainer,
        Self::CreateRecord,
        Self::RetrieveRecords,
        Self::UpdateRecord,
        Self::DeleteRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateStore => "create_store",
            Self::ListStores => "list_stores",
            Self::DeleteStore => "delete_store",
            Self::RenameStore => "rename_store",
            Self::CreateContainer => "create_container",
            Self::ListContainers => "list_containers",
            Self::DeleteContainer => "delete_container",
            Self::RenameContainer => "rename_container",
            Self::CreateRecord => "create_record",
            Self::RetrieveRecords => "retrieve_records",
            Self::UpdateRecord => "update_record",
            Self::DeleteRecord => "delete_record",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::CreateStore
            | Self::ListStores
            | Self::DeleteStore
            | Self::RenameStore
            | Self::ListContainers => Scope::Store,
            Self::CreateContainer | Self::DeleteContainer | Self::RenameContainer => {
                Scope::Container
            }
            Self::CreateRecord | Self::RetrieveRecords | Self::UpdateRecord | Self::DeleteRecord => {
                Scope::Record
            }
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ListStores | Self::ListContainers | Self::RetrieveRecords
        )
    }

    pub fn is_rename(&self) -> bool {
        matches!(self, Self::RenameStore | Self::RenameContainer)
    }

    /// Record writes go through the schema and the upsert path.
    pub fn is_record_write(&self) -> bool {
        matches!(self, Self::CreateRecord | Self::UpdateRecord)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an operation lands: store, optional container, optional record key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub store: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Target {
    pub fn store(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            container: None,
            key: None,
        }
    }

    pub fn container(store: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            container: Some(container.into()),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.store)?;
        if let Some(c) = &self.container {
            write!(f, ".{}", c)?;
        }
        if let Some(k) = &self.key {
            write!(f, "[{}]", k)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Read options for `retrieve_records`. All filter clauses must match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub filter: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<String>>,
}

impl Query {
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            order,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// A structured request produced by a generating worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    #[serde(rename = "operation")]
    pub kind: OperationKind,
    pub target: Target,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// Schema to validate record writes against. Defaults to the container name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
}

impl OperationRequest {
    pub fn new(kind: OperationKind, target: Target) -> Self {
        Self {
            kind,
            target,
            fields: Map::new(),
            record_kind: None,
            rename_to: None,
            query: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_record_kind(mut self, kind: impl Into<String>) -> Self {
        self.record_kind = Some(kind.into());
        self
    }

    pub fn with_rename_to(mut self, name: impl Into<String>) -> Self {
        self.rename_to = Some(name.into());
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Record kind for schema lookup: explicit, else the container name.
    pub fn effective_record_kind(&self) -> Option<&str> {
        self.record_kind
            .as_deref()
            .or(self.target.container.as_deref())
    }
}

/// Payload of a successful operation. Only the fields relevant to the
/// operation are set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    /// Creation found the target already present and did nothing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
}

impl ResultData {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn created(name: impl Into<String>) -> Self {
        Self {
            created: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn renamed(to: impl Into<String>) -> Self {
        Self {
            renamed_to: Some(to.into()),
            ..Default::default()
        }
    }

    pub fn inserted(id: impl Into<String>) -> Self {
        Self {
            inserted_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn updated(matched: u64, modified: u64) -> Self {
        Self {
            matched_count: Some(matched),
            modified_count: Some(modified),
            ..Default::default()
        }
    }

    pub fn deleted(count: u64) -> Self {
        Self {
            deleted_count: Some(count),
            ..Default::default()
        }
    }

    pub fn names(names: Vec<String>) -> Self {
        Self {
            names: Some(names),
            ..Default::default()
        }
    }

    pub fn records(records: Vec<Record>) -> Self {
        Self {
            records: Some(records),
            ..Default::default()
        }
    }
}

/// Machine-readable failure category carried in an error result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingFields,
    TypeMismatch,
    InvalidName,
    UnknownKind,
    NotFound,
    StorageFault,
    Timeout,
    Conflict,
    ReasoningFault,
}

impl ErrorKind {
    /// Validation failures are fixed by regenerating the request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingFields | Self::TypeMismatch | Self::InvalidName | Self::UnknownKind
        )
    }
}

/// Outcome of one executor (or validator) invocation: success with data, or
/// error with a message. Never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OperationResult {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResultData>,
    },
    Error { kind: ErrorKind, message: String },
}

impl OperationResult {
    pub fn success(data: ResultData) -> Self {
        Self::Success { data: Some(data) }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn data(&self) -> Option<&ResultData> {
        match self {
            Self::Success { data } => data.as_ref(),
            Self::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            Self::Success { .. } => None,
        }
    }
}

impl From<ValidationError> for OperationResult {
    fn from(e: ValidationError) -> Self {
        let kind = match &e {
            ValidationError::MissingFields(_) => ErrorKind::MissingFields,
            ValidationError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ValidationError::InvalidName(_) => ErrorKind::InvalidName,
            ValidationError::UnknownKind(_) => ErrorKind::UnknownKind,
        };
        Self::error(kind, e.to_string())
    }
}

impl From<ExecutionError> for OperationResult {
    fn from(e: ExecutionError) -> Self {
        let kind = match &e {
            ExecutionError::NotFound(_) => ErrorKind::NotFound,
            ExecutionError::StorageFault(_) => ErrorKind::StorageFault,
            ExecutionError::Timeout(_) => ErrorKind::Timeout,
            ExecutionError::Conflict(_) => ErrorKind::Conflict,
            ExecutionError::ReasoningFault(_) => ErrorKind::ReasoningFault,
        };
        Self::error(kind, e.to_string())
    }
}
