//! Error types for Storecrew
//!
//! Validation and execution errors are recoverable at the turn level: they are
//! folded into an `OperationResult::Error` payload and routed back to a
//! generating worker. Orchestration errors end a conversation.

use crate::schema::{FieldKind, ValueKind};
use thiserror::Error;

/// A request was rejected before reaching storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        actual: ValueKind,
    },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("unknown record kind: {0}")]
    UnknownKind(String),
}

/// A validated request failed while being applied to the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("reasoning fault: {0}")]
    ReasoningFault(String),
}

/// Fatal to a conversation. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("round limit exceeded ({max_rounds} rounds)")]
    RoundLimitExceeded { max_rounds: u32 },

    #[error("user aborted: {0}")]
    UserAborted(String),
}

/// Schema registry failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    #[error("record kind already registered: {0}")]
    DuplicateKind(String),

    #[error("invalid schema rule: {0}")]
    InvalidRule(String),
}

/// Configuration is rejected at load time rather than at run time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown worker: {0}")]
    UnknownWorker(String),

    #[error("duplicate worker: {0}")]
    DuplicateWorker(String),

    #[error("worker '{0}' is reachable but has no outgoing edge and is not terminal")]
    DeadEnd(String),

    #[error("executor '{to}' may be reached from '{from}' without a validator")]
    UnvalidatedExecution { from: String, to: String },

    #[error("entry worker '{0}' may not be an executor")]
    ExecutorEntry(String),

    #[error("worker '{worker}': {reason}")]
    Capability { worker: String, reason: String },

    #[error("max_rounds must be at least 1")]
    InvalidRoundLimit,

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl ConfigError {
    pub fn capability(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Capability {
            worker: worker.into(),
            reason: reason.into(),
        }
    }
}
