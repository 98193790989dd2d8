//! Storecrew Core - Types, schemas, validation, and error handling

pub mod error;
pub mod operation;
pub mod schema;
pub mod types;
pub mod validate;

pub use error::{
    ConfigError, Error, ExecutionError, OrchestrationError, Result, SchemaError, ValidationError,
};
pub use operation::*;
pub use schema::{FieldKind, FieldRule, SchemaRegistry, SchemaRule, SchemaRuleBuilder, ValueKind};
pub use types::*;
pub use validate::{OperationValidator, ValidatedRequest};
