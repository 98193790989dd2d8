//! Core types for Storecrew

use crate::operation::{OperationRequest, OperationResult};
use crate::validate::ValidatedRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Conversation identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ConversationId(Arc<str>);

impl ConversationId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for ConversationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Worker role
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Supervisor,
    Generator,
    Validator,
    Executor,
    DomainSpecialist,
}

impl Role {
    /// Roles whose turns come from the reasoning service.
    pub fn uses_reasoning(&self) -> bool {
        matches!(self, Self::Supervisor | Self::Generator | Self::DomainSpecialist)
    }

    /// Roles that produce operation requests.
    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generator | Self::DomainSpecialist)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Supervisor => write!(f, "supervisor"),
            Role::Generator => write!(f, "generator"),
            Role::Validator => write!(f, "validator"),
            Role::Executor => write!(f, "executor"),
            Role::DomainSpecialist => write!(f, "domain_specialist"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReasoningCall,
    MutationCall,
}

/// Static description of a worker, fixed at configuration time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerSpec {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Opaque instructions handed to the reasoning service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Pause for external confirmation before this worker acts.
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            capabilities: BTreeSet::new(),
            instructions: None,
            requires_confirmation: false,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn gated(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// What a worker contributed in one turn.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Request(OperationRequest),
    Validated(ValidatedRequest),
    Result(OperationResult),
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&OperationRequest> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_validated(&self) -> Option<&ValidatedRequest> {
        match self {
            Self::Validated(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&OperationResult> {
        match self {
            Self::Result(r) => Some(r),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Request(_) => "request",
            Self::Validated(_) => "validated",
            Self::Result(r) if r.is_success() => "result:success",
            Self::Result(_) => "result:error",
        }
    }

    /// True when a text payload carries `token` as a whole word, ignoring case.
    pub fn contains_signal(&self, token: &str) -> bool {
        self.as_text()
            .is_some_and(|text| contains_word(text, token))
    }
}

/// Case-insensitive whole-word search.
pub fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let word = word.to_lowercase();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|w| w == word)
}

/// One appended, immutable step of a conversation.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Turn {
    pub round: u32,
    pub speaker: String,
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(round: u32, speaker: impl Into<String>, payload: Payload) -> Self {
        Self {
            round,
            speaker: speaker.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Tool definition handed to the reasoning service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}
