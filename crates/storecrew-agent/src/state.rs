//! Conversation state: the append-only turn log and its termination record

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use storecrew_core::{
    ConversationId, OperationRequest, OperationResult, OrchestrationError, Payload, Turn,
    ValidatedRequest,
};

/// Why a conversation stopped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The termination signal was observed or a terminal worker spoke.
    Completed,
    RoundLimitExceeded { max_rounds: u32 },
    UserAborted { detail: String },
    IllegalTransition { from: String, to: String },
}

impl TerminationReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The orchestration error behind an unclean stop.
    pub fn error(&self) -> Option<OrchestrationError> {
        match self {
            Self::Completed => None,
            Self::RoundLimitExceeded { max_rounds } => Some(OrchestrationError::RoundLimitExceeded {
                max_rounds: *max_rounds,
            }),
            Self::UserAborted { detail } => Some(OrchestrationError::UserAborted(detail.clone())),
            Self::IllegalTransition { from, to } => Some(OrchestrationError::IllegalTransition {
                from: from.clone(),
                to: to.clone(),
            }),
        }
    }
}

impl From<OrchestrationError> for TerminationReason {
    fn from(e: OrchestrationError) -> Self {
        match e {
            OrchestrationError::RoundLimitExceeded { max_rounds } => Self::RoundLimitExceeded { max_rounds },
            OrchestrationError::UserAborted(detail) => Self::UserAborted { detail },
            OrchestrationError::IllegalTransition { from, to } => Self::IllegalTransition { from, to },
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            None => write!(f, "completed"),
            Some(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Termination {
    pub reason: TerminationReason,
    pub summary: String,
    pub at: DateTime<Utc>,
}

/// Per-run state. Only the orchestrator's step function mutates it.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationState {
    id: ConversationId,
    task: String,
    turns: Vec<Turn>,
    round: u32,
    speaker: Option<String>,
    termination: Option<Termination>,
}

impl ConversationState {
    pub fn new(task: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::with_id(ConversationId::generate(), task, entry)
    }

    pub fn with_id(id: ConversationId, task: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            id,
            task: task.into(),
            turns: Vec::new(),
            round: 0,
            speaker: Some(entry.into()),
            termination: None,
        }
    }

    pub fn id(&self) -> &ConversationId { &self.id }
    pub fn task(&self) -> &str { &self.task }
    pub fn turns(&self) -> &[Turn] { &self.turns }
    pub fn round(&self) -> u32 { self.round }

    /// Worker due to speak next; `None` once terminated.
    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Latest operation request not yet answered by a verdict or result.
    pub fn pending_request(&self) -> Option<&OperationRequest> {
        for turn in self.turns.iter().rev() {
            match &turn.payload {
                Payload::Request(r) => return Some(r),
                Payload::Validated(_) | Payload::Result(_) => return None,
                Payload::Text(_) => {}
            }
        }
        None
    }

    /// Latest validated request not yet executed.
    pub fn pending_validated(&self) -> Option<&ValidatedRequest> {
        for turn in self.turns.iter().rev() {
            match &turn.payload {
                Payload::Validated(v) => return Some(v),
                Payload::Request(_) | Payload::Result(_) => return None,
                Payload::Text(_) => {}
            }
        }
        None
    }

    pub fn results(&self) -> impl Iterator<Item = &OperationResult> {
        self.turns.iter().filter_map(|t| t.payload.as_result())
    }

    pub(crate) fn append(&mut self, speaker: &str, payload: Payload) -> &Turn {
        self.round += 1;
        self.turns.push(Turn::new(self.round, speaker, payload));
        &self.turns[self.turns.len() - 1]
    }

    pub(crate) fn set_speaker(&mut self, speaker: impl Into<String>) {
        self.speaker = Some(speaker.into());
    }

    pub(crate) fn terminate(&mut self, reason: TerminationReason, summary: impl Into<String>) {
        if self.termination.is_some() {
            return;
        }
        self.speaker = None;
        self.termination = Some(Termination {
            reason,
            summary: summary.into(),
            at: Utc::now(),
        });
    }
}
