//! Human confirmation before gated workers act

use crate::state::ConversationState;
use storecrew_core::{ConversationId, WorkerSpec};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Approve,
    Decline(String),
}

/// Asked before a worker with `requires_confirmation` takes its turn. The
/// orchestrator bounds every call with its gate timeout.
#[async_trait::async_trait]
pub trait HumanGate: Send + Sync {
    async fn confirm(&self, state: &ConversationState, worker: &WorkerSpec) -> GateDecision;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AutoApprove;

#[async_trait::async_trait]
impl HumanGate for AutoApprove {
    async fn confirm(&self, _state: &ConversationState, _worker: &WorkerSpec) -> GateDecision {
        GateDecision::Approve
    }
}

/// A pending confirmation, answered through `reply`.
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub conversation: ConversationId,
    pub worker: String,
    pub round: u32,
    /// Short description of what the worker is about to act on.
    pub preview: String,
    pub reply: oneshot::Sender<GateDecision>,
}

impl ConfirmationRequest {
    pub fn approve(self) {
        let _ = self.reply.send(GateDecision::Approve);
    }

    pub fn decline(self, why: impl Into<String>) {
        let _ = self.reply.send(GateDecision::Decline(why.into()));
    }
}

/// Forwards confirmations to whoever holds the receiving end. A dropped
/// receiver or reply counts as a decline.
#[derive(Clone, Debug)]
pub struct ChannelGate {
    tx: mpsc::Sender<ConfirmationRequest>,
}

impl ChannelGate {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConfirmationRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl HumanGate for ChannelGate {
    async fn confirm(&self, state: &ConversationState, worker: &WorkerSpec) -> GateDecision {
        let (reply, answer) = oneshot::channel();
        let preview = match state.pending_validated() {
            Some(v) => format!("{} on {}", v.kind(), v.target()),
            None => state
                .last_turn()
                .map(|t| t.payload.label().to_string())
                .unwrap_or_else(|| "start".to_string()),
        };
        let request = ConfirmationRequest {
            conversation: state.id().clone(),
            worker: worker.name.clone(),
            round: state.round() + 1,
            preview,
            reply,
        };
        if self.tx.send(request).await.is_err() {
            return GateDecision::Decline("confirmation channel closed".into());
        }
        answer
            .await
            .unwrap_or_else(|_| GateDecision::Decline("confirmation dropped".into()))
    }
}
