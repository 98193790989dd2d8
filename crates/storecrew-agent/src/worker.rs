//! Workers — the units that take turns in a conversation
//!
//! `act` is infallible: reasoning faults, validation failures and store
//! errors all come back as an error `OperationResult` payload so the
//! conversation can route them to a generating worker.

use crate::orchestrator::DEFAULT_TERMINATION_TOKEN;
use crate::state::ConversationState;
use std::sync::Arc;
use std::time::Duration;
use storecrew_core::{
    ErrorKind, ExecutionError, OperationResult, OperationValidator, Payload, Role, ToolDefinition,
    WorkerSpec,
};
use storecrew_llm::{Reasoner, ReasoningRequest, ReasoningResponse};
use storecrew_store::MutationExecutor;
use tracing::{debug, warn};

pub const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(60);

/// A named participant in a conversation.
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    fn spec(&self) -> &WorkerSpec;

    fn name(&self) -> &str {
        &self.spec().name
    }

    fn role(&self) -> Role {
        self.spec().role
    }

    /// Produce this worker's payload for the next turn. `candidates` are the
    /// workers allowed to speak afterwards.
    async fn act(&self, state: &ConversationState, candidates: &[String]) -> Payload;
}

/// Supervisor, Generator or DomainSpecialist backed by the reasoning service.
pub struct ReasoningWorker {
    spec: WorkerSpec,
    reasoner: Arc<dyn Reasoner>,
    tools: Vec<ToolDefinition>,
    timeout: Duration,
    termination_token: String,
}

impl ReasoningWorker {
    pub fn new(spec: WorkerSpec, reasoner: Arc<dyn Reasoner>) -> Self {
        let tools = if spec.role.is_generating() {
            vec![MutationExecutor::definition()]
        } else {
            Vec::new()
        };
        Self {
            spec,
            reasoner,
            tools,
            timeout: DEFAULT_REASONING_TIMEOUT,
            termination_token: DEFAULT_TERMINATION_TOKEN.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_termination_token(mut self, token: impl Into<String>) -> Self {
        self.termination_token = token.into();
        self
    }

    fn request(&self, state: &ConversationState, candidates: &[String]) -> ReasoningRequest {
        let mut req = ReasoningRequest::new(&self.spec.name, self.spec.role, state.task());
        req.instructions = self.spec.instructions.clone();
        req.history = state.turns().to_vec();
        req.candidates = candidates.to_vec();
        req.tools = self.tools.clone();
        req.termination_token = Some(self.termination_token.clone());
        req
    }
}

#[async_trait::async_trait]
impl Worker for ReasoningWorker {
    fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    async fn act(&self, state: &ConversationState, candidates: &[String]) -> Payload {
        let request = self.request(state, candidates);
        debug!(worker = %self.spec.name, round = state.round() + 1, "reasoning call");

        match tokio::time::timeout(self.timeout, self.reasoner.reason(request)).await {
            Ok(Ok(ReasoningResponse::Text(text))) => Payload::Text(text),
            Ok(Ok(ReasoningResponse::Operation(op))) => Payload::Request(op),
            Ok(Err(e)) => {
                warn!(worker = %self.spec.name, "reasoning failed: {}", e);
                Payload::Result(ExecutionError::ReasoningFault(e.to_string()).into())
            }
            Err(_) => {
                warn!(worker = %self.spec.name, "reasoning timed out after {:?}", self.timeout);
                Payload::Result(
                    ExecutionError::Timeout(format!(
                        "reasoning call for '{}' exceeded {:?}",
                        self.spec.name, self.timeout
                    ))
                    .into(),
                )
            }
        }
    }
}

/// Checks the pending request against the schema registry.
pub struct ValidatorWorker {
    spec: WorkerSpec,
    validator: OperationValidator,
}

impl ValidatorWorker {
    pub fn new(spec: WorkerSpec, validator: OperationValidator) -> Self {
        Self { spec, validator }
    }
}

#[async_trait::async_trait]
impl Worker for ValidatorWorker {
    fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    async fn act(&self, state: &ConversationState, _candidates: &[String]) -> Payload {
        let Some(request) = state.pending_request() else {
            return Payload::text("no operation request pending");
        };
        match self.validator.validate(request) {
            Ok(validated) => {
                debug!(worker = %self.spec.name, operation = %validated.kind(), "request validated");
                Payload::Validated(validated)
            }
            Err(e) => {
                debug!(worker = %self.spec.name, "request rejected: {}", e);
                Payload::Result(e.into())
            }
        }
    }
}

/// The only worker allowed to mutate the store.
pub struct ExecutorWorker {
    spec: WorkerSpec,
    executor: Arc<MutationExecutor>,
}

impl ExecutorWorker {
    pub fn new(spec: WorkerSpec, executor: Arc<MutationExecutor>) -> Self {
        Self { spec, executor }
    }
}

#[async_trait::async_trait]
impl Worker for ExecutorWorker {
    fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    async fn act(&self, state: &ConversationState, _candidates: &[String]) -> Payload {
        match state.pending_validated() {
            Some(validated) => Payload::Result(self.executor.apply(validated).await),
            None => Payload::Result(OperationResult::error(
                ErrorKind::NotFound,
                "no validated request pending",
            )),
        }
    }
}
