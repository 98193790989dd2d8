//! Orchestrator — the round router
//!
//! One step appends at most one turn. Each step runs, in order:
//! - stop if already terminated, or if cancellation was requested
//! - ask the human gate when the speaker is gated
//! - let the speaker act and append its turn
//! - stop on the termination signal, the round limit, or a terminal speaker
//! - pick the next speaker and check the edge against the graph

use crate::gate::{AutoApprove, GateDecision, HumanGate};
use crate::graph::TransitionGraph;
use crate::registry::ConversationRegistry;
use crate::selector::{PhaseSelector, SpeakerSelector};
use crate::state::{ConversationState, TerminationReason};
use crate::worker::Worker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use storecrew_core::{ConfigError, ConversationId, OrchestrationError, Turn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ROUNDS: u32 = 20;
pub const DEFAULT_TERMINATION_TOKEN: &str = "TERMINATE";
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub max_rounds: u32,
    pub termination_token: String,
    pub gate_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            termination_token: DEFAULT_TERMINATION_TOKEN.to_string(),
            gate_timeout: DEFAULT_GATE_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ConversationEvent {
    TurnAppended {
        conversation: ConversationId,
        turn: Turn,
    },
    Terminated {
        conversation: ConversationId,
        reason: TerminationReason,
        summary: String,
    },
}

pub struct Orchestrator {
    graph: Arc<TransitionGraph>,
    workers: HashMap<String, Arc<dyn Worker>>,
    selector: Arc<dyn SpeakerSelector>,
    gate: Arc<dyn HumanGate>,
    config: OrchestratorConfig,
    events: Option<mpsc::Sender<ConversationEvent>>,
}

impl Orchestrator {
    /// Every graph worker needs exactly one implementation with the same role.
    pub fn new(
        graph: Arc<TransitionGraph>,
        workers: Vec<Arc<dyn Worker>>,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        if config.max_rounds == 0 {
            return Err(ConfigError::InvalidRoundLimit);
        }
        if config.termination_token.trim().is_empty() {
            return Err(ConfigError::Invalid("termination token must not be empty".into()));
        }

        let mut by_name: HashMap<String, Arc<dyn Worker>> = HashMap::new();
        for worker in workers {
            let name = worker.name().to_string();
            let spec = graph
                .worker(&name)
                .ok_or_else(|| ConfigError::UnknownWorker(name.clone()))?;
            if spec.role != worker.role() {
                return Err(ConfigError::Invalid(format!(
                    "worker '{}' is declared as {} but implemented as {}",
                    name,
                    spec.role,
                    worker.role()
                )));
            }
            if by_name.insert(name.clone(), worker).is_some() {
                return Err(ConfigError::DuplicateWorker(name));
            }
        }
        if let Some(missing) = graph.workers().find(|w| !by_name.contains_key(&w.name)) {
            return Err(ConfigError::Invalid(format!(
                "worker '{}' has no implementation",
                missing.name
            )));
        }

        Ok(Self {
            graph,
            workers: by_name,
            selector: Arc::new(PhaseSelector),
            gate: Arc::new(AutoApprove),
            config,
            events: None,
        })
    }

    pub fn with_selector(mut self, selector: Arc<dyn SpeakerSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn HumanGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_events(mut self, tx: mpsc::Sender<ConversationEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn graph(&self) -> &Arc<TransitionGraph> {
        &self.graph
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run a task to termination.
    pub async fn run(&self, task: &str) -> ConversationState {
        self.run_cancellable(task, CancellationToken::new()).await
    }

    /// Run a task to termination. Cancelling `cancel` stops the run at the
    /// next turn boundary with `UserAborted`; the turn in flight completes.
    pub async fn run_cancellable(&self, task: &str, cancel: CancellationToken) -> ConversationState {
        let mut state = ConversationState::new(task, self.graph.entry());
        info!(conversation = %state.id(), entry = %self.graph.entry(), "conversation started");
        self.drive(&mut state, &cancel).await;
        state
    }

    /// Run a task and keep the finished state in `registry`.
    pub async fn run_registered(
        &self,
        registry: &ConversationRegistry,
        task: &str,
        cancel: CancellationToken,
    ) -> Arc<ConversationState> {
        let state = self.run_cancellable(task, cancel).await;
        registry.insert(state)
    }

    /// Step until the conversation terminates.
    pub async fn drive(&self, state: &mut ConversationState, cancel: &CancellationToken) {
        while self.step(state, cancel).await {}
    }

    /// Advance by one turn. Returns false once the conversation has terminated.
    pub async fn step(&self, state: &mut ConversationState, cancel: &CancellationToken) -> bool {
        if state.is_terminated() {
            return false;
        }
        if cancel.is_cancelled() {
            let summary = format!("cancelled after {} rounds", state.round());
            self.finish(state, OrchestrationError::UserAborted("cancelled".into()).into(), summary)
                .await;
            return false;
        }
        if state.round() >= self.config.max_rounds {
            self.finish_round_limit(state).await;
            return false;
        }

        let Some(speaker) = state.speaker().map(str::to_string) else {
            return false;
        };
        let Some(worker) = self.workers.get(&speaker).cloned() else {
            // Unreachable with a validated graph; treat as an illegal hop.
            let from = state.last_turn().map(|t| t.speaker.clone()).unwrap_or_default();
            self.finish_illegal(state, from, speaker).await;
            return false;
        };

        if worker.spec().requires_confirmation && !self.confirm(state, worker.as_ref()).await {
            return false;
        }

        let candidates = self.graph.successors(&speaker).to_vec();
        let payload = worker.act(state, &candidates).await;
        let signalled = payload.contains_signal(&self.config.termination_token);

        let turn = state.append(&speaker, payload).clone();
        debug!(
            conversation = %state.id(),
            round = turn.round,
            speaker = %speaker,
            payload = turn.payload.label(),
            "turn appended"
        );
        self.emit(ConversationEvent::TurnAppended {
            conversation: state.id().clone(),
            turn: turn.clone(),
        })
        .await;

        if signalled {
            let summary = format!("{} signalled completion in round {}", speaker, turn.round);
            self.finish(state, TerminationReason::Completed, summary).await;
            return false;
        }
        if state.round() >= self.config.max_rounds {
            self.finish_round_limit(state).await;
            return false;
        }
        if self.graph.is_terminal(&speaker) {
            let summary = format!("terminal worker {} spoke in round {}", speaker, turn.round);
            self.finish(state, TerminationReason::Completed, summary).await;
            return false;
        }

        match self.selector.select(&self.graph, &speaker, &turn.payload) {
            Some(next) if self.graph.allows(&speaker, &next) => {
                state.set_speaker(next);
                true
            }
            Some(next) => {
                self.finish_illegal(state, speaker, next).await;
                false
            }
            None => {
                self.finish_illegal(state, speaker, "<none>".to_string()).await;
                false
            }
        }
    }

    async fn confirm(&self, state: &mut ConversationState, worker: &dyn Worker) -> bool {
        let decision =
            tokio::time::timeout(self.config.gate_timeout, self.gate.confirm(state, worker.spec()))
                .await;
        let detail = match decision {
            Ok(GateDecision::Approve) => return true,
            Ok(GateDecision::Decline(why)) => why,
            Err(_) => format!("no confirmation within {:?}", self.config.gate_timeout),
        };
        let summary = format!("{} was not confirmed: {}", worker.name(), detail);
        self.finish(state, TerminationReason::UserAborted { detail }, summary)
            .await;
        false
    }

    async fn finish_round_limit(&self, state: &mut ConversationState) {
        let max_rounds = self.config.max_rounds;
        let summary = format!("stopped after {} rounds without completion", state.round());
        self.finish(state, TerminationReason::RoundLimitExceeded { max_rounds }, summary)
            .await;
    }

    async fn finish_illegal(&self, state: &mut ConversationState, from: String, to: String) {
        let summary = format!("{} may not hand over to {}", from, to);
        self.finish(state, TerminationReason::IllegalTransition { from, to }, summary)
            .await;
    }

    async fn finish(&self, state: &mut ConversationState, reason: TerminationReason, summary: String) {
        if reason.is_clean() {
            info!(conversation = %state.id(), rounds = state.round(), "{}", summary);
        } else {
            warn!(conversation = %state.id(), rounds = state.round(), reason = %reason, "{}", summary);
        }
        state.terminate(reason.clone(), summary.clone());
        self.emit(ConversationEvent::Terminated {
            conversation: state.id().clone(),
            reason,
            summary,
        })
        .await;
    }

    async fn emit(&self, event: ConversationEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
