//! Storecrew Agent - Workers, transition graph, and the round-routing orchestrator

pub mod config;
pub mod gate;
pub mod graph;
pub mod orchestrator;
pub mod registry;
pub mod selector;
pub mod state;
pub mod worker;

pub use config::{PipelineConfig, ReasonerConfig, StoreConfig, TimeoutConfig};
pub use gate::{AutoApprove, ChannelGate, ConfirmationRequest, GateDecision, HumanGate};
pub use graph::{TransitionGraph, TransitionGraphBuilder};
pub use orchestrator::{
    ConversationEvent, Orchestrator, OrchestratorConfig, DEFAULT_GATE_TIMEOUT, DEFAULT_MAX_ROUNDS,
    DEFAULT_TERMINATION_TOKEN,
};
pub use registry::ConversationRegistry;
pub use selector::{FixedSelector, PhaseSelector, SpeakerSelector};
pub use state::{ConversationState, Termination, TerminationReason};
pub use worker::{ExecutorWorker, ReasoningWorker, ValidatorWorker, Worker, DEFAULT_REASONING_TIMEOUT};
