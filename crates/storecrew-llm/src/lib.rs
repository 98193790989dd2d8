//! Storecrew LLM - The reasoning-service boundary
//!
//! The orchestrator treats reasoning as an opaque call: worker context in,
//! free text or an operation request out.

pub mod chat;
pub mod provider;
pub mod scripted;
pub mod types;

pub use chat::ChatCompletionsReasoner;
pub use provider::{Reasoner, ReasonerError, ReasonerResult};
pub use scripted::{ScriptStep, ScriptedReasoner};
pub use types::*;
