//! ScriptedReasoner — deterministic reasoning responses for tests and dry runs
//!
//! Each worker has its own queue of steps; every call pops the next one. When
//! a worker's queue is empty the fallback step is used, or the call fails
//! with `ReasonerError::Exhausted`.

use crate::provider::{Reasoner, ReasonerError, ReasonerResult};
use crate::types::{ReasoningRequest, ReasoningResponse};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use storecrew_core::OperationRequest;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Free text (may embed an operation request as JSON).
    Text(String),
    /// A structured operation request.
    Operation(OperationRequest),
    /// Fail the call.
    Fail(String),
    /// Sleep before answering with the inner step. Used to trip timeouts.
    Delay(Duration, Box<ScriptStep>),
}

impl ScriptStep {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

pub struct ScriptedReasoner {
    scripts: Mutex<HashMap<String, VecDeque<ScriptStep>>>,
    fallback: Option<ScriptStep>,
    calls: Mutex<Vec<ReasoningRequest>>,
}

impl Default for ScriptedReasoner {
    fn default() -> Self { Self::new() }
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Append steps to a worker's script.
    pub fn script<I>(mut self, worker: &str, steps: I) -> Self
    where
        I: IntoIterator<Item = ScriptStep>,
    {
        self.scripts
            .get_mut()
            .entry(worker.to_string())
            .or_default()
            .extend(steps);
        self
    }

    /// Step used by every worker once its own script runs out.
    pub fn with_fallback(mut self, step: ScriptStep) -> Self {
        self.fallback = Some(step);
        self
    }

    pub async fn push(&self, worker: &str, step: ScriptStep) {
        self.scripts
            .lock()
            .await
            .entry(worker.to_string())
            .or_default()
            .push_back(step);
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Requests received so far, in call order.
    pub async fn calls(&self) -> Vec<ReasoningRequest> {
        self.calls.lock().await.clone()
    }

    async fn next_step(&self, worker: &str) -> Option<ScriptStep> {
        let mut scripts = self.scripts.lock().await;
        scripts
            .get_mut(worker)
            .and_then(|q| q.pop_front())
            .or_else(|| self.fallback.clone())
    }
}

#[async_trait::async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str { "scripted" }

    async fn reason(&self, request: ReasoningRequest) -> ReasonerResult<ReasoningResponse> {
        let worker = request.worker.clone();
        let token = request.termination_token.clone();
        self.calls.lock().await.push(request);

        let mut step = self
            .next_step(&worker)
            .await
            .ok_or_else(|| ReasonerError::Exhausted(worker.clone()))?;

        loop {
            match step {
                ScriptStep::Text(text) => return Ok(ReasoningResponse::from_text(text, token.as_deref())),
                ScriptStep::Operation(op) => return Ok(ReasoningResponse::Operation(op)),
                ScriptStep::Fail(message) => return Err(ReasonerError::RequestFailed(message)),
                ScriptStep::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    step = *inner;
                }
            }
        }
    }
}
