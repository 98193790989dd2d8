//! Reasoning request/response types

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use storecrew_core::{contains_word, OperationRequest, Role, ToolDefinition, Turn};

/// Everything a reasoning call may see: who is asking, the task, and the
/// conversation so far.
#[derive(Clone, Debug, Serialize)]
pub struct ReasoningRequest {
    pub worker: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub task: String,
    pub history: Vec<Turn>,
    /// Workers allowed to speak next; lets a supervisor name its choice.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Word that ends the conversation. A reply containing it stays text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_token: Option<String>,
}

impl ReasoningRequest {
    pub fn new(worker: impl Into<String>, role: Role, task: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            role,
            instructions: None,
            task: task.into(),
            history: Vec::new(),
            candidates: Vec::new(),
            tools: Vec::new(),
            termination_token: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReasoningResponse {
    Text(String),
    Operation(OperationRequest),
}

impl ReasoningResponse {
    /// Interpret raw model output. A reply carrying the termination token is
    /// text even if it also embeds a request; otherwise an embedded operation
    /// request wins.
    pub fn from_text(text: impl Into<String>, termination_token: Option<&str>) -> Self {
        let text = text.into();
        if termination_token.is_some_and(|token| contains_word(&text, token)) {
            return Self::Text(text);
        }
        match extract_operation(&text) {
            Some(op) => Self::Operation(op),
            None => Self::Text(text),
        }
    }
}

fn fenced_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("static regex")
    })
}

/// Find an `OperationRequest` in model output: a fenced ```json block, the
/// whole text, or the outermost brace span, in that order.
pub fn extract_operation(text: &str) -> Option<OperationRequest> {
    for caps in fenced_json().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            if let Ok(op) = serde_json::from_str(m.as_str()) {
                return Some(op);
            }
        }
    }

    let trimmed = text.trim();
    if let Ok(op) = serde_json::from_str(trimmed) {
        return Some(op);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
