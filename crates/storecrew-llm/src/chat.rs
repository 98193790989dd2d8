//! OpenAI-compatible chat-completions reasoner (Groq, OpenAI, local servers)

use crate::provider::{Reasoner, ReasonerError, ReasonerResult};
use crate::types::{ReasoningRequest, ReasoningResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storecrew_core::{Payload, Turn};
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct ChatCompletionsReasoner {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl ChatCompletionsReasoner {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.0,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body for a reasoning call.
    pub fn build_body(&self, request: &ReasoningRequest) -> ChatRequest {
        let mut messages = vec![ChatMessage {
            role: "system".into(),
            content: system_prompt(request),
        }];
        messages.push(ChatMessage {
            role: "user".into(),
            content: request.task.clone(),
        });
        for turn in &request.history {
            messages.push(ChatMessage {
                role: if turn.speaker == request.worker { "assistant" } else { "user" }.into(),
                content: render_turn(turn),
            });
        }
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        }
    }
}

fn system_prompt(request: &ReasoningRequest) -> String {
    let mut sys = format!("You are {}, acting as the {} of a data-store pipeline.", request.worker, request.role);
    if let Some(instructions) = &request.instructions {
        sys.push_str("\n\n");
        sys.push_str(instructions);
    }
    if !request.candidates.is_empty() {
        sys.push_str("\n\nWorkers that may act next: ");
        sys.push_str(&request.candidates.join(", "));
    }
    for tool in &request.tools {
        sys.push_str(&format!(
            "\n\nTo request a store operation, reply with a JSON object for `{}` ({}). Schema:\n{}",
            tool.name, tool.description, tool.input_schema
        ));
    }
    sys
}

fn render_turn(turn: &Turn) -> String {
    let body = match &turn.payload {
        Payload::Text(t) => t.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    format!("[{}] {}", turn.speaker, body)
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl Reasoner for ChatCompletionsReasoner {
    fn name(&self) -> &str { "chat-completions" }

    async fn reason(&self, request: ReasoningRequest) -> ReasonerResult<ReasoningResponse> {
        let body = self.build_body(&request);
        debug!(worker = %request.worker, model = %body.model, "chat-completions request");

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("chat-completions error {}: {}", status, error_text);
            return Err(match status.as_u16() {
                401 | 403 => ReasonerError::AuthFailed(error_text),
                429 => ReasonerError::RateLimited { retry_after_ms: 60000 },
                _ => ReasonerError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::InvalidResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReasonerError::InvalidResponse("no message content".into()))?;

        Ok(ReasoningResponse::from_text(content, request.termination_token.as_deref()))
    }
}
