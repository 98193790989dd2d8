//! Reasoner trait

use crate::types::{ReasoningRequest, ReasoningResponse};

/// Result type for reasoning calls
pub type ReasonerResult<T> = Result<T, ReasonerError>;

#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("script exhausted for worker '{0}'")]
    Exhausted(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// The external reasoning service. Implementations must not depend on
/// orchestrator internals; they see only the request.
#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    fn name(&self) -> &str;

    async fn reason(&self, request: ReasoningRequest) -> ReasonerResult<ReasoningResponse>;
}
