//! Text generation abstraction and Gemini client.
//!
//! The pipeline only depends on [`TextGenerator`]; [`GeminiClient`] is the production
//! implementation and tests substitute their own.

mod gemini;

use async_trait::async_trait;
use std::time::Duration;

pub use gemini::{GeminiClient, GeminiSettings, PRIMING_INSTRUCTION};

/// Why a generation attempt produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation api key not configured")]
    CredentialMissing,
    #[error("generation request failed: {0}")]
    Network(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation api returned {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("unexpected generation response: {0}")]
    MalformedResponse(String),
    #[error("generation blocked by provider: {0}")]
    ContentBlocked(String),
}

/// Produces reply text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
