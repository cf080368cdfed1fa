pub mod gemini;
pub mod models;
pub mod sse;

use gemini::GeminiProvider;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

use crate::config::GeminiConfig;
use models::{GenerateOptions, GenerateResponse};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Empty Response: {0}")]
    EmptyResponse(String),
    #[error("Rate Limited")]
    RateLimited,
}

impl LlmError {
    /// Transport failures, throttling and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::RateLimited => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::EmptyResponse(_) => false,
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<GenerateResponse, LlmError>;

    /// Sends text fragments on `tx` as they arrive. Returns once the
    /// upstream stream ends or the receiver is dropped.
    async fn generate_streaming(
        &self,
        prompt: &str,
        options: GenerateOptions,
        tx: Sender<String>,
    ) -> Result<(), LlmError>;
}

pub fn create_provider(config: &GeminiConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    Ok(Arc::new(GeminiProvider::from_config(config)?))
}
