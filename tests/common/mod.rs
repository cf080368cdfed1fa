#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Sender;

use geminichat::auth::{StaticKeyResolver, UserResolver};
use geminichat::chat::ChatService;
use geminichat::config::{ChatConfig, DatabaseConfig};
use geminichat::db;
use geminichat::llm::models::{GenerateOptions, GenerateResponse};
use geminichat::llm::{LlmError, LlmProvider};

pub const ALICE: &str = "Bearer alice-token";
pub const BOB: &str = "Bearer bob-token";

/// Replies with fixed chunks (or fails) and records every prompt it receives.
pub struct FakeProvider {
    chunks: Vec<String>,
    fail: bool,
    pub prompts: Mutex<Vec<String>>,
    pub options: Mutex<Vec<GenerateOptions>>,
}

impl FakeProvider {
    pub fn replying(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            fail: true,
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        })
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<GenerateResponse, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.options.lock().unwrap().push(options);
        if self.fail {
            return Err(LlmError::Api { status: 503, body: "unavailable".to_string() });
        }
        Ok(GenerateResponse {
            content: self.chunks.concat(),
            model: "fake-model".to_string(),
            usage: None,
        })
    }

    async fn generate_streaming(
        &self,
        prompt: &str,
        options: GenerateOptions,
        tx: Sender<String>,
    ) -> Result<(), LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.options.lock().unwrap().push(options);
        if self.fail {
            return Err(LlmError::Network("connection reset".to_string()));
        }
        for chunk in &self.chunks {
            if tx.send(chunk.clone()).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub fn chat_service(provider: Arc<FakeProvider>) -> ChatService {
    chat_service_with(provider, ChatConfig::default())
}

pub fn chat_service_with(provider: Arc<FakeProvider>, settings: ChatConfig) -> ChatService {
    let pool = db::get_connection(&DatabaseConfig {
        path: ":memory:".to_string(),
    })
    .unwrap();
    ChatService::new(pool, provider, settings)
}

pub fn resolver() -> Arc<dyn UserResolver> {
    Arc::new(StaticKeyResolver::new([("alice-token", "alice"), ("bob-token", "bob")]))
}
