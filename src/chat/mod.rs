pub mod prompt;
pub mod transcript;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::config::ChatConfig;
use crate::db::{service::DbService, DbPool};
use crate::llm::{models::GenerateOptions, LlmProvider};

const STREAM_BUFFER: usize = 100;

/// A validated user turn, ready to be sent to the model.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub user_text: String,
    pub prompt: String,
}

/// Owns the round trip from a user message to a persisted reply.
#[derive(Clone)]
pub struct ChatService {
    pool: DbPool,
    llm: Arc<dyn LlmProvider>,
    settings: ChatConfig,
}

impl ChatService {
    pub fn new(pool: DbPool, llm: Arc<dyn LlmProvider>, settings: ChatConfig) -> Self {
        Self { pool, llm, settings }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn options(&self) -> GenerateOptions {
        GenerateOptions {
            system_instruction: self.settings.system_prompt.clone(),
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            ..Default::default()
        }
    }

    /// Whether `conversation_id` exists and belongs to `user_id`.
    pub fn owns(&self, user_id: &str, conversation_id: Uuid) -> Result<bool, ApiError> {
        let conn = self.pool.lock()?;
        Ok(DbService::get_owned_conversation(&conn, conversation_id, user_id)?.is_some())
    }

    /// Checks the message and ownership, then builds the prompt from recent history.
    pub fn prepare(&self, user_id: &str, conversation_id: Uuid, message: &str) -> Result<PreparedTurn, ApiError> {
        let user_text = message.trim();
        if user_text.is_empty() {
            return Err(ApiError::BadRequest("Message must not be empty".to_string()));
        }

        let conn = self.pool.lock()?;
        if DbService::get_owned_conversation(&conn, conversation_id, user_id)?.is_none() {
            return Err(ApiError::conversation_not_found());
        }
        let history = DbService::recent_messages(&conn, conversation_id, self.settings.history_window)?;
        drop(conn);

        Ok(PreparedTurn {
            conversation_id,
            user_id: user_id.to_string(),
            user_text: user_text.to_string(),
            prompt: prompt::build_prompt(&history, user_text),
        })
    }

    pub async fn reply(&self, user_id: &str, conversation_id: Uuid, message: &str) -> Result<String, ApiError> {
        let turn = self.prepare(user_id, conversation_id, message)?;
        Ok(self.complete(&turn).await)
    }

    /// Never fails: provider errors turn into the fallback reply.
    pub async fn complete(&self, turn: &PreparedTurn) -> String {
        let reply = match self.llm.generate(&turn.prompt, self.options()).await {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    info!(
                        "Reply for conversation {} from {} ({} in / {} out tokens)",
                        turn.conversation_id, response.model, usage.input_tokens, usage.output_tokens
                    );
                }
                response.content
            }
            Err(e) => {
                warn!("{} call failed for conversation {}: {}", self.llm.name(), turn.conversation_id, e);
                self.settings.fallback_reply.clone()
            }
        };

        self.persist(turn, &reply);
        reply
    }

    /// Streams reply fragments on the returned channel. The full reply is
    /// stored once the provider finishes or the receiver goes away.
    pub fn stream(&self, turn: PreparedTurn) -> mpsc::Receiver<String> {
        let (out_tx, out_rx) = mpsc::channel::<String>(STREAM_BUFFER);
        let service = self.clone();

        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::channel::<String>(STREAM_BUFFER);
            let llm = service.llm.clone();
            let prompt = turn.prompt.clone();
            let options = service.options();

            let producer = tokio::spawn(async move { llm.generate_streaming(&prompt, options, tx).await });

            let mut reply = String::new();
            let mut client_gone = false;
            while let Some(chunk) = rx.recv().await {
                reply.push_str(&chunk);
                if out_tx.send(chunk).await.is_err() {
                    client_gone = true;
                    break;
                }
            }
            drop(rx);

            match producer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{} stream failed for conversation {}: {}", service.llm.name(), turn.conversation_id, e),
                Err(e) => warn!("Stream task for conversation {} aborted: {}", turn.conversation_id, e),
            }

            if reply.is_empty() {
                reply = service.settings.fallback_reply.clone();
                if !client_gone {
                    let _ = out_tx.send(reply.clone()).await;
                }
            }

            service.persist(&turn, &reply);
        });

        out_rx
    }

    /// Best effort: a reply the user already received is not failed over storage.
    fn persist(&self, turn: &PreparedTurn, reply: &str) {
        let conn = match self.pool.lock() {
            Ok(conn) => conn,
            Err(_) => {
                warn!("Database lock poisoned, dropping exchange for {}", turn.conversation_id);
                return;
            }
        };
        if let Err(e) = DbService::insert_exchange(&conn, turn.conversation_id, &turn.user_id, &turn.user_text, reply) {
            warn!("Failed to persist exchange for conversation {}: {}", turn.conversation_id, e);
        }
    }
}
