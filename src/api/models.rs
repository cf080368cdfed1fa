use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::ChatMessage;

#[derive(Debug, Deserialize, Default)]
pub struct StartConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartConversationResponse {
    pub conversation_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_offset")]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

fn default_offset() -> usize {
    0
}

/// Frames sent by WebSocket clients.
#[derive(Debug, Deserialize)]
pub struct WsClientMessage {
    pub r#type: String, // Expected: "message"
    pub content: String,
}

/// Frames pushed to streaming clients, over SSE or WebSocket.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamEvent {
    pub r#type: String, // "chunk", "done" or "error"
    pub content: String,
}

impl StreamEvent {
    pub fn chunk(content: String) -> Self {
        Self { r#type: "chunk".to_string(), content }
    }

    pub fn done() -> Self {
        Self { r#type: "done".to_string(), content: String::new() }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { r#type: "error".to_string(), content: content.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "type": self.r#type, "content": self.content }).to_string()
    }
}
