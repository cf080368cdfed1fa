use actix_web::{delete, get, post, web, HttpResponse};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::middleware::AuthUser;
use crate::api::models::{
    ChatRequest, ChatResponse, HistoryResponse, PaginationQuery, StartConversationRequest,
    StartConversationResponse,
};
use crate::chat::{transcript, ChatService};
use crate::db::{service::DbService, DEFAULT_CONVERSATION_TITLE};

#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"message": "✅ Gemini Chatbot Backend is running!"}))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"ok": true}))
}

// --- Conversations ---

#[post("/start-conversation")]
pub async fn start_conversation(
    user: AuthUser,
    chat: web::Data<ChatService>,
    req: Option<web::Json<StartConversationRequest>>,
) -> Result<HttpResponse, ApiError> {
    let title = req
        .and_then(|r| r.into_inner().title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());

    let conn = chat.pool().lock()?;
    let conversation = DbService::insert_conversation(&conn, &user.id, &title)?;

    Ok(HttpResponse::Ok().json(StartConversationResponse {
        conversation_id: conversation.id,
    }))
}

#[get("/conversations")]
pub async fn list_conversations(
    user: AuthUser,
    chat: web::Data<ChatService>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let conn = chat.pool().lock()?;
    let conversations = DbService::list_conversations(&conn, Some(&user.id), query.limit, query.offset)?;
    Ok(HttpResponse::Ok().json(conversations))
}

#[delete("/conversations/{id}")]
pub async fn delete_conversation(
    user: AuthUser,
    chat: web::Data<ChatService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let conn = chat.pool().lock()?;
    let id = id.into_inner();

    if DbService::get_owned_conversation(&conn, id, &user.id)?.is_none() {
        return Err(ApiError::conversation_not_found());
    }

    DbService::delete_conversation(&conn, id)?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/conversations/import")]
pub async fn import_conversation(
    user: AuthUser,
    chat: web::Data<ChatService>,
    body: String,
) -> Result<HttpResponse, ApiError> {
    let parsed = transcript::parse(&body)?;

    let conn = chat.pool().lock()?;
    let conversation = DbService::import_transcript(&conn, &user.id, &parsed.title, &parsed.entries)?;
    Ok(HttpResponse::Created().json(conversation))
}

// --- History ---

#[get("/history/{id}")]
pub async fn history(
    user: AuthUser,
    chat: web::Data<ChatService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let conn = chat.pool().lock()?;
    let id = id.into_inner();

    // Someone else's conversation is reported exactly like a missing one.
    if DbService::get_owned_conversation(&conn, id, &user.id)?.is_none() {
        return Err(ApiError::conversation_not_found());
    }

    let messages = DbService::all_messages(&conn, id)?;
    Ok(HttpResponse::Ok().json(HistoryResponse { messages }))
}

#[get("/history/{id}/export")]
pub async fn export_conversation(
    user: AuthUser,
    chat: web::Data<ChatService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let conn = chat.pool().lock()?;
    let id = id.into_inner();

    let conversation = DbService::get_owned_conversation(&conn, id, &user.id)?
        .ok_or_else(ApiError::conversation_not_found)?;
    let messages = DbService::all_messages(&conn, id)?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"conversation_{}.txt\"", id),
        ))
        .body(transcript::render(&conversation, &messages)))
}

// --- Chat ---

#[post("/chat")]
pub async fn chat_reply(
    user: AuthUser,
    chat: web::Data<ChatService>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let reply = chat.reply(&user.id, req.conversation_id, &req.message).await?;
    Ok(HttpResponse::Ok().json(ChatResponse { reply }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(root)
        .service(health)
        .service(start_conversation)
        .service(list_conversations)
        .service(import_conversation)
        .service(delete_conversation)
        .service(history)
        .service(export_conversation)
        .service(chat_reply);
}
