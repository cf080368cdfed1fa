use actix_web::{get, web, Error, HttpRequest, HttpResponse, ResponseError};
use actix_ws::Message;
use futures_util::StreamExt as _;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::middleware::AuthUser;
use crate::api::models::{StreamEvent, WsClientMessage};
use crate::chat::ChatService;

#[get("/ws/chat/{conversation_id}")]
pub async fn ws_chat(
    req: HttpRequest,
    body: web::Payload,
    user: AuthUser,
    chat: web::Data<ChatService>,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let id = conversation_id.into_inner();

    // Verify ownership before upgrading the connection
    match chat.owns(&user.id, id) {
        Ok(true) => {}
        Ok(false) => return Ok(ApiError::conversation_not_found().error_response()),
        Err(e) => return Ok(e.error_response()),
    }

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;
    info!("WebSocket connection established for conversation {}", id);

    let chat = chat.get_ref().clone();

    actix_web::rt::spawn(async move {
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Ping(bytes) => {
                    if session.pong(&bytes).await.is_err() {
                        return;
                    }
                }
                Message::Text(text) => match serde_json::from_str::<WsClientMessage>(&text) {
                    Ok(msg) if msg.r#type == "message" => {
                        if !handle_chat_message(&chat, &user.id, id, &msg.content, &mut session).await {
                            // Client likely disconnected
                            return;
                        }
                    }
                    Ok(msg) => warn!("Ignoring WebSocket frame of type {:?}", msg.r#type),
                    Err(e) => {
                        let frame = StreamEvent::error(format!("Malformed message: {}", e));
                        if session.text(frame.to_json()).await.is_err() {
                            return;
                        }
                    }
                },
                Message::Close(reason) => {
                    let _ = session.close(reason).await;
                    break;
                }
                _ => {}
            }
        }
        info!("WebSocket connection closed for conversation {}", id);
    });

    Ok(response)
}

/// Streams one reply to the socket. Returns false when the socket is gone.
async fn handle_chat_message(
    chat: &ChatService,
    user_id: &str,
    conversation_id: Uuid,
    content: &str,
    session: &mut actix_ws::Session,
) -> bool {
    let turn = match chat.prepare(user_id, conversation_id, content) {
        Ok(turn) => turn,
        Err(e) => {
            return session.text(StreamEvent::error(e.to_string()).to_json()).await.is_ok();
        }
    };

    let mut rx = chat.stream(turn);
    while let Some(chunk) = rx.recv().await {
        if session.text(StreamEvent::chunk(chunk).to_json()).await.is_err() {
            return false;
        }
    }

    session.text(StreamEvent::done().to_json()).await.is_ok()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ws_chat);
}
