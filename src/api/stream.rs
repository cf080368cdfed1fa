use actix_web::{post, web, HttpResponse};
use bytes::Bytes;

use crate::api::error::ApiError;
use crate::api::middleware::AuthUser;
use crate::api::models::{ChatRequest, StreamEvent};
use crate::chat::ChatService;

fn sse_frame(event: &StreamEvent) -> Bytes {
    Bytes::from(format!("data: {}\n\n", event.to_json()))
}

/// Same contract as `POST /chat`, but the reply arrives as Server-Sent Events.
#[post("/chat/stream")]
pub async fn chat_stream(
    user: AuthUser,
    chat: web::Data<ChatService>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    // Validation errors still get a regular JSON error response.
    let turn = chat.prepare(&user.id, req.conversation_id, &req.message)?;
    let mut rx = chat.stream(turn);

    let stream = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, actix_web::Error>(sse_frame(&StreamEvent::chunk(chunk)));
        }
        yield Ok::<Bytes, actix_web::Error>(sse_frame(&StreamEvent::done()));
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat_stream);
}
