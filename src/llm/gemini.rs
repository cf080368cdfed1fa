use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

use crate::config::GeminiConfig;
use crate::llm::{
    models::{GenerateOptions, GenerateResponse, Usage},
    sse::SseBuffer,
    LlmError, LlmProvider,
};

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GeminiProvider {
    pub fn from_config(config: &GeminiConfig) -> Result<Self, LlmError> {
        // No overall client timeout: streamed replies can legitimately run long.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            default_model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    async fn generate_once(&self, model: &str, body: &Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Api {
        status: status.as_u16(),
        body,
    })
}

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential back-off for the given retry (1-based), capped at `MAX_BACKOFF`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Builds a `generateContent` request body for a single-turn text prompt.
pub fn request_body(prompt: &str, options: &GenerateOptions) -> Value {
    let mut body = json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ]
    });

    if let Some(system) = &options.system_instruction {
        body["systemInstruction"] = json!({ "parts": [ { "text": system } ] });
    }

    let mut generation = serde_json::Map::new();
    if let Some(t) = options.temperature {
        generation.insert("temperature".to_string(), json!(t));
    }
    if let Some(n) = options.max_output_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(n));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }
    body
}

/// Concatenates the text parts of the first candidate, if there are any.
pub fn extract_text(json: &Value) -> Option<String> {
    let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Explains a response that carried no text: a prompt block or a finish reason.
pub fn empty_reason(json: &Value) -> String {
    if let Some(reason) = json.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return format!("prompt blocked: {}", reason);
    }
    if let Some(reason) = json.pointer("/candidates/0/finishReason").and_then(Value::as_str) {
        return format!("finish reason {}", reason);
    }
    "no candidates returned".to_string()
}

pub fn extract_usage(json: &Value) -> Option<Usage> {
    let u = json.get("usageMetadata")?;
    Some(Usage {
        input_tokens: u["promptTokenCount"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<GenerateResponse, LlmError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = request_body(prompt, &options);

        let mut attempt = 0u32;
        let json = loop {
            match self.generate_once(model, &body).await {
                Ok(json) => break json,
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = backoff_delay(self.retry_backoff, attempt);
                    warn!("Gemini call failed ({}), retrying in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        };

        let content = extract_text(&json).ok_or_else(|| LlmError::EmptyResponse(empty_reason(&json)))?;

        Ok(GenerateResponse {
            content,
            model: json["modelVersion"].as_str().unwrap_or(model).to_string(),
            usage: extract_usage(&json),
        })
    }

    async fn generate_streaming(
        &self,
        prompt: &str,
        options: GenerateOptions,
        tx: Sender<String>,
    ) -> Result<(), LlmError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = request_body(prompt, &options);

        let response = self
            .client
            .post(format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let response = check_status(response).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = SseBuffer::new();

        // each read waits at most `timeout` for the next chunk
        loop {
            let chunk = match tokio::time::timeout(self.timeout, stream.next()).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(_) => {
                    return Err(LlmError::Network(format!(
                        "no stream data from Gemini for {:?}",
                        self.timeout
                    )))
                }
            };
            let bytes = chunk.map_err(|e| LlmError::Network(e.to_string()))?;
            for event in buffer.push(&bytes) {
                if !forward_event(&event, &tx).await {
                    debug!("Stream receiver dropped, stopping Gemini stream");
                    return Ok(());
                }
            }
        }
        if let Some(event) = buffer.finish() {
            forward_event(&event, &tx).await;
        }

        Ok(())
    }
}

/// Returns false once the receiving side has gone away.
async fn forward_event(event: &str, tx: &Sender<String>) -> bool {
    let json = match serde_json::from_str::<Value>(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Skipping malformed Gemini stream event: {}", e);
            return true;
        }
    };
    match extract_text(&json) {
        Some(text) => tx.send(text).await.is_ok(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_joins_parts() {
        let j = json!({
            "candidates": [ { "content": { "role": "model", "parts": [ { "text": "Hello, " }, { "text": "world" } ] } } ]
        });
        assert_eq!(extract_text(&j).as_deref(), Some("Hello, world"));
    }

    #[test]
    fn blocked_prompt_has_no_text() {
        let j = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(extract_text(&j), None);
        assert_eq!(empty_reason(&j), "prompt blocked: SAFETY");
    }

    #[test]
    fn request_body_includes_optional_sections_only_when_set() {
        let plain = request_body("hi", &GenerateOptions::default());
        assert_eq!(plain["contents"][0]["parts"][0]["text"], "hi");
        assert!(plain.get("generationConfig").is_none());
        assert!(plain.get("systemInstruction").is_none());

        let opts = GenerateOptions {
            max_output_tokens: Some(256),
            system_instruction: Some("Be brief.".to_string()),
            ..Default::default()
        };
        let body = request_body("hi", &opts);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let base = Duration::from_millis(200);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn usage_metadata_is_mapped() {
        let j = json!({ "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 30 } });
        let usage = extract_usage(&j).unwrap();
        assert_eq!((usage.input_tokens, usage.output_tokens), (12, 30));
    }
}
