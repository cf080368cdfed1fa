use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::auth::{AuthError, UserResolver};

/// Validates access tokens issued to the frontend by Supabase Auth.
pub struct SupabaseResolver {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseResolver {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }
}

/// The user object may come back bare or wrapped in `user` / `data.user`.
pub fn extract_user_id(json: &Value) -> Option<String> {
    ["/id", "/user/id", "/data/user/id"]
        .iter()
        .find_map(|p| json.pointer(p).and_then(Value::as_str).filter(|id| !id.is_empty()))
        .map(str::to_string)
}

#[async_trait]
impl UserResolver for SupabaseResolver {
    async fn resolve(&self, token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                debug!("Supabase token check failed: {}", e);
                AuthError::InvalidToken
            })?;

        if !response.status().is_success() {
            debug!("Supabase rejected token with status {}", response.status());
            return Err(AuthError::InvalidToken);
        }

        let json: Value = response.json().await.map_err(|_| AuthError::InvalidToken)?;
        extract_user_id(&json).ok_or(AuthError::InvalidToken)
    }
}
