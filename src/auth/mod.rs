pub mod supabase;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::AuthConfig;
use supabase::SupabaseResolver;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
}

/// Maps a bearer token to the id of the user it belongs to.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<String, AuthError>;
}

/// Tokens listed in the config file, each bound to a fixed user id.
pub struct StaticKeyResolver {
    keys: HashMap<String, String>,
}

impl StaticKeyResolver {
    pub fn new<I, K, U>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, U)>,
        K: Into<String>,
        U: Into<String>,
    {
        Self {
            keys: entries
                .into_iter()
                .map(|(k, u)| (k.into(), u.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl UserResolver for StaticKeyResolver {
    async fn resolve(&self, token: &str) -> Result<String, AuthError> {
        self.keys.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

/// Tries each resolver in order; the first that accepts the token wins.
pub struct ChainResolver {
    resolvers: Vec<Arc<dyn UserResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Arc<dyn UserResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl UserResolver for ChainResolver {
    async fn resolve(&self, token: &str) -> Result<String, AuthError> {
        for resolver in &self.resolvers {
            if let Ok(user_id) = resolver.resolve(token).await {
                return Ok(user_id);
            }
        }
        Err(AuthError::InvalidToken)
    }
}

pub fn build_resolver(config: &AuthConfig) -> Arc<dyn UserResolver> {
    let static_keys = StaticKeyResolver::new(
        config
            .api_keys
            .iter()
            .map(|e| (e.key.clone(), e.user_id.clone())),
    );

    match (&config.supabase_url, &config.supabase_service_key) {
        (Some(url), Some(service_key)) => {
            info!("Verifying bearer tokens against Supabase at {}", url);
            let supabase: Arc<dyn UserResolver> =
                Arc::new(SupabaseResolver::new(url.clone(), service_key.clone()));
            if static_keys.is_empty() {
                supabase
            } else {
                Arc::new(ChainResolver::new(vec![Arc::new(static_keys), supabase]))
            }
        }
        _ => {
            info!("Verifying bearer tokens against {} configured API keys", static_keys.keys.len());
            Arc::new(static_keys)
        }
    }
}
