use serde::Deserialize;

pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, I couldn't generate a response right now.";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated list of origins, or `*` for any origin.
    pub allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: "*".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn origins(&self) -> Vec<&str> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "geminichat.duckdb".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiKeyEntry {
    pub key: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub api_keys: Vec<ApiKeyEntry>,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// How many of the most recent messages are replayed into the prompt.
    pub history_window: usize,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub fallback_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 8,
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gemini: GeminiConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("GEMINICHAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;
        app_config.apply_legacy_env();

        // Expand environment variables if present like ${GEMINI_API_KEY}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.database.path = expand_env(&app_config.database.path);
        app_config.gemini.api_key = expand_env(&app_config.gemini.api_key);
        app_config.auth.supabase_url = app_config.auth.supabase_url.as_deref().map(expand_env);
        app_config.auth.supabase_service_key =
            app_config.auth.supabase_service_key.as_deref().map(expand_env);
        for entry in &mut app_config.auth.api_keys {
            entry.key = expand_env(&entry.key);
        }

        app_config.validate()?;
        Ok(app_config)
    }

    /// The plain variables a `.env` file for this backend has always carried.
    fn apply_legacy_env(&mut self) {
        if let Some(key) = non_empty_env("GEMINI_API_KEY") {
            self.gemini.api_key = key;
        }
        if let Some(origins) = non_empty_env("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins;
        }
        if let Some(url) = non_empty_env("SUPABASE_URL") {
            self.auth.supabase_url = Some(url);
        }
        if let Some(key) = non_empty_env("SUPABASE_SERVICE_KEY") {
            self.auth.supabase_service_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "Missing GEMINI_API_KEY for the Gemini provider".to_string(),
            ));
        }
        if self.auth.supabase_url.is_some() != self.auth.supabase_service_key.is_some() {
            return Err(config::ConfigError::Message(
                "SUPABASE_URL and SUPABASE_SERVICE_KEY must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else {
        val.to_string()
    }
}
