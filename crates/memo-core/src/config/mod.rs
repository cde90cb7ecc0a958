use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::provider;

/// Root configuration for the memo service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct Config {
    pub ai: AiConfig,
    pub providers: ProvidersConfig,
    pub persistence: PersistenceConfig,
    pub server: ServerConfig,
}

impl Config {
    /// The configured provider a model name routes to, if it has a key.
    fn match_provider(&self, model: Option<&str>) -> Option<&ProviderConfig> {
        let model = model.unwrap_or(&self.ai.model);
        let provider = if provider::is_gemini_model(model) {
            &self.providers.gemini
        } else {
            &self.providers.openai
        };
        (!provider.api_key.is_empty()).then_some(provider)
    }

    /// Get API key for the given model (or default model).
    ///
    /// Only the provider the model belongs to is consulted; a key configured
    /// for a different provider is never returned.
    pub fn get_api_key(&self, model: Option<&str>) -> Option<&str> {
        self.match_provider(model).map(|p| p.api_key.as_str())
    }

    /// Get API base URL override for the given model, if any.
    pub fn get_api_base(&self, model: Option<&str>) -> Option<&str> {
        self.match_provider(model)
            .and_then(|p| p.api_base.as_deref())
    }

    /// Directory holding the file backend's tables.
    pub fn data_dir(&self) -> PathBuf {
        match self.persistence.data_dir.as_deref() {
            Some(dir) if !dir.is_empty() => expand_home(dir),
            _ => get_data_dir(),
        }
    }

    /// Socket address the HTTP API binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Settings for the summary and tag suggestion calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f64,
    pub summary_max_tokens: u32,
    pub tags_max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-001".to_string(),
            temperature: 0.7,
            summary_max_tokens: 500,
            tags_max_tokens: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_base: Option<String>,
}

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted store when `url` and `apiKey` are set, file tables otherwise.
    #[default]
    Auto,
    Rest,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceConfig {
    pub backend: BackendKind,
    pub url: String,
    pub api_key: String,
    pub memos_table: String,
    pub summaries_table: String,
    pub data_dir: Option<String>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            url: String::new(),
            api_key: String::new(),
            memos_table: "memos".to_string(),
            summaries_table: "memo_summaries".to_string(),
            data_dir: None,
        }
    }
}

impl PersistenceConfig {
    /// Resolve `Auto` to a concrete backend.
    pub fn resolved_backend(&self) -> BackendKind {
        match self.backend {
            BackendKind::Auto if !self.url.is_empty() && !self.api_key.is_empty() => {
                BackendKind::Rest
            }
            BackendKind::Auto => BackendKind::File,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Load configuration from `MEMO_CONFIG`, or the config file overlaid with
/// individual environment variables.
pub fn load_config_from_env() -> Config {
    // 1. Full JSON from MEMO_CONFIG
    if let Ok(json) = std::env::var("MEMO_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse MEMO_CONFIG: {}", e);
            }
        }
    }

    // 2. Start with file fallback, then overlay individual env vars
    let mut cfg = load_config(None);

    if let Ok(v) = std::env::var("GEMINI_API_KEY") {
        cfg.providers.gemini.api_key = v;
    }
    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        cfg.providers.openai.api_key = v;
    }
    if let Ok(v) = std::env::var("MEMO_MODEL") {
        cfg.ai.model = v;
    }

    if let Ok(v) = std::env::var("SUPABASE_URL") {
        cfg.persistence.url = v;
    }
    if let Ok(v) = std::env::var("SUPABASE_ANON_KEY") {
        cfg.persistence.api_key = v;
    }
    if let Ok(v) = std::env::var("MEMO_DATA_DIR") {
        cfg.persistence.data_dir = Some(v);
    }

    if let Ok(v) = std::env::var("MEMO_HOST") {
        cfg.server.host = v;
    }
    if let Ok(v) = std::env::var("MEMO_PORT") {
        match v.parse() {
            Ok(port) => cfg.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid MEMO_PORT: {}", v),
        }
    }

    cfg
}

fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Get the memo data directory.
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memo")
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
