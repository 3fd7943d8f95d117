use config::{Config as ConfigLoader, ConfigError, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use chatsa_llm::{ProviderConfig, ProviderType};
use chatsa_persist::StorageBackend;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub mongodb: MongoDbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub knowledge: KnowledgeSettings,
    pub meta: MetaSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(skip)]
    pub llm_api_keys: HashMap<ProviderType, String>,
    #[serde(default)]
    pub knowledge_api_key: String,
    #[serde(default)]
    pub knowledge_organization_id: String,
    #[serde(default)]
    pub meta_app_secret: String,
    #[serde(default)]
    pub meta_verify_token: String,
    #[serde(default)]
    pub admin_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    /// Sent to the provider as the completion limit
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Per-provider base URL overrides, keyed by provider name
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaSettings {
    pub graph_base_url: String,
    pub graph_version: String,
    #[serde(default)]
    pub app_id: Option<u64>,
    #[serde(default = "default_true")]
    pub verify_signature: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// 0 disables expiry
    #[serde(default = "default_takeover_timeout")]
    pub takeover_timeout_minutes: i64,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            takeover_timeout_minutes: default_takeover_timeout(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

fn default_takeover_timeout() -> i64 {
    60
}

fn default_max_message_chars() -> usize {
    4000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Environment variables that override single config keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("SERVER_REQUEST_TIMEOUT_SECS", "server.request_timeout_secs"),
    ("STORAGE_BACKEND", "storage.backend"),
    ("MONGODB_DATABASE", "mongodb.database"),
    ("LLM_MAX_TOKENS", "llm.max_tokens"),
    ("KNOWLEDGE_BASE_URL", "knowledge.base_url"),
    ("META_GRAPH_BASE_URL", "meta.graph_base_url"),
    ("META_GRAPH_VERSION", "meta.graph_version"),
    ("META_APP_ID", "meta.app_id"),
    ("META_VERIFY_SIGNATURE", "meta.verify_signature"),
    ("ENGINE_TAKEOVER_TIMEOUT_MINUTES", "engine.takeover_timeout_minutes"),
    ("ENGINE_MAX_MESSAGE_CHARS", "engine.max_message_chars"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
];

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, MONGODB_, LLM_, LOG_, META_, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.load_secrets()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder()
            .add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    fn load_secrets(&mut self) -> Result<(), ConfigError> {
        let secret = |name: &str| std::env::var(name).unwrap_or_default();

        self.mongodb_uri = secret("MONGODB_URI");
        if self.storage.backend == StorageBackend::Mongodb && self.mongodb_uri.is_empty() {
            return Err(ConfigError::Message(
                "MONGODB_URI environment variable is required".to_string(),
            ));
        }

        for provider in ProviderType::ALL {
            let key = secret(&format!("{}_API_KEY", provider.as_str().to_uppercase()));
            if !key.is_empty() {
                self.llm_api_keys.insert(provider, key);
            }
        }

        self.knowledge_api_key = secret("KNOWLEDGE_API_KEY");
        self.knowledge_organization_id = secret("KNOWLEDGE_ORGANIZATION_ID");
        self.meta_app_secret = secret("META_APP_SECRET");
        self.meta_verify_token = secret("META_VERIFY_TOKEN");
        self.admin_token = secret("ADMIN_TOKEN");
        Ok(())
    }

    /// One entry per provider with an API key
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        let mut configs: Vec<ProviderConfig> = self
            .llm_api_keys
            .iter()
            .map(|(provider, key)| {
                let config = ProviderConfig::new(*provider, key.clone());
                match self.llm.base_urls.get(provider.as_str()) {
                    Some(url) => config.with_base_url(url.clone()),
                    None => config,
                }
            })
            .collect();
        configs.sort_by_key(|c| c.provider.as_str());
        configs
    }

    pub fn takeover_timeout(&self) -> Option<chrono::Duration> {
        (self.engine.takeover_timeout_minutes > 0)
            .then(|| chrono::Duration::minutes(self.engine.takeover_timeout_minutes))
    }
}
