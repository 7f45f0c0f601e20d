mod parser;
use crate::llm::{GoogleSystemMode, ProviderKind};
use serde::{Deserialize, Serialize};

pub use parser::{apply_env_overrides, load_config, resolve_config_path, ConfigError};

/// Main configuration structure for the server
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,
    /// Defaults used when a tool call names no provider or model
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Per-provider endpoints and models; credentials only come from the environment
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    9090
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Seeded in-process store, lost on exit
    #[default]
    Memory,
    /// SQLite database file managed through diesel
    Sqlite,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// Path of the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Insert the sample catalog when the product table is empty
    #[serde(default = "default_true")]
    pub seed_sample_catalog: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            kind: StorageKind::default(),
            database_path: default_database_path(),
            seed_sample_catalog: true,
        }
    }
}

fn default_database_path() -> String {
    "shopmind.db".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Model used when the chosen provider lists none
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        AssistantConfig {
            default_provider: default_provider(),
            default_model: default_model(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama2".to_string()
}

/// Settings of a single provider
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderSettings {
    /// Credential, read from the environment only
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Replaces the built-in model list when set
    #[serde(default)]
    pub models: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub google: ProviderSettings,
    #[serde(default)]
    pub perplexity: ProviderSettings,
    #[serde(default)]
    pub ollama: ProviderSettings,
    #[serde(default)]
    pub google_system_mode: GoogleSystemMode,
}

impl ProvidersConfig {
    pub fn settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
            ProviderKind::Perplexity => &self.perplexity,
            ProviderKind::Ollama => &self.ollama,
        }
    }

    pub fn settings_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Google => &mut self.google,
            ProviderKind::Perplexity => &mut self.perplexity,
            ProviderKind::Ollama => &mut self.ollama,
        }
    }
}
