use super::{AppConfig, StorageKind};
use crate::llm::ProviderKind;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

const LOCAL_CONFIG_FILE: &str = "shopmind.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Finds the configuration file to load
///
/// An explicit path wins; otherwise `shopmind.yaml` in the working directory,
/// then `<config dir>/shopmind/config.yaml`.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("shopmind").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Loads and parses the YAML configuration, or returns defaults when no file is given
///
/// # Arguments
///
/// * `path` - Optional path to the YAML configuration file
///
/// # Errors
///
/// Returns an error if the file cannot be read or its content does not parse.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        info!("No configuration file found, using defaults");
        return Ok(AppConfig::default());
    };

    let yaml_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: AppConfig = serde_yaml::from_str(&yaml_str)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn env_names(kind: ProviderKind) -> (&'static str, &'static str) {
    match kind {
        ProviderKind::OpenAi => ("OPENAI_API_KEY", "OPENAI_BASE_URL"),
        ProviderKind::Anthropic => ("ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL"),
        ProviderKind::Google => ("GOOGLE_API_KEY", "GOOGLE_BASE_URL"),
        ProviderKind::Perplexity => ("PERPLEXITY_API_KEY", "PERPLEXITY_BASE_URL"),
        ProviderKind::Ollama => ("OLLAMA_API_KEY", "OLLAMA_URL"),
    }
}

/// Overlays environment variables on top of the file configuration
///
/// # Arguments
///
/// * `config` - Configuration to update in place
/// * `lookup` - Variable reader, `std::env::var` in production
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for kind in ProviderKind::ALL {
        let (key_var, url_var) = env_names(kind);
        let settings = config.providers.settings_mut(kind);
        if kind.requires_credential() {
            if let Some(key) = lookup(key_var) {
                settings.api_key = Some(key);
            }
        }
        if let Some(url) = lookup(url_var).filter(|u| !u.is_empty()) {
            settings.base_url = Some(url);
        }
    }

    if let Some(mode) = lookup("GOOGLE_SYSTEM_MODE") {
        config.providers.google_system_mode =
            mode.parse().map_err(|message| ConfigError::InvalidValue {
                key: "GOOGLE_SYSTEM_MODE".to_string(),
                message,
            })?;
    }

    if let Some(path) = lookup("DATABASE_PATH") {
        config.storage.database_path = path;
    }

    if let Some(kind) = lookup("SHOPMIND_STORAGE") {
        config.storage.kind = match kind.to_ascii_lowercase().as_str() {
            "memory" => StorageKind::Memory,
            "sqlite" => StorageKind::Sqlite,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "SHOPMIND_STORAGE".to_string(),
                    message: format!("expected memory or sqlite, got '{}'", other),
                })
            }
        };
    }

    if let Some(port) = lookup("SHOPMIND_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!("Ignoring SHOPMIND_PORT '{}': {}", port, e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GoogleSystemMode;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.assistant.default_provider, "ollama");
        assert_eq!(config.assistant.default_model, "llama2");
        assert_eq!(config.providers.google_system_mode, GoogleSystemMode::UserTurn);
    }

    #[test]
    fn test_yaml_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8088\nstorage:\n  kind: sqlite\n  database_path: /tmp/shop.db\nproviders:\n  google_system_mode: system_instruction\n  ollama:\n    models: [phi3]\n"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.storage.kind, StorageKind::Sqlite);
        assert_eq!(config.storage.database_path, "/tmp/shop.db");
        assert!(config.storage.seed_sample_catalog);
        assert_eq!(
            config.providers.google_system_mode,
            GoogleSystemMode::SystemInstruction
        );
        assert_eq!(config.providers.ollama.models, Some(vec!["phi3".to_string()]));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("OPENAI_API_KEY", "sk-env"),
                ("OLLAMA_URL", "http://gpu:11434"),
                ("GOOGLE_SYSTEM_MODE", "drop"),
                ("SHOPMIND_STORAGE", "sqlite"),
                ("SHOPMIND_PORT", "7000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-env"));
        assert!(config.providers.anthropic.api_key.is_none());
        assert_eq!(config.providers.ollama.base_url.as_deref(), Some("http://gpu:11434"));
        assert_eq!(config.providers.google_system_mode, GoogleSystemMode::Drop);
        assert_eq!(config.storage.kind, StorageKind::Sqlite);
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_invalid_google_mode_is_rejected() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, lookup_from(&[("GOOGLE_SYSTEM_MODE", "merge")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
