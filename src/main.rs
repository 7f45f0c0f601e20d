//! Main entry point for the application.
//!
//! Initializes logging, loads environment variables and configuration, opens the
//! storefront store and wires the chat providers, the assistant and the tool modules
//! together before running the selected command.
//!
//! The application can be started in different modes:
//! - `serve` runs the HTTP API
//! - `call` runs a single tool and prints its result
//! - `tools` and `providers` print what the server exposes

mod api;
mod assistant;
mod cli;
mod config;
mod constants;
mod db;
mod errors;
mod llm;
mod metrics;
mod modules;
mod schema;
mod utils;

use assistant::AiAssistant;
use clap::Parser;
use cli::{Cli, Command};
use config::AppConfig;
use llm::transport::ReqwestTransport;
use llm::{AdapterOptions, ChatDispatcher, ProviderRegistry};
use metrics::MetricsService;
use modules::ModulesManager;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Loads the configuration file and applies environment overrides
fn load_settings(cli: &Cli) -> Result<AppConfig, config::ConfigError> {
    let path = config::resolve_config_path(cli.config.as_deref());
    let mut settings = config::load_config(path.as_deref())?;
    config::apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

/// Builds the shared services and the tool manager
fn build_manager(
    settings: &AppConfig,
) -> Result<(Arc<ModulesManager>, Arc<ChatDispatcher>), Box<dyn Error>> {
    let store = db::open_store(&settings.storage)?;
    let registry = Arc::new(ProviderRegistry::from_config(&settings.providers));
    let dispatcher = Arc::new(ChatDispatcher::new(
        registry,
        Arc::new(ReqwestTransport::new()),
        AdapterOptions {
            google_system_mode: settings.providers.google_system_mode,
        },
    ));
    let assistant = Arc::new(AiAssistant::new(
        store.clone(),
        dispatcher.clone(),
        settings.assistant.clone(),
    ));
    let metrics = Arc::new(MetricsService::new()?);
    let manager = ModulesManager::with_defaults(store, assistant, metrics)?;
    Ok((Arc::new(manager), dispatcher))
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(&cli)?;
    let (manager, dispatcher) = build_manager(&settings)?;

    match cli.command {
        Command::Serve { port, .. } => {
            let port = port.unwrap_or(settings.server.port);
            info!("Starting API server on port {}", port);
            api::server::launch_server(port, manager).await?;
        }
        Command::Call { tool, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)?;
            let response = manager.call(&tool, args).await?;
            println!("{}", response.first_text());
        }
        Command::Tools => {
            for tool in manager.list_tools() {
                println!("{}", tool);
            }
        }
        Command::Providers => {
            for provider in dispatcher.provider_summaries() {
                let status = if provider.configured {
                    "configured"
                } else {
                    "not configured"
                };
                println!(
                    "{} [{}] ({}): {}",
                    provider.display_name,
                    provider.name,
                    status,
                    provider.models.join(", ")
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let with_file = matches!(cli.command, Command::Serve { log_file: true, .. });
    utils::init_logging(&cli.logging_level, with_file);

    if let Err(e) = dotenvy::dotenv() {
        warn!("Failed to load .env file: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
