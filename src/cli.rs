use clap::{Parser, Subcommand};

/// Command line interface for the storefront tool server
#[derive(Parser, Debug)]
#[command(name = "shopmind", version, about)]
pub struct Cli {
    /// Path to a YAML configuration file
    /// Default: shopmind.yaml, then <config dir>/shopmind/config.yaml
    #[arg(short, long)]
    pub config: Option<String>,

    /// Sets the logging verbosity level for the application
    /// Possible values: "error", "warn", "info", "debug", "trace"
    /// Default: "info"
    #[arg(long, default_value_t = String::from("info"))]
    pub logging_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on, overriding the configuration
        #[arg(short, long)]
        port: Option<u16>,

        /// Also write logs to a daily rotating file under logs/
        #[arg(long)]
        log_file: bool,
    },
    /// Run a single tool and print its result
    Call {
        /// Tool name, e.g. get_products
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value_t = String::from("{}"))]
        args: String,
    },
    /// List the available tools
    Tools,
    /// List the chat providers and whether they are configured
    Providers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_call_with_arguments() {
        let cli = Cli::try_parse_from([
            "shopmind",
            "--logging-level",
            "debug",
            "call",
            "get_product",
            "--args",
            r#"{"id":"1"}"#,
        ])
        .unwrap();
        assert_eq!(cli.logging_level, "debug");
        match cli.command {
            Command::Call { tool, args } => {
                assert_eq!(tool, "get_product");
                assert_eq!(args, r#"{"id":"1"}"#);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["shopmind", "serve"]).unwrap();
        assert!(cli.config.is_none());
        assert!(matches!(
            cli.command,
            Command::Serve {
                port: None,
                log_file: false
            }
        ));
    }
}
