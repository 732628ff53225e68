mod commands;
mod keys;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Parley conformance sandbox.
#[derive(Parser)]
#[command(name = "parley", version, about = "Parley conformance sandbox")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the scenarios of the sample standard
    Scenarios,

    /// Start the sandbox HTTP server
    Serve {
        /// Port to listen on (defaults to PARLEY_PORT, then 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Sandbox configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Base64url Ed25519 public key the publisher signs content with
        #[arg(long)]
        publisher_key: Option<String>,
    },

    /// Validate a sandbox configuration file
    CheckConfig {
        /// Path to the TOML configuration
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Scenarios => {
            commands::cmd_scenarios(cli.output, cli.quiet);
        }
        Commands::Serve {
            port,
            config,
            publisher_key,
        } => {
            let options = serve::ServeOptions {
                port,
                config,
                publisher_key,
            };
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(
                        &format!("failed to create tokio runtime: {}", e),
                        cli.output,
                        cli.quiet,
                    );
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(options)) {
                report_error(&format!("Server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::CheckConfig { file } => {
            commands::cmd_check_config(&file, cli.output, cli.quiet);
        }
    }
}

/// Log to stderr. `RUST_LOG` wins over the default level.
fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
