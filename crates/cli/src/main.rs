//! Persona CLI: the main entry point.
//!
//! Commands:
//! - `validate`: Check record files without resolving them
//! - `records`: List the records in the store
//! - `chain`: Show a record's inheritance chain
//! - `compile`: Compile a record and print the result
//! - `access`: Check an operation against a record's access level
//! - `config`: Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use persona_config::EngineConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "persona",
    about = "Persona: layered personalization records for LLM assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read records from this directory instead of the configured one
    #[arg(long, global = true, value_name = "DIR")]
    records_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a record file, or every record in a directory
    Validate {
        /// File or directory (defaults to the records directory)
        path: Option<PathBuf>,
    },

    /// List all records in the store
    Records,

    /// Show the inheritance chain of a record, root first
    Chain { id: String },

    /// Compile a record and print the merged result
    Compile {
        id: String,

        /// Print the full compiled record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a record's context may perform an operation
    Access {
        id: String,

        /// read, write, execute or admin
        operation: String,

        #[arg(long, default_value = "*")]
        resource: String,

        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = EngineConfig::load().map(|mut config| {
        if let Some(dir) = &cli.records_dir {
            config.store.records_dir = Some(dir.display().to_string());
        }
        config
    });

    init_tracing(cli.verbose, config.as_ref().ok());

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config?).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate(config).await?,
        },
        Commands::Validate { path } => commands::validate::run(&config?, path).await?,
        Commands::Records => commands::records::list(&config?).await?,
        Commands::Chain { id } => commands::records::chain(&config?, &id).await?,
        Commands::Compile { id, json } => commands::records::compile(&config?, &id, json).await?,
        Commands::Access {
            id,
            operation,
            resource,
            user,
        } => commands::access::run(&config?, &id, &operation, &resource, &user).await?,
    }

    Ok(())
}

/// Log to stderr so command output stays pipeable.
///
/// Precedence: `RUST_LOG`, then `--verbose`, then `[logging] level`.
fn init_tracing(verbose: bool, config: Option<&EngineConfig>) {
    let level = match (verbose, config) {
        (true, _) => "debug".to_string(),
        (false, Some(config)) => config.logging.level.to_lowercase(),
        (false, None) => "info".to_string(),
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.is_some_and(|c| c.logging.json) {
        builder.json().init();
    } else {
        builder.init();
    }
}
