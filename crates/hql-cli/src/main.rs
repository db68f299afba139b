//! HQL CLI - grouping-sets planner and metastore service.

use anyhow::Result;
use clap::{Parser, Subcommand};
use hql_core::config::LogFormat;
use hql_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
/// - 128+N: Signal N received (e.g., 130 = SIGINT)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, bad --hiveconf)
    ConfigError = 1,
    /// Query rejected by the planner
    PlanError = 2,
    /// Function resolution or evaluation failed
    UdfError = 3,
    /// Metadata operation failed
    OperationError = 4,
    /// Metastore call failed
    MetastoreError = 5,
    /// General runtime error
    RuntimeError = 10,
    /// Signal interrupt (SIGINT = 2, so 128 + 2 = 130)
    SignalInterrupt = 130,
}

impl ExitCode {
    /// Map an error to an exit code, preferring the library error kind.
    fn from_error(error: &anyhow::Error) -> Self {
        if let Some(error) = error.downcast_ref::<hql_core::Error>() {
            return match error {
                hql_core::Error::Config(_) => ExitCode::ConfigError,
                hql_core::Error::Plan(_) => ExitCode::PlanError,
                hql_core::Error::Udf(_) => ExitCode::UdfError,
                hql_core::Error::Operation(_) => ExitCode::OperationError,
                hql_core::Error::Metastore(_) => ExitCode::MetastoreError,
                _ => ExitCode::RuntimeError,
            };
        }

        let error_str = error.to_string().to_lowercase();
        if error_str.contains("config") || error_str.contains("toml") {
            ExitCode::ConfigError
        } else {
            ExitCode::RuntimeError
        }
    }
}

mod commands;
mod server;

#[derive(Parser)]
#[command(name = "hql")]
#[command(about = "Hive grouping-sets planner and metastore CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a query and print its EXPLAIN output
    Explain {
        /// Query block as JSON
        #[arg(long)]
        query: PathBuf,

        /// Planner variable override, e.g. hive.map.aggr=false
        #[arg(long = "hiveconf", value_name = "NAME=VALUE")]
        hiveconf: Vec<String>,

        /// JSON list of tables to seed the metastore with
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Evaluate ROUND on a literal
    Round {
        /// Value to round
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Number of decimal places; negative rounds left of the point
        #[arg(long, allow_hyphen_values = true)]
        scale: Option<i32>,

        /// Hive type of the value
        #[arg(long = "type", default_value = "double")]
        type_name: String,
    },

    /// List the table types reported to clients
    TableTypes {
        /// Table type mapping (classic or hive); defaults to the config
        #[arg(long)]
        mapping: Option<String>,
    },

    /// Serve the metastore, health and metrics over HTTP
    Serve {
        /// Override metastore port
        #[arg(long)]
        port: Option<u16>,

        /// JSON list of tables to seed the metastore with
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Show status and health
    Status {
        /// Metastore service URL
        #[arg(long, default_value = "http://localhost:9083")]
        url: String,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Log format comes from the config when one is readable
    let log_format = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.monitoring.log_format)
        .unwrap_or_default();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so command output stays clean on stdout
    match log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    match execute_command(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Explain {
            query,
            hiveconf,
            schema,
        } => {
            let config = load_config_or_default(&cli.config)?;
            commands::explain::run(config, &query, &hiveconf, schema.as_deref())?;
        }

        Commands::Round {
            value,
            scale,
            type_name,
        } => {
            commands::round::run(&value, scale, &type_name)?;
        }

        Commands::TableTypes { mapping } => {
            let config = load_config_or_default(&cli.config)?;
            commands::table_types::run(config, mapping.as_deref())?;
        }

        Commands::Serve { port, schema } => {
            let mut config = load_config_or_default(&cli.config)?;
            if let Some(port) = port {
                config.metastore.port = port;
            }
            config.validate()?;
            return commands::serve::run(config, schema.as_deref()).await;
        }

        Commands::Status { url } => {
            commands::status::run(&url).await?;
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            config.validate()?;
            println!("Configuration is valid");
        }
    }

    Ok(ExitCode::Success)
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let path = path.clone().unwrap_or_else(|| PathBuf::from("config.toml"));
    Ok(Config::from_file(&path)?)
}

/// Commands that work without a config file fall back to defaults.
fn load_config_or_default(path: &Option<PathBuf>) -> Result<Config> {
    match path {
        Some(_) => load_config(path),
        None => Ok(Config::default()),
    }
}
