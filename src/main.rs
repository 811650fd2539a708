use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use licitaciones_cli::cli::{cmd_doctor, cmd_run, cmd_serve, OutputFormat, RunArgs, ServeArgs};
use licitaciones_cli::config::load_config;
use licitaciones_cli::logging::init_logging;
use tracing::{error, info};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

/// Public procurement notice extractor for contrataciondelestado.es
#[derive(Parser)]
#[command(author, version = LONG_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction and write its output folder
    Run(RunArgs),

    /// Serve the HTTP API
    Serve(ServeArgs),

    /// Check the Chrome installation and print build information
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref()).await?;
    let guard = init_logging(&cli.log_level, cli.debug, &loaded.config.output.log_dir)?;

    info!("Starting licitaciones v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_source();
    let config = loaded.config;

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, &config, cli.output).await,
        Commands::Serve(args) => cmd_serve(args, config).await,
        Commands::Doctor => cmd_doctor(&config, cli.output).await,
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            drop(guard);
            std::process::exit(1);
        }
    }
}
