//! API Guard CLI
//!
//! Developer tool for compiling definition documents and checking sample
//! requests against them.

use std::process::ExitCode;

use anyhow::Result;
use apiguard_core::Outcome;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// API Guard - request validation compiled from interface definitions
#[derive(Parser)]
#[command(name = "apiguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file or project directory
    #[arg(short, long, default_value = "apiguard.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with a sample definition document
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Compile the definition document into check models
    Compile {
        /// Print one operation's check model
        #[arg(short, long)]
        operation: Option<String>,
    },

    /// Check a sample request against an operation
    Check {
        /// Operation id
        #[arg(short, long)]
        operation: String,

        /// JSON file with `query`, `params`, `headers` and `body`
        #[arg(short, long)]
        request: String,
    },

    /// Show project status
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref()).await?;
        }
        Commands::Compile { operation } => {
            commands::compile::run(&cli.config, operation.as_deref()).await?;
        }
        Commands::Check { operation, request } => {
            let outcome = commands::check::run(&cli.config, &operation, &request).await?;
            return Ok(exit_code(outcome));
        }
        Commands::Status => {
            commands::status::run(&cli.config).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Pass => ExitCode::SUCCESS,
        Outcome::Fail => ExitCode::from(1),
        Outcome::Unauthorized => ExitCode::from(2),
    }
}
