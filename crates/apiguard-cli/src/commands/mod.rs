//! CLI command implementations

pub mod check;
pub mod compile;
pub mod init;
pub mod status;

use anyhow::{Context, Result};
use apiguard_codegen::{ApiIR, Parser};
use apiguard_core::Config;

/// Load the project and compile its definition document
pub(crate) fn load_and_compile(config_path: &str) -> Result<(Config, ApiIR)> {
    tracing::info!("Loading configuration from {}", config_path);
    let config = Config::load(config_path).context("Failed to load configuration")?;

    let document = config.document_path();
    tracing::info!("Compiling {}", document.display());
    let ir = Parser::new(&config.project)
        .parse_file(&document)
        .with_context(|| format!("Failed to compile {}", document.display()))?;

    Ok((config, ir))
}
